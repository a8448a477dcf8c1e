use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use pulsewire_client::{Client, Config, Target};
use pulsewire_proto::Props;
use pulsewire_transport::PulseStream;

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod list;
pub mod module;
pub mod play;
pub mod subscribe;
pub mod version;
pub mod volume;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show server identity and defaults.
    Info(InfoArgs),
    /// Show server memory statistics.
    Stat(StatArgs),
    /// List objects of one kind.
    List(ListArgs),
    /// Set the volume of a sink, source, sink input, or source output.
    Volume(VolumeArgs),
    /// Mute or unmute a sink, source, sink input, or source output.
    Mute(MuteArgs),
    /// Set the default sink or source.
    Default(DefaultArgs),
    /// Play a cached sample on a sink.
    PlaySample(PlaySampleArgs),
    /// Load a module.
    LoadModule(LoadModuleArgs),
    /// Unload a module by index.
    UnloadModule(UnloadModuleArgs),
    /// Move a live stream to another device.
    Move(MoveArgs),
    /// Watch server change events.
    Subscribe(SubscribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, server: Option<PathBuf>) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run_info(args, format, server),
        Command::Stat(args) => info::run_stat(args, format, server),
        Command::List(args) => list::run(args, format, server),
        Command::Volume(args) => volume::run_volume(args, server),
        Command::Mute(args) => volume::run_mute(args, server),
        Command::Default(args) => volume::run_default(args, server),
        Command::PlaySample(args) => play::run(args, server),
        Command::LoadModule(args) => module::run_load(args, server),
        Command::UnloadModule(args) => module::run_unload(args, server),
        Command::Move(args) => volume::run_move(args, server),
        Command::Subscribe(args) => subscribe::run(args, format, server),
        Command::Version(args) => version::run(args),
    }
}

/// Connect using the global `--server` override.
pub(crate) fn connect(server: Option<PathBuf>) -> CliResult<Client<PulseStream>> {
    let mut props = Props::new();
    props.set("application.name", "pulsewire");
    let config = Config {
        socket_path: server,
        cookie_path: None,
        props,
    };
    Client::connect(config).map_err(|err| client_error("connect failed", err))
}

/// Parse `NUM` as an index or anything else as a name.
pub(crate) fn parse_target(value: &str) -> Target {
    match value.parse::<u32>() {
        Ok(index) => Target::Index(index),
        Err(_) => Target::Name(value.to_string()),
    }
}

/// Parse `50%` or a raw integer volume value.
pub(crate) fn parse_volume(value: &str) -> CliResult<pulsewire_proto::Volume> {
    use pulsewire_proto::Volume;

    let volume = if let Some(percent) = value.strip_suffix('%') {
        let percent: u64 = percent
            .trim()
            .parse()
            .map_err(|_| CliError::new(USAGE, format!("invalid volume: {value}")))?;
        Volume((percent * u64::from(Volume::NORM.0) / 100).min(u64::from(Volume::MAX.0)) as u32)
    } else {
        let raw: u32 = value
            .parse()
            .map_err(|_| CliError::new(USAGE, format!("invalid volume: {value}")))?;
        Volume(raw)
    };
    if !volume.is_valid() {
        return Err(CliError::new(USAGE, format!("volume out of range: {value}")));
    }
    Ok(volume)
}

/// The object kinds most commands address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    Sink,
    Source,
    SinkInput,
    SourceOutput,
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug, Default)]
pub struct StatArgs {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Sinks,
    Sources,
    SinkInputs,
    SourceOutputs,
    Clients,
    Modules,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// What to list.
    #[arg(value_enum)]
    pub kind: ListKind,
}

#[derive(Args, Debug)]
pub struct VolumeArgs {
    /// Kind of object to adjust.
    #[arg(value_enum)]
    pub kind: DeviceKind,
    /// Index, or name for sinks and sources.
    pub target: String,
    /// New volume: `NN%` or a raw integer (0x10000 = 100%).
    pub volume: String,
}

#[derive(Args, Debug)]
pub struct MuteArgs {
    /// Kind of object to adjust.
    #[arg(value_enum)]
    pub kind: DeviceKind,
    /// Index, or name for sinks and sources.
    pub target: String,
    /// `on` mutes, `off` unmutes.
    pub state: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DefaultKind {
    Sink,
    Source,
}

#[derive(Args, Debug)]
pub struct DefaultArgs {
    /// Which default to change.
    #[arg(value_enum)]
    pub kind: DefaultKind,
    /// Device name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct PlaySampleArgs {
    /// Sample-cache entry to play.
    pub name: String,
    /// Sink index or name. Defaults to the default sink.
    #[arg(long)]
    pub sink: Option<String>,
    /// Playback volume: `NN%` or a raw integer.
    #[arg(long, default_value = "100%")]
    pub volume: String,
}

#[derive(Args, Debug)]
pub struct LoadModuleArgs {
    /// Module name, e.g. `module-null-sink`.
    pub name: String,
    /// Raw `key=value` arguments, space separated.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UnloadModuleArgs {
    /// Module index.
    pub index: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MoveKind {
    SinkInput,
    SourceOutput,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Kind of stream to move.
    #[arg(value_enum)]
    pub kind: MoveKind,
    /// Stream index.
    pub index: u32,
    /// Destination device index or name.
    pub destination: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Exit after receiving N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
