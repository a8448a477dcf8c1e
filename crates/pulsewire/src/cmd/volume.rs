use std::path::PathBuf;

use pulsewire_client::Client;
use pulsewire_proto::ChannelVolume;
use pulsewire_transport::PulseStream;

use crate::cmd::{
    connect, parse_target, parse_volume, DefaultArgs, DefaultKind, DeviceKind, MoveArgs, MoveKind,
    MuteArgs, VolumeArgs,
};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run_volume(args: VolumeArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let volume = parse_volume(&args.volume)?;
    let mut client = connect(server)?;

    let channels = lookup_channels(&mut client, args.kind, &args.target)?;
    let cvolume = ChannelVolume::uniform(channels, volume)
        .map_err(|err| CliError::new(USAGE, err.to_string()))?;

    let result = match args.kind {
        DeviceKind::Sink => client.set_sink_volume(parse_target(&args.target), &cvolume),
        DeviceKind::Source => client.set_source_volume(parse_target(&args.target), &cvolume),
        DeviceKind::SinkInput => {
            client.set_sink_input_volume(parse_index(&args.target)?, &cvolume)
        }
        DeviceKind::SourceOutput => {
            client.set_source_output_volume(parse_index(&args.target)?, &cvolume)
        }
    };
    client.close();
    result.map_err(|err| client_error("set volume failed", err))?;
    Ok(SUCCESS)
}

pub fn run_mute(args: MuteArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let mute = match args.state.as_str() {
        "on" | "1" | "true" => true,
        "off" | "0" | "false" => false,
        other => {
            return Err(CliError::new(
                USAGE,
                format!("expected on/off, got '{other}'"),
            ))
        }
    };

    let mut client = connect(server)?;
    let result = match args.kind {
        DeviceKind::Sink => client.set_sink_mute(parse_target(&args.target), mute),
        DeviceKind::Source => client.set_source_mute(parse_target(&args.target), mute),
        DeviceKind::SinkInput => client.set_sink_input_mute(parse_index(&args.target)?, mute),
        DeviceKind::SourceOutput => {
            client.set_source_output_mute(parse_index(&args.target)?, mute)
        }
    };
    client.close();
    result.map_err(|err| client_error("set mute failed", err))?;
    Ok(SUCCESS)
}

pub fn run_default(args: DefaultArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let result = match args.kind {
        DefaultKind::Sink => client.set_default_sink(&args.name),
        DefaultKind::Source => client.set_default_source(&args.name),
    };
    client.close();
    result.map_err(|err| client_error("set default failed", err))?;
    Ok(SUCCESS)
}

pub fn run_move(args: MoveArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let destination = parse_target(&args.destination);
    let result = match args.kind {
        MoveKind::SinkInput => client.move_sink_input(args.index, destination),
        MoveKind::SourceOutput => client.move_source_output(args.index, destination),
    };
    client.close();
    result.map_err(|err| client_error("move failed", err))?;
    Ok(SUCCESS)
}

/// A volume array must match the device's channel count.
fn lookup_channels(
    client: &mut Client<PulseStream>,
    kind: DeviceKind,
    target: &str,
) -> CliResult<u8> {
    let channels = match kind {
        DeviceKind::Sink => client
            .sink_info(parse_target(target))
            .map(|info| info.sample_spec.channels),
        DeviceKind::Source => client
            .source_info(parse_target(target))
            .map(|info| info.sample_spec.channels),
        DeviceKind::SinkInput => client
            .sink_input_info(parse_index(target)?)
            .map(|info| info.sample_spec.channels),
        DeviceKind::SourceOutput => client
            .source_output_info(parse_index(target)?)
            .map(|info| info.sample_spec.channels),
    };
    channels.map_err(|err| client_error("lookup failed", err))
}

fn parse_index(value: &str) -> CliResult<u32> {
    value.parse::<u32>().map_err(|_| {
        CliError::new(
            USAGE,
            format!("stream targets take a numeric index, got '{value}'"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::parse_volume;
    use pulsewire_proto::Volume;

    #[test]
    fn volume_percent_parses() {
        assert_eq!(parse_volume("100%").unwrap(), Volume::NORM);
        assert_eq!(parse_volume("0%").unwrap(), Volume::MUTED);
        assert_eq!(parse_volume("50%").unwrap(), Volume(0x8000));
    }

    #[test]
    fn raw_volume_parses() {
        assert_eq!(parse_volume("65536").unwrap(), Volume::NORM);
    }

    #[test]
    fn bad_volume_rejected() {
        assert!(parse_volume("loud").is_err());
        assert!(parse_volume("4294967295").is_err());
    }

    #[test]
    fn stream_targets_must_be_indices() {
        assert!(parse_index("12").is_ok());
        assert!(parse_index("front").is_err());
    }

    #[test]
    fn targets_parse_as_index_or_name() {
        use pulsewire_client::Target;
        assert_eq!(parse_target("3"), Target::Index(3));
        assert_eq!(
            parse_target("alsa_output"),
            Target::Name("alsa_output".to_string())
        );
    }
}
