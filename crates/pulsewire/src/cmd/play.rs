use std::path::PathBuf;

use pulsewire_client::Target;
use pulsewire_proto::{Props, DEFAULT_SINK_NAME};

use crate::cmd::{connect, parse_target, parse_volume, PlaySampleArgs};
use crate::exit::{client_error, CliResult, SUCCESS};

pub fn run(args: PlaySampleArgs, server: Option<PathBuf>) -> CliResult<i32> {
    let volume = parse_volume(&args.volume)?;
    let sink = match &args.sink {
        Some(sink) => parse_target(sink),
        None => Target::Name(DEFAULT_SINK_NAME.to_string()),
    };

    let mut client = connect(server)?;
    let result = client.play_sample(&args.name, sink, volume, &Props::new());
    client.close();

    let sink_input = result.map_err(|err| client_error("play sample failed", err))?;
    println!("{sink_input}");
    Ok(SUCCESS)
}
