use std::path::PathBuf;

use crate::cmd::{connect, SubscribeArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: SubscribeArgs, format: OutputFormat, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let subscription = client
        .subscribe()
        .map_err(|err| client_error("subscribe failed", err))?;

    let mut seen = 0usize;
    loop {
        if let Some(count) = args.count {
            if seen >= count {
                break;
            }
        }
        let event = client
            .next_event()
            .map_err(|err| client_error("event wait failed", err))?;
        print_record(
            &[
                ("facility", event.facility.as_str().to_string()),
                ("operation", event.operation.as_str().to_string()),
                ("index", event.index.to_string()),
                ("code", format!("{:#x}", event.code)),
            ],
            format,
        );
        seen += 1;
    }

    client
        .unsubscribe(subscription)
        .map_err(|err| client_error("unsubscribe failed", err))?;
    client.close();
    Ok(SUCCESS)
}
