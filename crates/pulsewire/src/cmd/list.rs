use std::path::PathBuf;

use pulsewire_proto::Volume;

use crate::cmd::{connect, ListArgs, ListKind};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{display_opt, print_rows, OutputFormat};

pub fn run(args: ListArgs, format: OutputFormat, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;

    let result = match args.kind {
        ListKind::Sinks => client
            .sink_info_list()
            .map(|sinks| {
                let rows = sinks
                    .iter()
                    .map(|s| {
                        vec![
                            s.index.to_string(),
                            display_opt(&s.name),
                            display_opt(&s.description),
                            volume_percent(s.volume.volumes().first().copied()),
                            if s.mute { "muted" } else { "-" }.to_string(),
                            display_opt(&s.active_port),
                        ]
                    })
                    .collect::<Vec<_>>();
                (
                    vec!["INDEX", "NAME", "DESCRIPTION", "VOLUME", "MUTE", "PORT"],
                    rows,
                )
            })
            .map_err(|err| client_error("list sinks failed", err)),
        ListKind::Sources => client
            .source_info_list()
            .map(|sources| {
                let rows = sources
                    .iter()
                    .map(|s| {
                        vec![
                            s.index.to_string(),
                            display_opt(&s.name),
                            display_opt(&s.description),
                            volume_percent(s.volume.volumes().first().copied()),
                            if s.mute { "muted" } else { "-" }.to_string(),
                            display_opt(&s.active_port),
                        ]
                    })
                    .collect::<Vec<_>>();
                (
                    vec!["INDEX", "NAME", "DESCRIPTION", "VOLUME", "MUTE", "PORT"],
                    rows,
                )
            })
            .map_err(|err| client_error("list sources failed", err)),
        ListKind::SinkInputs => client
            .sink_input_info_list()
            .map(|inputs| {
                let rows = inputs
                    .iter()
                    .map(|s| {
                        vec![
                            s.index.to_string(),
                            display_opt(&s.name),
                            s.sink.to_string(),
                            opt_index(s.client),
                            volume_percent(s.volume.volumes().first().copied()),
                            if s.corked { "corked" } else { "-" }.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>();
                (
                    vec!["INDEX", "NAME", "SINK", "CLIENT", "VOLUME", "STATE"],
                    rows,
                )
            })
            .map_err(|err| client_error("list sink inputs failed", err)),
        ListKind::SourceOutputs => client
            .source_output_info_list()
            .map(|outputs| {
                let rows = outputs
                    .iter()
                    .map(|s| {
                        vec![
                            s.index.to_string(),
                            display_opt(&s.name),
                            s.source.to_string(),
                            opt_index(s.client),
                            volume_percent(s.volume.volumes().first().copied()),
                            if s.corked { "corked" } else { "-" }.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>();
                (
                    vec!["INDEX", "NAME", "SOURCE", "CLIENT", "VOLUME", "STATE"],
                    rows,
                )
            })
            .map_err(|err| client_error("list source outputs failed", err)),
        ListKind::Clients => client
            .client_info_list()
            .map(|clients| {
                let rows = clients
                    .iter()
                    .map(|c| {
                        vec![
                            c.index.to_string(),
                            display_opt(&c.name),
                            display_opt(&c.driver),
                            c.props
                                .get("application.process.id")
                                .unwrap_or("-")
                                .to_string(),
                        ]
                    })
                    .collect::<Vec<_>>();
                (vec!["INDEX", "NAME", "DRIVER", "PID"], rows)
            })
            .map_err(|err| client_error("list clients failed", err)),
        ListKind::Modules => client
            .module_info_list()
            .map(|modules| {
                let rows = modules
                    .iter()
                    .map(|m| {
                        vec![
                            m.index.to_string(),
                            display_opt(&m.name),
                            display_opt(&m.argument),
                            m.n_used.map_or_else(|| "-".to_string(), |n| n.to_string()),
                        ]
                    })
                    .collect::<Vec<_>>();
                (vec!["INDEX", "NAME", "ARGUMENT", "USED"], rows)
            })
            .map_err(|err| client_error("list modules failed", err)),
    };
    client.close();

    let (headers, rows) = result?;
    print_rows(&headers, &rows, format);
    Ok(SUCCESS)
}

fn volume_percent(volume: Option<Volume>) -> String {
    match volume {
        Some(v) => format!("{}%", (u64::from(v.0) * 100) / u64::from(Volume::NORM.0)),
        None => "-".to_string(),
    }
}

fn opt_index(index: Option<u32>) -> String {
    index.map_or_else(|| "-".to_string(), |i| i.to_string())
}
