use std::path::PathBuf;

use crate::cmd::{connect, InfoArgs, StatArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{display_opt, print_record, OutputFormat};

pub fn run_info(_args: InfoArgs, format: OutputFormat, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let info = client
        .server_info()
        .map_err(|err| client_error("server info failed", err))?;
    client.close();

    let sample_spec = format!(
        "{:?} {}ch {}Hz",
        info.sample_spec.format, info.sample_spec.channels, info.sample_spec.rate
    );
    print_record(
        &[
            ("server", display_opt(&info.package_name)),
            ("version", display_opt(&info.package_version)),
            ("user", display_opt(&info.user_name)),
            ("host", display_opt(&info.host_name)),
            ("sample_spec", sample_spec),
            ("default_sink", display_opt(&info.default_sink_name)),
            ("default_source", display_opt(&info.default_source_name)),
            ("cookie", format!("{:08x}", info.cookie)),
        ],
        format,
    );
    Ok(SUCCESS)
}

pub fn run_stat(_args: StatArgs, format: OutputFormat, server: Option<PathBuf>) -> CliResult<i32> {
    let mut client = connect(server)?;
    let stat = client
        .stat()
        .map_err(|err| client_error("stat failed", err))?;
    client.close();

    print_record(
        &[
            ("memblocks", stat.memblock_count.to_string()),
            ("memblock_bytes", stat.memblock_size.to_string()),
            ("memblocks_lifetime", stat.memblock_count_total.to_string()),
            (
                "memblock_bytes_lifetime",
                stat.memblock_size_total.to_string(),
            ),
            ("sample_cache_bytes", stat.sample_cache_size.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}
