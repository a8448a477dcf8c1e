mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pulsewire", version, about = "PulseAudio native-protocol client")]
struct Cli {
    /// Daemon socket path. Defaults to the environment's socket.
    #[arg(long, value_name = "PATH", global = true)]
    server: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.server);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_subcommand() {
        let cli = Cli::try_parse_from(["pulsewire", "list", "sinks"]).expect("list should parse");
        assert!(matches!(cli.command, Command::List(_)));
    }

    #[test]
    fn parses_volume_subcommand() {
        let cli = Cli::try_parse_from(["pulsewire", "volume", "sink", "0", "50%"])
            .expect("volume should parse");
        assert!(matches!(cli.command, Command::Volume(_)));
    }

    #[test]
    fn parses_global_server_flag() {
        let cli = Cli::try_parse_from(["pulsewire", "info", "--server", "/tmp/native"])
            .expect("info should parse");
        assert_eq!(cli.server, Some(PathBuf::from("/tmp/native")));
    }

    #[test]
    fn rejects_unknown_list_kind() {
        assert!(Cli::try_parse_from(["pulsewire", "list", "cables"]).is_err());
    }
}
