mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "modlink", version, about = "Accessory link CLI")]
struct Cli {
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
    let result = cmd::run(cli.command, format);

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
    fn parses_thermal_subcommand() {
        let cli = Cli::try_parse_from([
            "modlink",
            "thermal",
            "/tmp/sensor.sock",
            "--socket",
            "--count",
            "3",
            "--stats",
        ])
        .expect("thermal args should parse");

        match cli.command {
            Command::Thermal(args) => {
                assert!(args.socket);
                assert!(args.stats);
                assert_eq!(args.count, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn decode_chunk_defaults_to_read_size() {
        let cli = Cli::try_parse_from(["modlink", "decode", "capture.bin"])
            .expect("decode args should parse");
        match cli.command {
            Command::Decode(args) => assert_eq!(args.chunk, 1024),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn emulate_requires_socket_path() {
        let err = Cli::try_parse_from(["modlink", "emulate"]).expect_err("missing path should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn compact_log_format_parses() {
        let cli = Cli::try_parse_from(["modlink", "--log-format", "compact", "version"])
            .expect("log format should parse");
        assert_eq!(cli.log_format, LogFormat::Compact);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["modlink", "version", "--format", "json"])
            .expect("global flag should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
