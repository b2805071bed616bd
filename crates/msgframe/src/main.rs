mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{CodecArg, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "msgframe",
    version,
    about = "Encode, decode, send and listen for topic-tagged message frames"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true, env = "MSGFRAME_FORMAT")]
    format: Option<OutputFormat>,

    /// Payload value codec.
    #[arg(
        long,
        value_name = "CODEC",
        default_value = "msgpack",
        global = true,
        env = "MSGFRAME_CODEC"
    )]
    codec: CodecArg,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        global = true,
        env = "MSGFRAME_LOG_LEVEL"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.codec);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
