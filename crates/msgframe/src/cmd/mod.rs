use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use msgframe_frame::{FrameConfig, Topic};
use msgframe_message::{JsonCodec, Message, MessageSubscriber, MsgPackCodec, ValueCodec, Value};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one message and write the frame to stdout.
    Encode(EncodeArgs),
    /// Decode frames from a file or stdin and print the messages.
    Decode(DecodeArgs),
    /// Bind a socket and print received messages.
    Listen(ListenArgs),
    /// Connect to a socket and send a message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, codec: CodecArg) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, codec),
        Command::Decode(args) => decode::run(args, format, codec),
        Command::Listen(args) => listen::run(args, format, codec),
        Command::Send(args) => send::run(args, format, codec),
        Command::Version(args) => version::run(args),
    }
}

/// Payload value codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CodecArg {
    Msgpack,
    Json,
}

impl CodecArg {
    pub fn build(self) -> Box<dyn ValueCodec + Send> {
        match self {
            CodecArg::Msgpack => Box::new(MsgPackCodec),
            CodecArg::Json => Box::new(JsonCodec),
        }
    }
}

/// One message source for `encode` and `send`.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// JSON value to send.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// String value to send.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read a JSON value from a file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// Resolve the value to send. No source means `null`.
    pub fn resolve(&self) -> CliResult<Value> {
        if let Some(json) = &self.json {
            return serde_json::from_str(json)
                .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")));
        }
        if let Some(data) = &self.data {
            return Ok(Value::String(data.clone()));
        }
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
            return serde_json::from_str(&text).map_err(|err| {
                CliError::new(USAGE, format!("{} is not valid JSON: {err}", path.display()))
            });
        }
        Ok(Value::Null)
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Topic to encode on (decimal or 0x-prefixed hex).
    #[arg(long, short = 't', value_parser = parse_topic)]
    pub topic: Topic,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Print the frame as hex text instead of raw bytes.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file. Reads stdin when omitted.
    pub path: Option<PathBuf>,
    /// Input is hex text (whitespace ignored) rather than raw bytes.
    #[arg(long)]
    pub hex: bool,
    /// Exit with DATA_INVALID if any frame or payload was rejected.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (e.g. 127.0.0.1:7000).
    #[arg(env = "MSGFRAME_LISTEN_ADDR")]
    pub addr: String,
    /// Receive UDP datagrams instead of accepting TCP connections.
    #[arg(long)]
    pub udp: bool,
    /// Only print these topics (comma-separated).
    #[arg(long, value_delimiter = ',', value_parser = parse_topic)]
    pub topics: Option<Vec<Topic>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Drop un-delimited input beyond this many bytes.
    #[arg(long, value_name = "BYTES", env = "MSGFRAME_MAX_BUFFER")]
    pub max_buffer: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to send to (e.g. 127.0.0.1:7000).
    #[arg(env = "MSGFRAME_SEND_ADDR")]
    pub addr: String,
    /// Topic to send on (decimal or 0x-prefixed hex).
    #[arg(long, short = 't', value_parser = parse_topic)]
    pub topic: Topic,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Send UDP datagrams instead of using a TCP connection.
    #[arg(long)]
    pub udp: bool,
    /// Send the message N times.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
    /// Delay between repeats (e.g. 100ms, 2s).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// TCP connect and write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", env = "MSGFRAME_TIMEOUT")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a topic as decimal (`17`) or hex (`0x11`).
pub fn parse_topic(input: &str) -> Result<Topic, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("invalid topic '{input}': expected 0-255 or 0x00-0xff"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// A subscriber whose handlers queue messages for the command loop to print.
///
/// Printing happens outside the handler so the loop can track the current
/// peer and stop at `--count`.
pub fn queued_subscriber(
    codec: CodecArg,
    topics: Option<&[Topic]>,
    config: FrameConfig,
) -> (MessageSubscriber<Box<dyn ValueCodec + Send>>, Receiver<Message>) {
    let (tx, rx) = mpsc::channel();
    let mut subscriber = MessageSubscriber::with_config(codec.build(), config);

    match topics {
        Some(topics) => {
            for &topic in topics {
                let tx = tx.clone();
                subscriber.subscribe(topic, move |message: &Message| {
                    let _ = tx.send(message.clone());
                });
            }
        }
        None => {
            subscriber.subscribe_all(move |message: &Message| {
                let _ = tx.send(message.clone());
            });
        }
    }

    (subscriber, rx)
}
