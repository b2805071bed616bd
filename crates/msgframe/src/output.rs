use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgframe_message::Message;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    topic: u8,
    topic_hex: String,
    source: &'a str,
    value: &'a Value,
    timestamp: String,
}

pub fn print_message(message: &Message, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                topic: message.topic,
                topic_hex: topic_hex(message.topic),
                source,
                value: &message.value,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOPIC", "SOURCE", "VALUE"])
                .add_row(vec![
                    topic_hex(message.topic),
                    source.to_string(),
                    message.value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "topic={} source={} value={}",
                topic_hex(message.topic),
                source,
                message.value
            );
        }
        OutputFormat::Raw => {
            println!("{}", message.value);
        }
    }
}

/// Outcome of a `send` invocation.
#[derive(Debug, Serialize)]
pub struct SendSummary {
    pub destination: String,
    pub transport: &'static str,
    pub topic: u8,
    pub codec: &'static str,
    pub frames: usize,
    pub bytes: usize,
}

pub fn print_send_summary(summary: &SendSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DESTINATION", "TRANSPORT", "TOPIC", "CODEC", "FRAMES", "BYTES"])
                .add_row(vec![
                    summary.destination.clone(),
                    summary.transport.to_string(),
                    topic_hex(summary.topic),
                    summary.codec.to_string(),
                    summary.frames.to_string(),
                    summary.bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} frame(s), {} bytes, topic={} codec={} to {}://{}",
                summary.frames,
                summary.bytes,
                topic_hex(summary.topic),
                summary.codec,
                summary.transport,
                summary.destination
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn topic_hex(topic: u8) -> String {
    format!("{topic:#04x}")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_hex_is_zero_padded() {
        assert_eq!(topic_hex(0x01), "0x01");
        assert_eq!(topic_hex(0xff), "0xff");
    }
}
