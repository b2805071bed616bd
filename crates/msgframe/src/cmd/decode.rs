use std::fs::File;
use std::io::{ErrorKind, Read};
use std::sync::mpsc::Receiver;

use msgframe_frame::FrameConfig;
use msgframe_message::{Message, MessageSubscriber, ValueCodec};

use crate::cmd::{queued_subscriber, CodecArg, DecodeArgs};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_message, OutputFormat};

const READ_CHUNK_SIZE: usize = 8 * 1024;

pub fn run(args: DecodeArgs, format: OutputFormat, codec: CodecArg) -> CliResult<i32> {
    let (source, mut input): (String, Box<dyn Read>) = match &args.path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            (path.display().to_string(), Box::new(file))
        }
        None => ("stdin".to_string(), Box::new(std::io::stdin().lock())),
    };

    let (mut subscriber, inbox) = queued_subscriber(codec, None, FrameConfig::default());

    if args.hex {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|err| io_error(&format!("failed reading {source}"), err))?;
        let bytes = parse_hex(&text)?;
        subscriber.feed(&bytes);
        print_queued(&inbox, &source, format);
    } else {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match input.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(io_error(&format!("failed reading {source}"), err)),
            };
            subscriber.feed(&chunk[..read]);
            print_queued(&inbox, &source, format);
        }
    }

    finish(&subscriber, &source, args.strict)
}

fn print_queued(inbox: &Receiver<Message>, source: &str, format: OutputFormat) {
    for message in inbox.try_iter() {
        print_message(&message, source, format);
    }
}

fn finish<C: ValueCodec>(
    subscriber: &MessageSubscriber<C>,
    source: &str,
    strict: bool,
) -> CliResult<i32> {
    let frames = subscriber.frame_stats();
    let messages = subscriber.stats();
    let rejected = frames.errors() + messages.deserialize_failures;

    if subscriber.pending() > 0 {
        tracing::warn!(pending = subscriber.pending(), "input ended inside a frame");
    }
    tracing::info!(
        source,
        decoded = frames.frames_decoded,
        rejected,
        checksum_mismatches = frames.checksum_mismatches,
        deserialize_failures = messages.deserialize_failures,
        "decode finished"
    );

    if strict && (rejected > 0 || subscriber.pending() > 0) {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{rejected} frame(s) rejected in {source}"),
        ));
    }
    Ok(SUCCESS)
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_ignores_whitespace() {
        assert_eq!(
            parse_hex("07 10 93 01\n02 03 24 00\n").unwrap(),
            vec![0x07, 0x10, 0x93, 0x01, 0x02, 0x03, 0x24, 0x00]
        );
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert_eq!(parse_hex("0").unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn strict_fails_on_rejected_frame() {
        let (mut sub, _inbox) = queued_subscriber(CodecArg::Msgpack, None, FrameConfig::default());
        sub.feed(&[0x00]);

        assert_eq!(finish(&sub, "test", false).unwrap(), SUCCESS);
        assert_eq!(finish(&sub, "test", true).unwrap_err().code, DATA_INVALID);
    }
}
