use msgframe_message::encode_message;

use crate::cmd::{CodecArg, EncodeArgs};
use crate::exit::{message_error, CliResult, SUCCESS};
use crate::output::print_raw;

pub fn run(args: EncodeArgs, codec: CodecArg) -> CliResult<i32> {
    let value = args.payload.resolve()?;
    let wire = encode_message(&codec.build(), args.topic, &value)
        .map_err(|err| message_error("encode failed", err))?;

    tracing::debug!(topic = args.topic, len = wire.len(), "encoded frame");

    if args.hex {
        println!("{}", hex::encode(&wire));
    } else {
        print_raw(&wire);
    }

    Ok(SUCCESS)
}
