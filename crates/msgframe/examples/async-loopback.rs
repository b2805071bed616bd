//! Frames over an in-memory tokio pipe using `FrameCodec`.
//!
//! ```bash
//! cargo run -p msgframe --example async-loopback --features async
//! ```

use futures_util::{SinkExt, StreamExt};
use msgframe::frame::{Frame, FrameCodec};
use msgframe::message::{decode_message, json, MsgPackCodec, ValueCodec};
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (client, server) = tokio::io::duplex(1024);
    let mut sink = FramedWrite::new(client, FrameCodec::new());
    let mut stream = FramedRead::new(server, FrameCodec::new());

    let producer = tokio::spawn(async move {
        let codec = MsgPackCodec;
        for (topic, value) in [
            (0x01, json!("boot")),
            (0x10, json!([1, 2, 3])),
            (0x21, json!({"a": 1})),
        ] {
            let payload = codec.encode(&value)?;
            sink.send(Frame::new(topic, payload)).await?;
        }
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
    });

    while let Some(frame) = stream.next().await {
        let frame = frame?;
        let message = decode_message(&MsgPackCodec, &frame)?;
        println!("topic {:#04x}: {}", message.topic, message.value);
    }

    producer.await??;
    println!("codec stats: {:?}", stream.decoder().stats());
    Ok(())
}
