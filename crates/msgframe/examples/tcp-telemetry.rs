//! Telemetry over TCP: a sensor thread publishes readings on three topics
//! while the main thread subscribes to two of them.
//!
//! ```bash
//! cargo run -p msgframe --example tcp-telemetry
//! ```

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

use msgframe::message::{json, Message, MessageSubscriber, MessageWriter};

const TEMPERATURE: u8 = 0x10;
const HUMIDITY: u8 = 0x11;
const HEARTBEAT: u8 = 0x7f;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    println!("listening on {addr}");

    let sensor = thread::spawn(move || -> Result<(), BoxError> {
        let stream = TcpStream::connect(addr)?;
        let mut writer = MessageWriter::new(stream);
        for tick in 0..5u32 {
            writer.send(HEARTBEAT, &json!(tick))?;
            writer.send(TEMPERATURE, &json!({"celsius": 20.5 + f64::from(tick)}))?;
            writer.send(HUMIDITY, &json!({"percent": 40 + tick}))?;
        }
        Ok(())
    });

    let (mut conn, peer) = listener.accept()?;
    println!("sensor connected from {peer}");

    let (tx, rx) = mpsc::channel::<Message>();
    let mut subscriber = MessageSubscriber::new();
    for topic in [TEMPERATURE, HUMIDITY] {
        let tx = tx.clone();
        subscriber.subscribe(topic, move |message: &Message| {
            let _ = tx.send(message.clone());
        });
    }

    let mut chunk = [0u8; 256];
    loop {
        let n = conn.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        subscriber.feed(&chunk[..n]);
        for message in rx.try_iter() {
            println!("topic {:#04x}: {}", message.topic, message.value);
        }
    }

    match sensor.join() {
        Ok(result) => result?,
        Err(_) => return Err("sensor thread panicked".into()),
    }

    let stats = subscriber.stats();
    println!(
        "dispatched {} message(s), {} on unsubscribed topics",
        stats.dispatched, stats.unhandled
    );
    Ok(())
}
