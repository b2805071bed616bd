use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use msgframe_frame::FrameConfig;
use msgframe_message::{Message, MessageSubscriber, ValueCodec};

use crate::cmd::{queued_subscriber, CodecArg, ListenArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const READ_CHUNK_SIZE: usize = 8 * 1024;
const MAX_DATAGRAM: usize = 64 * 1024;

type QueuedSubscriber = MessageSubscriber<Box<dyn ValueCodec + Send>>;

/// Prints queued messages and enforces `--count`.
struct Printer {
    inbox: Receiver<Message>,
    format: OutputFormat,
    count: Option<usize>,
    printed: usize,
}

impl Printer {
    /// Print everything queued so far. Returns true once `--count` is reached.
    fn flush(&mut self, source: &str) -> bool {
        for message in self.inbox.try_iter() {
            if self.done() {
                break;
            }
            print_message(&message, source, self.format);
            self.printed = self.printed.saturating_add(1);
        }
        self.done()
    }

    fn done(&self) -> bool {
        self.count.is_some_and(|count| self.printed >= count)
    }
}

pub fn run(args: ListenArgs, format: OutputFormat, codec: CodecArg) -> CliResult<i32> {
    let config = FrameConfig {
        max_buffer_size: args.max_buffer,
        ..FrameConfig::default()
    };
    let (subscriber, inbox) = queued_subscriber(codec, args.topics.as_deref(), config);
    let printer = Printer {
        inbox,
        format,
        count: args.count,
        printed: 0,
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.udp {
        listen_udp(&args.addr, subscriber, printer, &running)
    } else {
        listen_tcp(&args.addr, subscriber, printer, &running)
    }
}

fn listen_tcp(
    addr: &str,
    mut subscriber: QueuedSubscriber,
    mut printer: Printer,
    running: &AtomicBool,
) -> CliResult<i32> {
    let listener = TcpListener::bind(addr).map_err(|err| io_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("bind failed", err))?;
    log_bound("tcp", listener.local_addr());

    while running.load(Ordering::SeqCst) {
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_BACKOFF);
                continue;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("accept failed", err)),
        };

        tracing::info!(%peer, "peer connected");
        let source = peer.to_string();
        let finished =
            serve_connection(stream, &source, &mut subscriber, &mut printer, running)?;
        subscriber.reset();
        tracing::info!(%peer, "peer disconnected");

        if finished {
            break;
        }
    }

    Ok(SUCCESS)
}

/// Feed one connection until EOF, Ctrl-C or `--count`. Returns true when
/// the listener should stop.
fn serve_connection(
    mut stream: TcpStream,
    source: &str,
    subscriber: &mut QueuedSubscriber,
    printer: &mut Printer,
    running: &AtomicBool,
) -> CliResult<bool> {
    stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(POLL_INTERVAL)))
        .map_err(|err| io_error("socket setup failed", err))?;

    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while running.load(Ordering::SeqCst) {
        let read = match stream.read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                continue
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(error = %err, source, "read failed, dropping connection");
                return Ok(false);
            }
        };

        subscriber.feed(&chunk[..read]);
        if printer.flush(source) {
            return Ok(true);
        }
    }

    Ok(true)
}

fn listen_udp(
    addr: &str,
    mut subscriber: QueuedSubscriber,
    mut printer: Printer,
    running: &AtomicBool,
) -> CliResult<i32> {
    let socket = UdpSocket::bind(addr).map_err(|err| io_error("bind failed", err))?;
    socket
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| io_error("bind failed", err))?;
    log_bound("udp", socket.local_addr());

    let mut datagram = vec![0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (len, peer) = match socket.recv_from(&mut datagram) {
            Ok(received) => received,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => return Err(io_error("receive failed", err)),
        };

        tracing::trace!(%peer, len, "datagram");
        subscriber.feed(&datagram[..len]);
        if printer.flush(&peer.to_string()) {
            break;
        }
    }

    Ok(SUCCESS)
}

fn log_bound(transport: &str, local: std::io::Result<SocketAddr>) {
    match local {
        Ok(addr) => tracing::info!(transport, %addr, "listening"),
        Err(err) => tracing::debug!(transport, error = %err, "local address unavailable"),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
