use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use msgframe_frame::{FrameConfig, Topic};
use msgframe_message::{encode_message, MessageWriter, Value, ValueCodec};

use crate::cmd::{parse_duration, CodecArg, SendArgs};
use crate::exit::{
    io_error, message_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE,
};
use crate::output::{print_send_summary, OutputFormat, SendSummary};

pub fn run(args: SendArgs, format: OutputFormat, codec: CodecArg) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let timeout = parse_duration(&args.timeout)?;
    if timeout.is_zero() {
        return Err(CliError::new(USAGE, "--timeout must be greater than zero"));
    }
    if args.repeat == 0 {
        return Err(CliError::new(USAGE, "--repeat must be at least 1"));
    }

    let value = args.payload.resolve()?;
    let codec = codec.build();
    // Encoding up front surfaces codec errors before any connection is made.
    let wire = encode_message(&codec, args.topic, &value)
        .map_err(|err| message_error("encode failed", err))?;

    let target = resolve_addr(&args.addr)?;
    let transport = if args.udp { "udp" } else { "tcp" };
    let codec_name = codec.name();

    let frames = if args.udp {
        send_udp(target, &wire, args.repeat, interval)?
    } else {
        let plan = TcpPlan {
            topic: args.topic,
            value: &value,
            repeat: args.repeat,
            interval,
            timeout,
        };
        send_tcp(target, codec, &plan)?
    };

    tracing::info!(
        destination = %target,
        transport,
        topic = args.topic,
        frames,
        "send finished"
    );

    print_send_summary(
        &SendSummary {
            destination: target.to_string(),
            transport,
            topic: args.topic,
            codec: codec_name,
            frames,
            bytes: frames.saturating_mul(wire.len()),
        },
        format,
    );

    Ok(SUCCESS)
}

struct TcpPlan<'a> {
    topic: Topic,
    value: &'a Value,
    repeat: usize,
    interval: Duration,
    timeout: Duration,
}

fn send_tcp(
    target: SocketAddr,
    codec: Box<dyn ValueCodec + Send>,
    plan: &TcpPlan<'_>,
) -> CliResult<usize> {
    let stream = TcpStream::connect_timeout(&target, plan.timeout)
        .map_err(|err| io_error(&format!("connect to {target} failed"), err))?;
    stream
        .set_write_timeout(Some(plan.timeout))
        .map_err(|err| io_error("socket setup failed", err))?;
    tracing::debug!(%target, "connected");

    let config = FrameConfig {
        write_timeout: Some(plan.timeout),
        ..FrameConfig::default()
    };
    let mut writer = MessageWriter::with_codec(stream, codec, config);
    for index in 0..plan.repeat {
        if index > 0 && !plan.interval.is_zero() {
            std::thread::sleep(plan.interval);
        }
        writer
            .send(plan.topic, plan.value)
            .map_err(|err| message_error("send failed", err))?;
        tracing::trace!(index, "frame sent");
    }

    Ok(plan.repeat)
}

fn send_udp(
    target: SocketAddr,
    wire: &[u8],
    repeat: usize,
    interval: Duration,
) -> CliResult<usize> {
    let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).map_err(|err| io_error("bind failed", err))?;

    for index in 0..repeat {
        if index > 0 && !interval.is_zero() {
            std::thread::sleep(interval);
        }
        let sent = socket
            .send_to(wire, target)
            .map_err(|err| io_error(&format!("send to {target} failed"), err))?;
        if sent != wire.len() {
            return Err(CliError::new(
                TRANSPORT_ERROR,
                format!("datagram truncated: sent {sent} of {} bytes", wire.len()),
            ));
        }
        tracing::trace!(index, "datagram sent");
    }

    Ok(repeat)
}

fn resolve_addr(addr: &str) -> CliResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|err| CliError::new(USAGE, format!("invalid address '{addr}': {err}")))?
        .next()
        .ok_or_else(|| CliError::new(USAGE, format!("address '{addr}' did not resolve")))
}
