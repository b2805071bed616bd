#![cfg(feature = "cli")]

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use msgframe::message::{json, MessageWriter, Value};

fn msgframe() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_msgframe"));
    cmd.env_remove("MSGFRAME_CODEC")
        .env_remove("MSGFRAME_FORMAT")
        .env_remove("MSGFRAME_LOG_LEVEL");
    cmd
}

fn run_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = msgframe()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should accept input");
    child.wait_with_output().expect("binary should exit")
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn connect_with_retry(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

fn wait_with_deadline(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("child should be pollable").is_some() {
            return child.wait_with_output().expect("child output should be readable");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            panic!("listener did not exit in time; stderr: {stderr}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn encode_prints_reference_frame_as_hex() {
    let output = msgframe()
        .args(["encode", "--topic", "0x10", "--json", "[1,2,3]", "--hex"])
        .output()
        .expect("binary should run");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "0710930102032400");
}

#[test]
fn encode_with_json_codec() {
    let output = msgframe()
        .args(["--codec", "json", "encode", "--topic", "3", "--data", "abc", "--hex"])
        .output()
        .expect("binary should run");

    assert!(output.status.success());
    let wire = hex::decode(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(wire.last(), Some(&0x00));
    assert!(!wire[..wire.len() - 1].contains(&0x00));
}

#[test]
fn decode_hex_from_stdin_prints_json_messages() {
    let output = run_with_stdin(
        &["--format", "json", "decode", "--hex"],
        b"07 10 93 01 02 03 24 00\n07 21 81 a1 61 01 e3 00\n",
    );

    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["topic"], json!(0x10));
    assert_eq!(lines[0]["topic_hex"], json!("0x10"));
    assert_eq!(lines[0]["source"], json!("stdin"));
    assert_eq!(lines[0]["value"], json!([1, 2, 3]));
    assert_eq!(lines[1]["topic"], json!(0x21));
    assert_eq!(lines[1]["value"], json!({"a": 1}));
}

#[test]
fn decode_raw_bytes_from_file() {
    let path = std::env::temp_dir().join(format!("msgframe-cli-{}.bin", std::process::id()));
    std::fs::write(
        &path,
        [
            0x09, 0x11, 0x93, 0xce, 0x07, 0x5b, 0xcd, 0x15, 0xce, 0x06, 0x01, 0xe2, 0x40, 0x7b,
            0xa3, 0x00,
        ],
    )
    .expect("temp file should be writable");

    let output = msgframe()
        .args(["--format", "raw", "decode"])
        .arg(&path)
        .output()
        .expect("binary should run");
    let _ = std::fs::remove_file(&path);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "[123456789,123456,123]"
    );
}

#[test]
fn decode_strict_rejects_corrupted_frame() {
    let corrupted = b"0710930102032500";

    let lenient = run_with_stdin(&["--format", "json", "decode", "--hex"], corrupted);
    assert!(lenient.status.success());
    assert!(json_lines(&lenient.stdout).is_empty());

    let strict = run_with_stdin(&["--format", "json", "decode", "--hex", "--strict"], corrupted);
    assert_eq!(strict.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&strict.stderr).contains("rejected"));
}

#[test]
fn decode_rejects_invalid_hex() {
    let output = run_with_stdin(&["decode", "--hex"], b"zz");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn encode_rejects_invalid_json_with_usage_code() {
    let output = msgframe()
        .args(["encode", "--topic", "1", "--json", "{oops"])
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_name() {
    let output = msgframe()
        .arg("version")
        .output()
        .expect("binary should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("msgframe "));

    let extended = msgframe()
        .args(["version", "--extended"])
        .output()
        .expect("binary should run");
    assert!(String::from_utf8_lossy(&extended.stdout).contains("checksum: crc-8/smbus"));
}

#[test]
fn listen_prints_filtered_messages_from_tcp_peer() {
    let addr = format!("127.0.0.1:{}", free_port());
    let child = msgframe()
        .args([
            "--format",
            "json",
            "listen",
            addr.as_str(),
            "--topics",
            "0x10",
            "--count",
            "2",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listener should spawn");

    let stream = connect_with_retry(&addr, Duration::from_secs(5)).expect("listener should accept");
    let mut writer = MessageWriter::new(stream);
    writer.send(0x20, &json!("ignored")).unwrap();
    writer.send(0x10, &json!({"seq": 1})).unwrap();
    writer.send(0x10, &json!({"seq": 2})).unwrap();

    let output = wait_with_deadline(child, Duration::from_secs(10));
    drop(writer);

    assert!(output.status.success());
    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line["topic"] == json!(0x10)));
    assert_eq!(lines[0]["value"], json!({"seq": 1}));
    assert_eq!(lines[1]["value"], json!({"seq": 2}));
}

#[test]
fn send_delivers_frames_to_tcp_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let addr = listener.local_addr().unwrap().to_string();

    let output = msgframe()
        .args([
            "--format", "json", "send", addr.as_str(), "--topic", "0x10", "--json", "[1,2,3]", "--repeat",
            "2", "--interval", "0ms",
        ])
        .output()
        .expect("binary should run");
    assert!(output.status.success());

    let (mut conn, _) = listener.accept().expect("sender should have connected");
    let mut received = Vec::new();
    conn.read_to_end(&mut received).unwrap();

    let frame: [u8; 8] = [0x07, 0x10, 0x93, 0x01, 0x02, 0x03, 0x24, 0x00];
    assert_eq!(received, [frame, frame].concat());

    let summary = json_lines(&output.stdout);
    assert_eq!(summary[0]["frames"], json!(2));
    assert_eq!(summary[0]["bytes"], json!(16));
    assert_eq!(summary[0]["codec"], json!("msgpack"));
}
