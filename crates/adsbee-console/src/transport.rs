//! TCP + WebSocket transport to the device console endpoint: upgrade
//! handshake, then a reader task and a writer task around the frame codec.

use adsbee_core::frame::{encode_frame, FrameDecoder, Opcode};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_GRACE: Duration = Duration::from_millis(100);
const MAX_HANDSHAKE_BYTES: usize = 16 * 1024;

/// What the socket side reports to the app loop.
#[derive(Debug, PartialEq, Eq)]
pub enum NetEvent {
    /// Lines of one decoded message, received order preserved.
    Lines(Vec<String>),
    Disconnected,
}

/// What the app loop (or the reader, for pongs) asks the writer to send.
#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Pong(Vec<u8>),
    Close,
}

pub struct Connection {
    pub read: OwnedReadHalf,
    pub write: OwnedWriteHalf,
    /// Frame bytes that arrived in the same read as the handshake tail.
    pub leftover: Vec<u8>,
}

/// Connect and upgrade. The whole step runs under one hard timeout and a
/// failure is fatal to the session; there is no retry.
pub async fn connect(host: &str, port: u16) -> Result<Connection> {
    timeout(CONNECT_TIMEOUT, handshake(host, port))
        .await
        .with_context(|| format!("handshake with {host}:{port} timed out"))?
}

async fn handshake(host: &str, port: u16) -> Result<Connection> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to {host}:{port}"))?;

    let mut key_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    let key = BASE64.encode(key_bytes);
    let request = format!(
        "GET /console HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Origin: http://{host}\r\n\
         \r\n"
    );
    stream
        .write_all(request.as_bytes())
        .await
        .context("sending upgrade request")?;

    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    let headers_end = loop {
        if let Some(end) = find_terminator(&response) {
            break end;
        }
        if response.len() > MAX_HANDSHAKE_BYTES {
            bail!("oversized handshake response");
        }
        let n = stream
            .read(&mut buf)
            .await
            .context("reading handshake response")?;
        if n == 0 {
            bail!("connection closed during handshake");
        }
        response.extend_from_slice(&buf[..n]);
    };

    if !handshake_accepted(&response[..headers_end]) {
        let status = String::from_utf8_lossy(&response[..headers_end]);
        bail!(
            "handshake rejected: {}",
            status.lines().next().unwrap_or("empty response")
        );
    }

    let leftover = response[headers_end..].to_vec();
    let (read, write) = stream.into_split();
    Ok(Connection {
        read,
        write,
        leftover,
    })
}

/// Offset just past the blank-line terminator, if present.
fn find_terminator(response: &[u8]) -> Option<usize> {
    response
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx + 4)
}

fn handshake_accepted(headers: &[u8]) -> bool {
    String::from_utf8_lossy(headers).contains("101 Switching Protocols")
}

/// Reads socket chunks into the frame decoder and turns frames into
/// [`NetEvent`]s. Pings are answered with identical-payload pongs through
/// the writer channel and never surface as content. Close frames, EOF,
/// short reads and framing errors all end in one `Disconnected` event.
pub async fn reader_task(
    mut read: OwnedReadHalf,
    leftover: Vec<u8>,
    events: mpsc::Sender<NetEvent>,
    outbound: mpsc::Sender<Outbound>,
) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = leftover;
    let mut buf = vec![0u8; 4096];

    'session: loop {
        let frames = match decoder.push_chunk(&chunk) {
            Ok(frames) => frames,
            Err(err) => {
                warn!("frame_decode_error: {err}");
                break;
            }
        };
        chunk.clear();

        for frame in frames {
            match frame.opcode {
                Opcode::Text | Opcode::Binary => {
                    let text = String::from_utf8_lossy(&frame.payload).into_owned();
                    let lines = split_lines(&text);
                    if !lines.is_empty() && events.send(NetEvent::Lines(lines)).await.is_err() {
                        return;
                    }
                }
                Opcode::Ping => {
                    if outbound.send(Outbound::Pong(frame.payload)).await.is_err() {
                        break 'session;
                    }
                }
                Opcode::Close => break 'session,
                // Pongs and unknown opcodes are not content.
                Opcode::Pong | Opcode::Other(_) => {}
            }
        }

        match read.read(&mut buf).await {
            Ok(0) => {
                if decoder.has_partial() {
                    debug!("socket closed mid-frame");
                }
                break;
            }
            Ok(n) => chunk.extend_from_slice(&buf[..n]),
            Err(err) => {
                debug!("socket_read_error: {err}");
                break;
            }
        }
    }

    let _ = events.send(NetEvent::Disconnected).await;
}

/// Owns the write half. Every outbound frame is masked with a fresh random
/// key. `Close` sends a best-effort close frame, waits a grace period and
/// drops the socket.
pub async fn writer_task(mut write: OwnedWriteHalf, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(message) = outbound.recv().await {
        let (opcode, payload) = match message {
            Outbound::Text(text) => (Opcode::Text, text.into_bytes()),
            Outbound::Pong(payload) => (Opcode::Pong, payload),
            Outbound::Close => {
                let frame = encode_frame(Opcode::Close, &[], random_mask());
                let _ = write.write_all(&frame).await;
                let _ = write.flush().await;
                sleep(CLOSE_GRACE).await;
                break;
            }
        };
        let frame = encode_frame(opcode, &payload, random_mask());
        if write.write_all(&frame).await.is_err() {
            break;
        }
    }
}

fn random_mask() -> [u8; 4] {
    let mut mask = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut mask);
    mask
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.trim_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
