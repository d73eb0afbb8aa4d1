use bytes::{Buf, BytesMut};

const HEADER_LEN: usize = 8;

/// Where a log line came from inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl StreamOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One fully decoded log frame: origin, the RFC3339 timestamp the Docker
/// daemon prefixed to the payload, and the raw log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub origin: StreamOrigin,
    pub timestamp: String,
    pub message: String,
}

/// Incremental decoder for Docker's multiplexed log wire format.
///
/// Each frame is an 8-byte header (origin byte, 3 reserved bytes, u32
/// big-endian payload length) followed by the payload. The transport hands
/// us arbitrarily sized chunks, so bytes are accumulated across `feed`
/// calls and a partial frame at the tail is held until the rest arrives.
/// An incomplete frame left over when the stream ends is simply dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete frame it makes available.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<LogFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < HEADER_LEN {
                break;
            }
            let payload_len =
                u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
            if self.buf.len() < HEADER_LEN + payload_len {
                break;
            }
            let origin = match self.buf[0] {
                2 => StreamOrigin::Stderr,
                _ => StreamOrigin::Stdout,
            };
            self.buf.advance(HEADER_LEN);
            let payload = self.buf.split_to(payload_len);
            frames.push(split_payload(origin, &payload));
        }
        frames
    }
}

/// Split a payload into timestamp and message at the first space. A payload
/// without a space keeps the whole text as the message rather than being
/// dropped. One trailing newline is stripped since the relay framing adds
/// its own; embedded newlines stay.
fn split_payload(origin: StreamOrigin, payload: &[u8]) -> LogFrame {
    let text = String::from_utf8_lossy(payload);
    let text = text
        .strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(&text);
    let (timestamp, message) = match text.find(' ') {
        Some(sp) => (&text[..sp], &text[sp + 1..]),
        None => ("", text),
    };
    LogFrame {
        origin,
        timestamp: timestamp.to_string(),
        message: message.to_string(),
    }
}
