//! Line-based event-socket framing shared by command replies and pushed
//! events: read header lines until a blank line, then a
//! `Content-Length: N` body if present.

use std::collections::HashMap;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Frame {
    pub fn is_event(&self) -> bool {
        self.headers.get("Content-Type").map(|v| v == "text/event-plain").unwrap_or(false)
    }

    /// True if either a `Reply-Text` header or the body carries `+OK`, the
    /// two places a success marker shows up in this protocol.
    pub fn is_ok(&self) -> bool {
        self.headers.get("Reply-Text").map(|v| v.contains("+OK")).unwrap_or(false) || self.body.contains("+OK")
    }

    /// Extracts the token following `+OK` in the body, e.g. a channel uuid
    /// from an `originate` reply (`+OK <uuid>`).
    pub fn ok_token(&self) -> Option<&str> {
        let idx = self.body.find("+OK")?;
        self.body[idx + 3..].split_whitespace().next()
    }
}

pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut headers = HashMap::new();
    let mut content_length = 0usize;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Err(crate::error::PbxError::ConnectionClosed);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            if key == "Content-Length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.insert(key, value);
        }
    }

    let mut body = String::new();
    if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).await?;
        body = String::from_utf8_lossy(&buf).into_owned();
    }

    Ok(Frame { headers, body })
}

pub fn parse_event(frame: &Frame) -> Option<crate::types::PbxEvent> {
    if !frame.is_event() {
        return None;
    }
    let event_name = frame.headers.get("Event-Name")?.clone();
    Some(crate::types::PbxEvent {
        event_name,
        event_uuid: frame.headers.get("Event-UUID").cloned().unwrap_or_default(),
        channel_uuid: frame.headers.get("Unique-ID").cloned().unwrap_or_default(),
        caller_id_number: frame.headers.get("Caller-Caller-ID-Number").cloned().unwrap_or_default(),
        destination_number: frame.headers.get("Caller-Destination-Number").cloned().unwrap_or_default(),
        channel_state: frame.headers.get("Channel-State").and_then(|s| crate::types::ChannelState::parse(s)),
        headers: frame.headers.clone(),
        body: frame.body.clone(),
    })
}
