//! SSE (Server-Sent Events) decoding for the build event stream.
//!
//! Bytes arrive in arbitrary chunks from the HTTP body. [`SseDecoder`] buffers
//! partial lines, groups `data:` lines into frames at blank-line boundaries,
//! and hands each complete frame's payload to [`decode_build_event`].
//! Handles format variations (e.g. `data:{...}` vs `data: {...}`, CRLF).

use crate::events::BuildEvent;

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of an unterminated line carried over from the previous chunk.
    partial: Vec<u8>,
    /// `data:` lines of the frame being assembled.
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the payloads of all frames completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        self.partial.extend_from_slice(chunk);

        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.accept_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(frame) = self.accept_line(line) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            return None;
        }
        if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
            return None;
        }
        // Bare JSON lines (newline-delimited JSON instead of SSE) are frames
        // of their own.
        if line.trim_start().starts_with('{') && self.data.is_empty() {
            return Some(line.trim().to_string());
        }
        tracing::debug!(line = %line, "ignoring unrecognised SSE line");
        None
    }

    fn take_frame(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let frame = self.data.join("\n");
        self.data.clear();
        Some(frame)
    }
}

/// Decode a frame payload into a build event.
///
/// Non-JSON payloads (e.g. `[DONE]`) and unknown event types yield `None`.
pub fn decode_build_event(payload: &str) -> Option<BuildEvent> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str::<BuildEvent>(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::debug!(error = %err, payload = %payload, "skipping undecodable build event");
            None
        }
    }
}

/// Decode a complete SSE body in one go.
pub fn parse_build_events(bytes: &[u8]) -> Vec<BuildEvent> {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.push(bytes);
    frames.extend(decoder.finish());
    frames.iter().filter_map(|f| decode_build_event(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BuildStatus;

    #[test]
    fn parses_standard_format() {
        let sse = b"data: {\"type\": \"log\", \"content\": \"hello\"}\n\n";
        let events = parse_build_events(sse);
        assert_eq!(events, vec![BuildEvent::log("hello")]);
    }

    #[test]
    fn parses_compact_format() {
        let sse = b"data:{\"type\":\"status\",\"status\":\"building\"}\n\n";
        let events = parse_build_events(sse);
        assert_eq!(events, vec![BuildEvent::status(BuildStatus::Building)]);
    }

    #[test]
    fn skips_done_marker_and_unknown_types() {
        let sse = b"data: {\"type\": \"heartbeat\"}\n\ndata: [DONE]\n\ndata: {\"type\":\"progress\"}\n\n";
        let events = parse_build_events(sse);
        assert_eq!(events, vec![BuildEvent::Heartbeat]);
    }

    #[test]
    fn skips_non_data_lines() {
        let sse = b"event: message\nid: 7\nretry: 1000\ndata: {\"type\": \"heartbeat\"}\n\n: keep-alive\n\n";
        let events = parse_build_events(sse);
        assert_eq!(events, vec![BuildEvent::Heartbeat]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"lo").is_empty());
        assert!(decoder.push(b"g\",\"content\":\"a\"}").is_empty());
        assert!(decoder.push(b"\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec![r#"{"type":"log","content":"a"}"#.to_string()]);
    }

    #[test]
    fn crlf_line_endings() {
        let sse = b"data: {\"type\":\"log\",\"content\":\"x\"}\r\n\r\n";
        assert_eq!(parse_build_events(sse), vec![BuildEvent::log("x")]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"type\":\"log\",\ndata: \"content\":\"m\"}\n\n");
        assert_eq!(frames, vec!["{\"type\":\"log\",\n\"content\":\"m\"}".to_string()]);
        assert_eq!(decode_build_event(&frames[0]), Some(BuildEvent::log("m")));
    }

    #[test]
    fn trailing_frame_without_blank_line_is_flushed() {
        let sse = b"data: {\"type\":\"status\",\"status\":\"ready\"}";
        assert_eq!(
            parse_build_events(sse),
            vec![BuildEvent::status(BuildStatus::Ready)]
        );
    }

    #[test]
    fn bare_json_lines_are_frames() {
        let body = b"{\"type\":\"log\",\"content\":\"1\"}\n{\"type\":\"log\",\"content\":\"2\"}\n";
        assert_eq!(
            parse_build_events(body),
            vec![BuildEvent::log("1"), BuildEvent::log("2")]
        );
    }

    #[test]
    fn empty_stream() {
        assert!(parse_build_events(b"").is_empty());
    }
}
