//! Incremental decoder for server-sent event frames.
//!
//! The backend frames notifications as `event: <type>\ndata: <json>\n\n`.
//! Malformed or comment-only frames decode to nothing; they are never
//! surfaced as errors.

/// One decoded SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
  /// The `event:` field, if the frame carried one.
  pub event: Option<String>,
  /// Concatenated `data:` lines. Notifications carry no meaningful payload,
  /// so this is decoded but never interpreted.
  pub data: String,
}

/// Reassembles SSE frames from arbitrarily-chunked bytes.
#[derive(Debug, Default)]
pub struct SseDecoder {
  buffer: String,
}

impl SseDecoder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed a chunk of bytes, returning every frame it completes.
  pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
    self.buffer.push_str(&String::from_utf8_lossy(chunk));

    let mut frames = Vec::new();
    while let Some(pos) = self.buffer.find("\n\n") {
      let raw: String = self.buffer.drain(..pos + 2).collect();
      if let Some(frame) = parse_frame(&raw) {
        frames.push(frame);
      }
    }
    frames
  }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
  let mut event = None;
  let mut data = String::new();
  let mut saw_field = false;

  for line in raw.lines() {
    if line.is_empty() || line.starts_with(':') {
      // Blank separators and comments (keepalives).
      continue;
    }
    if let Some(value) = line.strip_prefix("event:") {
      event = Some(value.trim_start().to_string());
      saw_field = true;
    } else if let Some(value) = line.strip_prefix("data:") {
      if !data.is_empty() {
        data.push('\n');
      }
      data.push_str(value.trim_start());
      saw_field = true;
    }
    // Other fields (id:, retry:) are irrelevant here.
  }

  saw_field.then_some(SseFrame { event, data })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decodes_named_event_with_data() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"event: board_updated\ndata: {}\n\n");
    assert_eq!(
      frames,
      vec![SseFrame {
        event: Some("board_updated".into()),
        data: "{}".into(),
      }]
    );
  }

  #[test]
  fn test_reassembles_frames_across_chunks() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.feed(b"event: agent_ch").is_empty());
    assert!(decoder.feed(b"anged\ndata: {}\n").is_empty());
    let frames = decoder.feed(b"\nevent: activity_new\n\n");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].event.as_deref(), Some("agent_changed"));
    assert_eq!(frames[1].event.as_deref(), Some("activity_new"));
  }

  #[test]
  fn test_multiple_frames_in_one_chunk() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"event: a\n\nevent: b\n\nevent: c\n\n");
    let events: Vec<_> = frames.iter().filter_map(|f| f.event.as_deref()).collect();
    assert_eq!(events, vec!["a", "b", "c"]);
  }

  #[test]
  fn test_comment_keepalive_yields_nothing() {
    let mut decoder = SseDecoder::new();
    assert!(decoder.feed(b": ping\n\n").is_empty());
  }

  #[test]
  fn test_frame_without_event_name() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"data: {\"orphan\": true}\n\n");
    assert_eq!(frames.len(), 1);
    assert!(frames[0].event.is_none());
  }

  #[test]
  fn test_unknown_fields_ignored() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"id: 7\nretry: 3000\nevent: board_updated\n\n");
    assert_eq!(frames[0].event.as_deref(), Some("board_updated"));
  }
}
