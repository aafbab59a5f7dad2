//! Incremental decoder for `text/event-stream` bodies.

use crate::completion::types::ModelError;
use serde::Deserialize;

/// One decoded `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// JSON payload of a streamed chunk.
    Data(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Buffers raw bytes and yields complete `data:` lines as they become available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a network chunk; returns every event completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    let data = text.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        None
    } else if data == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta from one streamed completion chunk.
///
/// Role-only and empty chunks yield `None`.
pub fn parse_delta(data: &str) -> Result<Option<String>, ModelError> {
    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|error| ModelError::MalformedResponse(format!("{error}: {data}")))?;
    Ok(payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_events_across_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(
            decoder.push(b":1}\n\ndata: [DONE]\n"),
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\r\nevent: ping\r\ndata:{\"b\":2}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"b\":2}".into())]);
    }

    #[test]
    fn flushes_unterminated_tail() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Done));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn keeps_multibyte_text_split_between_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Паркет\"}}]}\n".as_bytes();
        let (head, tail) = line.split_at(40);
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(head).is_empty());
        let events = decoder.push(tail);
        let SseEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        assert_eq!(parse_delta(data).expect("delta"), Some("Паркет".into()));
    }

    #[test]
    fn parses_deltas() {
        assert_eq!(
            parse_delta(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).expect("delta"),
            Some("Hi".into())
        );
        assert_eq!(
            parse_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).expect("role"),
            None
        );
        assert_eq!(parse_delta(r#"{"choices":[]}"#).expect("empty"), None);
        assert!(matches!(
            parse_delta("not json"),
            Err(ModelError::MalformedResponse(_))
        ));
    }
}
