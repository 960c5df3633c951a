//! Chat transcript helpers: citation highlighting, feedback, and parsing of
//! the backend's streaming (NDJSON) answer format.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

/// A retrieved chunk backing part of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub doc_name: String,
    pub score: f64,
    pub content: String,
    #[serde(default)]
    pub page: Option<u32>,
}

/// The answer span a set of citations supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightInfo {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub highlight: Option<HighlightInfo>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_streaming: false,
            highlight: None,
            feedback: None,
        }
    }

    /// An empty assistant message that stream deltas are appended to.
    pub fn streaming_reply() -> Self {
        let mut msg = Self::new(Role::Assistant, "");
        msg.is_streaming = true;
        msg
    }

    pub fn append(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub fn finish(&mut self) {
        self.is_streaming = false;
    }

    /// Setting the same feedback twice clears it.
    pub fn toggle_feedback(&mut self, feedback: Feedback) {
        self.feedback = if self.feedback == Some(feedback) {
            None
        } else {
            Some(feedback)
        };
    }

    /// Split the content into plain and highlighted parts.
    ///
    /// User messages, messages still streaming, and messages whose highlight
    /// span does not occur in the content render as one plain segment.
    pub fn segments(&self) -> Vec<Segment<'_>> {
        match (&self.role, self.is_streaming, &self.highlight) {
            (Role::Assistant, false, Some(info)) => highlight_segments(&self.content, &info.text),
            _ => vec![Segment::Plain(&self.content)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Highlight(&'a str),
}

/// Split `content` around the first occurrence of `highlight`. Empty plain
/// parts are omitted.
pub fn highlight_segments<'a>(content: &'a str, highlight: &str) -> Vec<Segment<'a>> {
    if highlight.is_empty() {
        return vec![Segment::Plain(content)];
    }
    let Some(start) = content.find(highlight) else {
        return vec![Segment::Plain(content)];
    };
    let end = start + highlight.len();

    let mut out = Vec::with_capacity(3);
    if start > 0 {
        out.push(Segment::Plain(&content[..start]));
    }
    out.push(Segment::Highlight(&content[start..end]));
    if end < content.len() {
        out.push(Segment::Plain(&content[end..]));
    }
    out
}

/// One line of a `/query/stream` response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    References(Vec<Reference>),
    Response(String),
    Error(String),
}

#[derive(Deserialize)]
struct RawStreamLine {
    #[serde(default)]
    references: Option<Vec<Reference>>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl StreamEvent {
    /// Parse one NDJSON line. Blank lines and objects with none of the known
    /// keys yield `Ok(None)`.
    pub fn parse_line(line: &str) -> Result<Option<StreamEvent>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let raw: RawStreamLine = serde_json::from_str(line)
            .with_context(|| format!("invalid stream line: {}", line))?;

        Ok(if let Some(refs) = raw.references {
            Some(StreamEvent::References(refs))
        } else if let Some(text) = raw.response {
            Some(StreamEvent::Response(text))
        } else {
            raw.error.map(StreamEvent::Error)
        })
    }
}

/// Splits a byte stream into complete lines, carrying partial lines over
/// between chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever is left after the stream ended.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(content: &str, highlight: &str) -> ChatMessage {
        let mut msg = ChatMessage::new(Role::Assistant, content);
        msg.highlight = Some(HighlightInfo {
            text: highlight.to_string(),
            citations: vec![Citation {
                id: "c1".to_string(),
                doc_name: "contract_v2.pdf".to_string(),
                score: 0.92,
                content: "penalty capped at 30%".to_string(),
                page: Some(12),
            }],
        });
        msg
    }

    #[test]
    fn test_highlight_middle() {
        let segs = highlight_segments("The cap is 30% of the total.", "30%");
        assert_eq!(
            segs,
            vec![
                Segment::Plain("The cap is "),
                Segment::Highlight("30%"),
                Segment::Plain(" of the total."),
            ]
        );
    }

    #[test]
    fn test_highlight_edges_and_missing() {
        assert_eq!(
            highlight_segments("30% cap", "30%"),
            vec![Segment::Highlight("30%"), Segment::Plain(" cap")]
        );
        assert_eq!(highlight_segments("no match", "30%"), vec![Segment::Plain("no match")]);
        assert_eq!(highlight_segments("text", ""), vec![Segment::Plain("text")]);
    }

    #[test]
    fn test_segments_respect_role_and_streaming() {
        let msg = answer("The cap is 30%.", "30%");
        assert_eq!(msg.segments().len(), 3);

        let mut streaming = msg.clone();
        streaming.is_streaming = true;
        assert_eq!(streaming.segments(), vec![Segment::Plain("The cap is 30%.")]);

        let mut user = msg;
        user.role = Role::User;
        assert_eq!(user.segments().len(), 1);
    }

    #[test]
    fn test_toggle_feedback() {
        let mut msg = ChatMessage::new(Role::Assistant, "hi");
        msg.toggle_feedback(Feedback::Like);
        assert_eq!(msg.feedback, Some(Feedback::Like));
        msg.toggle_feedback(Feedback::Dislike);
        assert_eq!(msg.feedback, Some(Feedback::Dislike));
        msg.toggle_feedback(Feedback::Dislike);
        assert_eq!(msg.feedback, None);
    }

    #[test]
    fn test_streaming_reply() {
        let mut msg = ChatMessage::streaming_reply();
        msg.append("Hello");
        msg.append(", world");
        msg.finish();
        assert_eq!(msg.content, "Hello, world");
        assert!(!msg.is_streaming);
    }

    #[test]
    fn test_parse_stream_lines() {
        assert_eq!(
            StreamEvent::parse_line(r#"{"response":"Hel"}"#).unwrap(),
            Some(StreamEvent::Response("Hel".to_string()))
        );
        match StreamEvent::parse_line(r#"{"references":[{"file_path":"a.md"}]}"#).unwrap() {
            Some(StreamEvent::References(refs)) => {
                assert_eq!(refs[0].file_path.as_deref(), Some("a.md"))
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            StreamEvent::parse_line(r#"{"error":"boom"}"#).unwrap(),
            Some(StreamEvent::Error("boom".to_string()))
        );
        assert_eq!(StreamEvent::parse_line("   ").unwrap(), None);
        assert_eq!(StreamEvent::parse_line("{}").unwrap(), None);
        assert!(StreamEvent::parse_line("not json").is_err());
    }

    #[test]
    fn test_line_buffer_carries_partial_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"{\"resp").is_empty());
        let lines = buf.push(b"onse\":\"a\"}\n{\"response\":\"b\"}\n{\"x\"");
        assert_eq!(lines, vec![r#"{"response":"a"}"#, r#"{"response":"b"}"#]);
        assert_eq!(buf.finish().as_deref(), Some(r#"{"x""#));
    }
}
