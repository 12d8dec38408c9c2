use serde::Serialize;

/// Staged progress event emitted while answering a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnswerEvent {
    /// Progress note.
    Thinking {
        /// Human readable stage description.
        message: String,
    },
    /// Citations of the chunks feeding the answer.
    Sources {
        /// Rendered citation strings.
        sources: Vec<String>,
    },
    /// The complete answer.
    Answer {
        /// Answer text.
        content: String,
    },
    /// Terminal success marker.
    Done,
    /// Terminal failure; no `done` follows.
    Error {
        /// Failure description.
        message: String,
    },
}

impl AnswerEvent {
    pub(crate) fn thinking(message: &str) -> Self {
        Self::Thinking {
            message: message.to_string(),
        }
    }

    /// Whether the event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Render as a server-sent-events frame: `data: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("data: {json}\n\n"),
            Err(error) => format!(
                "data: {{\"type\":\"error\",\"message\":\"failed to encode event: {error}\"}}\n\n"
            ),
        }
    }
}
