//! Server-sent-event framing
//!
//! Decoding side: [`Utf8Decoder`] turns raw chunks into text and
//! [`EventParser`] re-frames that text into events. Encoding side:
//! [`encode_text_event`] produces the `{"text": ...}` frames completion
//! streams carry.

mod decoder;
mod parser;

pub use decoder::Utf8Decoder;
pub use parser::{EventParser, ParsedEvent, SseEvent};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// JSON payload of one streamed completion fragment
///
/// A missing or null `text` reads as an empty fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: Option<String>,
}

impl TextPayload {
    pub fn into_text(self) -> String {
        self.text.unwrap_or_default()
    }
}

/// Encode a text fragment as a complete `message` event
pub fn encode_text_event(text: &str) -> Bytes {
    let payload = serde_json::json!({ "text": text });
    Bytes::from(format!("event: message\ndata: {}\n\n", payload))
}
