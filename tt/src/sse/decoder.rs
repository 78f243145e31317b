//! Incremental UTF-8 decoding across chunk boundaries

use tracing::debug;

/// Decodes a byte stream chunk by chunk without splitting characters
///
/// An incomplete multi-byte sequence at the end of a chunk is held back until
/// the next chunk completes it. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning every complete character available
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is well formed
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence; wait for more bytes
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let held = rest.len();
        let consumed = self.pending.len() - held;
        self.pending.drain(..consumed);
        if held > 0 {
            debug!(held, "Utf8Decoder::decode: holding incomplete sequence");
        }
        out
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        debug!(held = self.pending.len(), "Utf8Decoder::finish: truncated sequence at end of stream");
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
