//! Approximate token accounting.

use crucible_protocol::Message;

/// Bytes assumed per token when no native tokenizer is available.
///
/// The heuristic overestimates tokens for non-ASCII content, which only
/// makes compaction fire earlier. That is the safe direction.
const BYTES_PER_TOKEN: usize = 4;

/// Byte-ratio token estimator.
#[derive(Debug, Clone)]
pub struct TokenMeter {
    bytes_per_token: usize,
}

impl Default for TokenMeter {
    fn default() -> Self {
        Self {
            bytes_per_token: BYTES_PER_TOKEN,
        }
    }
}

impl TokenMeter {
    pub fn new(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: bytes_per_token.max(1),
        }
    }

    /// Estimated tokens for a text fragment.
    pub fn estimate(&self, text: &str) -> i64 {
        (text.len() as i64 + self.bytes_per_token as i64 - 1) / self.bytes_per_token as i64
    }

    /// Estimated tokens for a whole message.
    pub fn message_tokens(&self, message: &Message) -> i64 {
        (message.byte_len() as i64 + self.bytes_per_token as i64 - 1)
            / self.bytes_per_token as i64
    }
}

#[cfg(test)]
#[path = "meter.test.rs"]
mod tests;
