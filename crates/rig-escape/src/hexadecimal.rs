//! Hex digit pairs

use crate::{strip_whitespace, EscapeError};

/// Decode hex digit pairs, ignoring whitespace anywhere in the input
pub fn decode(text: &str) -> Result<Vec<u8>, EscapeError> {
    Ok(hex::decode(strip_whitespace(text))?)
}

/// Lowercase digit pairs with no separators
pub fn render(data: &[u8]) -> String {
    hex::encode(data)
}
