//! Error types for escape decoding

use thiserror::Error;

/// Errors produced while turning operator text into bytes
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EscapeError {
    /// Scheme name is not one of the registered schemes
    #[error("unknown escape: {0}")]
    UnknownScheme(String),

    /// Input ends in the middle of a backslash escape
    #[error("unterminated escape sequence at offset {offset}")]
    UnterminatedEscape { offset: usize },

    /// Backslash followed by a character that is not an escape
    #[error("unknown escape sequence \\{ch} at offset {offset}")]
    UnknownEscape { ch: char, offset: usize },

    /// `\x`, `\u` or `\U` not followed by enough hex digits
    #[error("malformed \\{kind} escape at offset {offset}: expected {expected} hex digits")]
    MalformedHexEscape {
        kind: char,
        expected: usize,
        offset: usize,
    },

    /// Octal escape larger than one byte
    #[error("octal escape \\{digits} at offset {offset} does not fit in a byte")]
    OctalOutOfRange { digits: String, offset: usize },

    /// `\u`/`\U` value is not a Unicode scalar value
    #[error("invalid code point U+{value:X} at offset {offset}")]
    InvalidCodePoint { value: u32, offset: usize },

    /// Hex scheme input could not be decoded
    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Binary scheme input length is not a whole number of bytes
    #[error("binary input must be a multiple of 8 digits, got {0}")]
    BinaryLength(usize),

    /// Binary scheme input contains something other than `0`/`1`
    #[error("bad character {ch:?} in binary input at digit {index}, expected 1's and 0's")]
    BinaryDigit { ch: char, index: usize },
}
