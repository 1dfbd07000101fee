//! Escape Schemes
//!
//! This crate turns the text an operator types into the raw bytes that get
//! written to a device. Each scheme is a pure, stateless decoder:
//!
//! - **No escaping**: the UTF-8 bytes of the text, unchanged
//! - **C-style**: conventional backslash escapes (`\n`, `\t`, `\xHH`, `\"`, ...)
//! - **Hex**: whitespace-separated hex digit pairs
//! - **Binary**: whitespace-separated groups of eight `0`/`1` digits, MSB first
//!
//! Every scheme can also render bytes back into text it would accept, which
//! is what traffic displays use.
//!
//! # Example
//!
//! ```rust
//! use rig_escape::EscapeScheme;
//!
//! let scheme: EscapeScheme = "hex".parse().unwrap();
//! assert_eq!(scheme.decode("DE AD be ef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
//!
//! let scheme = EscapeScheme::lookup("C-style").unwrap();
//! assert_eq!(scheme.decode(r"a\nb").unwrap(), b"a\nb");
//! ```

pub mod binary;
pub mod cstyle;
pub mod error;
pub mod hexadecimal;

use std::fmt;
use std::str::FromStr;

pub use error::EscapeError;

/// A named text-to-bytes encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EscapeScheme {
    /// Text bytes are sent as typed
    #[default]
    Raw,
    /// Backslash escapes as in a double-quoted C string literal
    CStyle,
    /// Hex digit pairs, whitespace ignored
    Hex,
    /// Eight binary digits per byte, whitespace ignored
    Binary,
}

impl EscapeScheme {
    /// Every registered scheme, in menu order
    pub const ALL: [EscapeScheme; 4] = [
        EscapeScheme::Raw,
        EscapeScheme::CStyle,
        EscapeScheme::Hex,
        EscapeScheme::Binary,
    ];

    /// Human-readable name shown to the operator
    pub fn name(&self) -> &'static str {
        match self {
            EscapeScheme::Raw => "No escaping",
            EscapeScheme::CStyle => "C-style",
            EscapeScheme::Hex => "Hex",
            EscapeScheme::Binary => "Binary",
        }
    }

    /// Find a scheme by display name or short key, ignoring case
    pub fn lookup(name: &str) -> Result<Self, EscapeError> {
        let key = name.trim().to_ascii_lowercase();
        let scheme = match key.as_str() {
            "no escaping" | "raw" | "none" => EscapeScheme::Raw,
            "c-style" | "cstyle" | "c" => EscapeScheme::CStyle,
            "hex" => EscapeScheme::Hex,
            "binary" | "bin" => EscapeScheme::Binary,
            _ => return Err(EscapeError::UnknownScheme(name.to_string())),
        };
        Ok(scheme)
    }

    /// Decode operator text into the payload bytes
    pub fn decode(&self, text: &str) -> Result<Vec<u8>, EscapeError> {
        match self {
            EscapeScheme::Raw => Ok(text.as_bytes().to_vec()),
            EscapeScheme::CStyle => cstyle::decode(text),
            EscapeScheme::Hex => hexadecimal::decode(text),
            EscapeScheme::Binary => binary::decode(text),
        }
    }

    /// Render bytes as text this scheme decodes back to the same bytes
    ///
    /// `Raw` is lossy for payloads that are not valid UTF-8.
    pub fn render(&self, data: &[u8]) -> String {
        match self {
            EscapeScheme::Raw => String::from_utf8_lossy(data).into_owned(),
            EscapeScheme::CStyle => cstyle::render(data),
            EscapeScheme::Hex => hexadecimal::render(data),
            EscapeScheme::Binary => binary::render(data),
        }
    }
}

impl fmt::Display for EscapeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EscapeScheme {
    type Err = EscapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s)
    }
}

/// Drop the whitespace the Hex and Binary schemes allow between digits
pub(crate) fn strip_whitespace(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '\n' | '\r' | '\t'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_display_names() {
        for scheme in EscapeScheme::ALL {
            assert_eq!(EscapeScheme::lookup(scheme.name()).unwrap(), scheme);
        }
    }

    #[test]
    fn test_lookup_short_keys() {
        assert_eq!(EscapeScheme::lookup("RAW").unwrap(), EscapeScheme::Raw);
        assert_eq!(EscapeScheme::lookup(" c ").unwrap(), EscapeScheme::CStyle);
        assert_eq!(EscapeScheme::lookup("bin").unwrap(), EscapeScheme::Binary);
    }

    #[test]
    fn test_lookup_unknown() {
        let err = "base64".parse::<EscapeScheme>().unwrap_err();
        assert_eq!(err, EscapeError::UnknownScheme("base64".into()));
        assert_eq!(err.to_string(), "unknown escape: base64");
    }

    #[test]
    fn test_raw_never_fails() {
        let text = "tab\there \\x41 \"quoted\" ünïcode";
        assert_eq!(EscapeScheme::Raw.decode(text).unwrap(), text.as_bytes());
        assert_eq!(EscapeScheme::Raw.decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" a\tb\r\nc "), "abc");
    }
}
