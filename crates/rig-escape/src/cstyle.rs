//! C-style backslash escapes
//!
//! The text is treated as the body of a double-quoted literal. A bare `"` is
//! taken literally, so operators never need to escape quotes. Recognised
//! escapes:
//!
//! | escape | byte(s) |
//! |---|---|
//! | `\a \b \f \n \r \t \v` | 0x07 0x08 0x0C 0x0A 0x0D 0x09 0x0B |
//! | `\\ \" \' \?` | the character itself |
//! | `\o`, `\oo`, `\ooo` | octal value, at most 0o377 |
//! | `\xHH` | exactly two hex digits, one raw byte |
//! | `\uHHHH`, `\UHHHHHHHH` | Unicode scalar value, UTF-8 encoded |

use std::iter::Peekable;
use std::str::CharIndices;

use crate::EscapeError;

/// Decode C-style escapes into bytes
pub fn decode(text: &str) -> Result<Vec<u8>, EscapeError> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            let mut utf8 = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }

        let Some((_, esc)) = chars.next() else {
            return Err(EscapeError::UnterminatedEscape { offset });
        };

        match esc {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0C),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0B),
            '\\' | '"' | '\'' | '?' => out.push(esc as u8),
            '0'..='7' => out.push(octal(esc, &mut chars, offset)?),
            'x' => {
                let value = hex_digits(&mut chars, 'x', 2, offset)?;
                out.push(value as u8);
            }
            'u' | 'U' => {
                let expected = if esc == 'u' { 4 } else { 8 };
                let value = hex_digits(&mut chars, esc, expected, offset)?;
                let ch = char::from_u32(value)
                    .ok_or(EscapeError::InvalidCodePoint { value, offset })?;
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            other => {
                return Err(EscapeError::UnknownEscape { ch: other, offset });
            }
        }
    }

    Ok(out)
}

/// Up to three octal digits, the first already consumed
fn octal(
    first: char,
    chars: &mut Peekable<CharIndices<'_>>,
    offset: usize,
) -> Result<u8, EscapeError> {
    let mut digits = String::from(first);
    while digits.len() < 3 {
        match chars.peek() {
            Some(&(_, c)) if ('0'..='7').contains(&c) => {
                digits.push(c);
                chars.next();
            }
            _ => break,
        }
    }

    let value = digits
        .chars()
        .fold(0u32, |acc, c| acc * 8 + c.to_digit(8).unwrap_or(0));
    u8::try_from(value).map_err(|_| EscapeError::OctalOutOfRange { digits, offset })
}

/// Exactly `expected` hex digits
fn hex_digits(
    chars: &mut Peekable<CharIndices<'_>>,
    kind: char,
    expected: usize,
    offset: usize,
) -> Result<u32, EscapeError> {
    let mut value = 0u32;
    for _ in 0..expected {
        let digit = chars
            .next()
            .and_then(|(_, c)| c.to_digit(16))
            .ok_or(EscapeError::MalformedHexEscape {
                kind,
                expected,
                offset,
            })?;
        value = (value << 4) | digit;
    }
    Ok(value)
}

/// Render bytes with printable ASCII kept and everything else escaped
pub fn render(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}
