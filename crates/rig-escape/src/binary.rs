//! Binary digit octets
//!
//! Every eight digits make one byte, most significant bit first.

use crate::{strip_whitespace, EscapeError};

/// Decode `0`/`1` octets, ignoring whitespace anywhere in the input
pub fn decode(text: &str) -> Result<Vec<u8>, EscapeError> {
    let digits: Vec<char> = strip_whitespace(text).chars().collect();
    if digits.len() % 8 != 0 {
        return Err(EscapeError::BinaryLength(digits.len()));
    }

    digits
        .chunks(8)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            chunk.iter().enumerate().try_fold(0u8, |byte, (bit_idx, &ch)| {
                let bit = match ch {
                    '0' => 0,
                    '1' => 1,
                    _ => {
                        return Err(EscapeError::BinaryDigit {
                            ch,
                            index: chunk_idx * 8 + bit_idx,
                        })
                    }
                };
                Ok((byte << 1) | bit)
            })
        })
        .collect()
}

/// Space-separated octets, e.g. `01000001 00001010`
pub fn render(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:08b}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
