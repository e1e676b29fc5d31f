//! Synthetic JSON payloads of an exact byte size.
//!
//! A payload for target size `N` looks like:
//!
//! ```text
//! {"size":"NB","payload":"0123456789ABC...xyz0123..."}
//! ```
//!
//! The filler cycles through `0-9`, `A-Z` and `a-z` so that the output is
//! fully reproducible for a given size. When `N` is too small to even hold
//! the JSON scaffold, the scaffold is returned as-is (and thus is longer than `N`).

use std::io::Write as _;

use bytes::Bytes;

/// Media type of the payloads produced by [`generate`].
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

const FILLER_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const CLOSING_SCAFFOLD: &[u8] = b"\"}";

/// Generate the JSON payload for the given target size.
///
/// The returned length is `target_size` whenever it fits the scaffold,
/// otherwise it is [`scaffold_len`]`(target_size)`.
pub fn generate(target_size: usize) -> Bytes {
    let mut buf = Vec::with_capacity(target_size.max(scaffold_len(target_size)));
    write_opening_scaffold(&mut buf, target_size);

    let limit = target_size.saturating_sub(buf.len() + CLOSING_SCAFFOLD.len());
    buf.extend(FILLER_ALPHABET.iter().cycle().take(limit));

    buf.extend_from_slice(CLOSING_SCAFFOLD);
    Bytes::from(buf)
}

/// Byte length of the JSON scaffold (everything but the filler)
/// for the given target size.
///
/// The digit count of `target_size` is embedded in the scaffold,
/// which is why this is computed rather than constant.
pub fn scaffold_len(target_size: usize) -> usize {
    // {"size":"  +  digits  +  B","payload":"  +  "}
    const FIXED_LEN: usize = 9 + 14 + CLOSING_SCAFFOLD.len();
    FIXED_LEN + decimal_digits(target_size)
}

fn write_opening_scaffold(buf: &mut Vec<u8>, target_size: usize) {
    // writing into a Vec cannot fail
    let _ = write!(buf, r#"{{"size":"{target_size}B","payload":""#);
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
