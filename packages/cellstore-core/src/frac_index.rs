use rand::Rng;

use crate::error::{Error, Result};

/// Digit alphabet for fractional indices. Byte order matches digit order, so
/// plain string comparison over keys is the canonical notebook order.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u8 = 62;

fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'Z' => Some(byte - b'A' + 10),
        b'a'..=b'z' => Some(byte - b'a' + 36),
        _ => None,
    }
}

fn encode(digits: &[u8]) -> String {
    digits
        .iter()
        .map(|&d| ALPHABET[d as usize] as char)
        .collect()
}

/// Check that a key is a well-formed fractional index: non-empty, every byte
/// in the alphabet, and no trailing zero digit. Keys denote fractions in
/// [0, 1); the no-trailing-zero rule keeps lexicographic order equal to
/// numeric order across keys of different lengths.
pub fn validate_key(key: &str) -> Result<()> {
    decode(key).map(|_| ())
}

fn decode(key: &str) -> Result<Vec<u8>> {
    if key.is_empty() {
        return Err(Error::MalformedKey("empty key".into()));
    }
    let digits = key
        .bytes()
        .map(|b| {
            digit_value(b).ok_or_else(|| Error::MalformedKey(format!("byte {b:#04x} in {key:?}")))
        })
        .collect::<Result<Vec<u8>>>()?;
    if digits.last() == Some(&0) {
        return Err(Error::MalformedKey(format!("trailing zero digit in {key:?}")));
    }
    Ok(digits)
}

/// Minimal digit string strictly between `low` (padded with zero digits) and
/// `high` (`None` = the maximal bound). The result always differs from `high`
/// at some position by a smaller digit, never by being a prefix of it, so any
/// suffix appended afterwards keeps the result below `high`.
fn midpoint(low: &[u8], high: Option<&[u8]>) -> Vec<u8> {
    if let Some(high) = high {
        let mut prefix = 0;
        while prefix < high.len() && low.get(prefix).copied().unwrap_or(0) == high[prefix] {
            prefix += 1;
        }
        if prefix > 0 {
            let rest_low = low.get(prefix..).unwrap_or_default();
            let mut out = high[..prefix].to_vec();
            out.extend(midpoint(rest_low, Some(&high[prefix..])));
            return out;
        }

        let l = low.first().copied().unwrap_or(0);
        let h = high[0];
        if h - l > 1 {
            return vec![(l + h) / 2];
        }
        // Adjacent digits: keep the low digit and allocate in the open
        // interval above the remaining low suffix.
        let mut out = vec![l];
        out.extend(midpoint(low.get(1..).unwrap_or_default(), None));
        return out;
    }

    let l = low.first().copied().unwrap_or(0);
    if BASE - l > 1 {
        return vec![(l + BASE) / 2];
    }
    let mut out = vec![l];
    out.extend(midpoint(low.get(1..).unwrap_or_default(), None));
    out
}

/// Allocate a fractional index strictly between `low` and `high`.
///
/// `None` bounds stand for the minimal/maximal representable value: insert at
/// the start, at the end, or into an empty notebook. The digit-wise midpoint
/// is deterministic; a random tail digit is always appended so that two
/// actors inserting at the same boundary concurrently produce distinct keys
/// with overwhelming probability. The tail digit is never zero, preserving
/// the canonical no-trailing-zero form.
pub fn key_between<R: Rng + ?Sized>(
    low: Option<&str>,
    high: Option<&str>,
    rng: &mut R,
) -> Result<String> {
    if let (Some(l), Some(h)) = (low, high) {
        if l >= h {
            return Err(Error::InvalidKeyRange(format!("{l:?} >= {h:?}")));
        }
    }
    let low_digits = match low {
        Some(key) => decode(key)?,
        None => Vec::new(),
    };
    let high_digits = match high {
        Some(key) => Some(decode(key)?),
        None => None,
    };

    let mut digits = midpoint(&low_digits, high_digits.as_deref());
    digits.push(rng.gen_range(1..BASE));
    Ok(encode(&digits))
}

/// `count` evenly spaced, minimal-length keys in ascending order, used by the
/// rebalancing pass. Deterministic: concurrent rebalances over the same cell
/// window assign identical keys.
pub fn spread_keys(count: usize) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }

    let slots = count as u128 + 1;
    let mut len = 1usize;
    let mut capacity = BASE as u128;
    while capacity <= slots {
        len += 1;
        capacity *= BASE as u128;
    }
    let step = capacity / slots;

    (1..=count as u128)
        .map(|i| {
            let mut value = i * step;
            let mut digits = vec![0u8; len];
            for slot in digits.iter_mut().rev() {
                *slot = (value % BASE as u128) as u8;
                value /= BASE as u128;
            }
            while digits.len() > 1 && digits.last() == Some(&0) {
                digits.pop();
            }
            encode(&digits)
        })
        .collect()
}
