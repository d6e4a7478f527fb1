//! Expiry tag prepended to every stored payload
//!
//! The tag is 17 ASCII bytes: `_$`, thirteen zero-padded digits of the absolute expiry
//! time in epoch milliseconds, then `$_`. Thirteen zeros mean the entry never expires.

use serde::Serialize;
use std::time::Duration;

/// Width of the expiry tag in bytes
pub const TAG_LEN: usize = 17;

const DIGITS: usize = 13;
const OPEN: &[u8; 2] = b"_$";
const CLOSE: &[u8; 2] = b"$_";
const NEVER_MILLIS: i64 = 0;
const MAX_EXPIRY_MILLIS: i64 = 9_999_999_999_999;

/// When a stored entry stops being readable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    Never,
    /// Absolute epoch milliseconds
    At(i64),
}

impl Expiry {
    /// Expiry for an entry written at `now_millis` with an optional time-to-live
    pub fn after(now_millis: i64, ttl: Option<Duration>) -> Self {
        match ttl {
            None => Expiry::Never,
            Some(ttl) => {
                let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                // 0 is the "never" sentinel, so the earliest representable expiry is 1
                let at = now_millis
                    .saturating_add(ttl)
                    .clamp(NEVER_MILLIS + 1, MAX_EXPIRY_MILLIS);
                Expiry::At(at)
            }
        }
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now_millis,
        }
    }
}

/// A stored file split back into its tag and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Untagged<'a> {
    pub payload: &'a [u8],
    pub expiry: Expiry,
    pub expired: bool,
}

/// Prefix `payload` with its expiry tag
pub fn tag(payload: &[u8], expiry: Expiry) -> Vec<u8> {
    let millis = match expiry {
        Expiry::Never => NEVER_MILLIS,
        Expiry::At(at) => at.clamp(NEVER_MILLIS + 1, MAX_EXPIRY_MILLIS),
    };

    let mut stored = Vec::with_capacity(TAG_LEN + payload.len());
    stored.extend_from_slice(OPEN);
    stored.extend_from_slice(format!("{:0width$}", millis, width = DIGITS).as_bytes());
    stored.extend_from_slice(CLOSE);
    stored.extend_from_slice(payload);
    stored
}

/// Split stored bytes into expiry and payload.
///
/// Returns `None` when the tag is missing or malformed.
pub fn untag(stored: &[u8], now_millis: i64) -> Option<Untagged<'_>> {
    if stored.len() < TAG_LEN {
        return None;
    }
    let (tag, payload) = stored.split_at(TAG_LEN);
    if &tag[..2] != OPEN || &tag[TAG_LEN - 2..] != CLOSE {
        return None;
    }

    let digits = &tag[2..2 + DIGITS];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let millis: i64 = std::str::from_utf8(digits).ok()?.parse().ok()?;

    let expiry = if millis == NEVER_MILLIS {
        Expiry::Never
    } else {
        Expiry::At(millis)
    };

    Some(Untagged {
        payload,
        expiry,
        expired: expiry.is_expired(now_millis),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_layout() {
        let stored = tag(b"hello", Expiry::At(1_700_000_000_123));
        assert_eq!(&stored[..TAG_LEN], b"_$1700000000123$_");
        assert_eq!(&stored[TAG_LEN..], b"hello");
    }

    #[test]
    fn test_never_uses_zero_sentinel() {
        let stored = tag(b"x", Expiry::Never);
        assert_eq!(&stored[..TAG_LEN], b"_$0000000000000$_");

        let untagged = untag(&stored, i64::MAX).unwrap();
        assert_eq!(untagged.expiry, Expiry::Never);
        assert!(!untagged.expired);
        assert_eq!(untagged.payload, b"x");
    }

    #[test]
    fn test_small_timestamps_are_zero_padded() {
        let stored = tag(b"", Expiry::At(1_000));
        assert_eq!(&stored[..], b"_$0000000001000$_");
    }

    #[test]
    fn test_expired_at_boundary() {
        let stored = tag(b"v", Expiry::At(1_000));
        assert!(!untag(&stored, 999).unwrap().expired);
        assert!(untag(&stored, 1_000).unwrap().expired);

        // Payload is still extracted for expired entries
        assert_eq!(untag(&stored, 5_000).unwrap().payload, b"v");
    }

    #[test]
    fn test_after_computes_absolute_expiry() {
        assert_eq!(Expiry::after(10_000, None), Expiry::Never);
        assert_eq!(
            Expiry::after(10_000, Some(Duration::from_millis(1_500))),
            Expiry::At(11_500)
        );
    }

    #[test]
    fn test_after_never_produces_the_sentinel() {
        assert_eq!(Expiry::after(0, Some(Duration::ZERO)), Expiry::At(1));
        assert_eq!(
            Expiry::after(i64::MAX, Some(Duration::from_secs(1))),
            Expiry::At(MAX_EXPIRY_MILLIS)
        );
    }

    #[test]
    fn test_short_input_is_rejected() {
        assert!(untag(b"", 0).is_none());
        assert!(untag(b"_$00000$_", 0).is_none());
    }

    #[test]
    fn test_corrupt_tag_is_rejected() {
        assert!(untag(b"_$00000000x0000$_payload", 0).is_none());
        assert!(untag(b"#$0000000000000$_payload", 0).is_none());
        assert!(untag(b"_$0000000000000$#payload", 0).is_none());
        assert!(untag(b"plain old payload bytes", 0).is_none());
    }
}
