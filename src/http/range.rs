//! Byte range requests
//!
//! Single `bytes=` ranges for stored files. Multi-range and malformed headers
//! fall back to the full body, as RFC 9110 allows.

/// Inclusive byte range inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value, e.g. `bytes 0-99/1000`
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// What to send for a request against a file of known size
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable `Range` header: 200 with the whole file
    Full,
    /// 206 with this slice
    Partial(ByteRange),
    /// 416 with `Content-Range: bytes */<total>`
    Unsatisfiable,
}

/// Resolve a `Range` header against a file of `total` bytes
///
/// ```
/// use filedrop::http::range::{resolve_range, ByteRange, RangeOutcome};
///
/// assert_eq!(
///     resolve_range(Some("bytes=-10"), 100),
///     RangeOutcome::Partial(ByteRange { start: 90, end: 99 })
/// );
/// assert_eq!(resolve_range(None, 100), RangeOutcome::Full);
/// ```
pub fn resolve_range(header: Option<&str>, total: u64) -> RangeOutcome {
    let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if ranges.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix form: the final `last` bytes
        return match last.parse::<u64>() {
            Ok(0) => RangeOutcome::Unsatisfiable,
            Ok(_) if total == 0 => RangeOutcome::Unsatisfiable,
            Ok(n) => RangeOutcome::Partial(ByteRange {
                start: total.saturating_sub(n),
                end: total - 1,
            }),
            Err(_) => RangeOutcome::Full,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(e) => Some(e),
            Err(_) => return RangeOutcome::Full,
        }
    };

    if end.is_some_and(|e| e < start) {
        return RangeOutcome::Full;
    }
    if start >= total {
        return RangeOutcome::Unsatisfiable;
    }

    let end = end.map_or(total - 1, |e| e.min(total - 1));
    RangeOutcome::Partial(ByteRange { start, end })
}
