//! Byte-range resolution for seekable audio delivery.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Requested range not satisfiable for a {size}-byte file")]
    NotSatisfiable { size: u64 },
}

/// Inclusive byte span of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; never zero since both ends are inclusive.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Resolve a `Range` header against a file of `size` bytes.
///
/// `Ok(None)` means "serve the whole file": no header, or a header that is not
/// a parseable `bytes=` range. A missing start defaults to 0 and a missing end
/// to the last byte; an end past the file is clamped. Only the first range of a
/// multi-range request is honoured.
pub fn resolve_range(header: Option<&str>, size: u64) -> Result<Option<ByteRange>, RangeError> {
    let Some((start, end)) = header.and_then(parse_range_header) else {
        return Ok(None);
    };

    if size == 0 {
        return Err(RangeError::NotSatisfiable { size });
    }

    let last = size - 1;
    let start = start.unwrap_or(0);
    let end = end.unwrap_or(last).min(last);

    if start > end {
        return Err(RangeError::NotSatisfiable { size });
    }

    Ok(Some(ByteRange { start, end }))
}

/// Parse "bytes=start-end" into its optional bounds
fn parse_range_header(header: &str) -> Option<(Option<u64>, Option<u64>)> {
    let header = header.trim();
    let (unit, spec) = header.split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return None;
    }
    let first = spec.split(',').next()?.trim();
    let (start, end) = first.split_once('-')?;
    let bound = |s: &str| -> Option<Option<u64>> {
        let s = s.trim();
        if s.is_empty() {
            Some(None)
        } else {
            s.parse().ok().map(Some)
        }
    };
    Some((bound(start)?, bound(end)?))
}

/// Audio content type from the stored file's extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        _ => "audio/mpeg",
    }
}

/// Image content type for cover art files.
pub fn image_content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
