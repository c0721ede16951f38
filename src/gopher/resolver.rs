//! Selector parsing and path resolution beneath the content root.
//!
//! Containment relies on normalizing the selector as a rooted path before
//! it is appended to the root: `/../../etc/passwd` cleans to `/etc/passwd`,
//! which can only ever name something inside the root.

use super::error::RequestError;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest selector accepted, excluding the line terminator.
pub const MAX_SELECTOR_LENGTH: usize = 4096;

/// What a resolved selector points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Directory,
    File { len: u64 },
}

/// A selector that names an existing resource inside the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Normalized selector, always starting with `/`
    pub selector: String,
    /// Absolute filesystem path
    pub path: PathBuf,
    pub kind: ResourceKind,
}

/// Read the single selector line a client sends.
///
/// The line terminator (`\r\n` or a bare `\n`) is stripped. A final line
/// without a terminator is accepted when the client closes after sending
/// it; a connection that closes before sending anything is invalid.
pub async fn read_selector<R>(reader: &mut R) -> Result<String, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = AsyncReadExt::take(&mut *reader, MAX_SELECTOR_LENGTH as u64 + 2);
    let mut line = Vec::with_capacity(128);

    let n = limited
        .read_until(b'\n', &mut line)
        .await
        .map_err(|_| RequestError::Invalid)?;
    if n == 0 {
        return Err(RequestError::Invalid);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    if line.len() > MAX_SELECTOR_LENGTH {
        return Err(RequestError::Invalid);
    }

    String::from_utf8(line).map_err(|_| RequestError::Invalid)
}

/// Lexically clean `"/" + selector`.
///
/// Collapses repeated separators, drops `.` segments and resolves `..`
/// against the preceding segment. `..` at the top stays at `/`.
pub fn normalize(selector: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in selector.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    let mut cleaned = String::with_capacity(selector.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() {
        cleaned.push('/');
    }
    cleaned
}

/// Map a normalized selector onto the filesystem below `root`.
pub fn to_path(root: &Path, normalized: &str) -> PathBuf {
    let relative = normalized.trim_start_matches('/');
    if relative.is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative)
    }
}

/// Resolve a raw selector to an existing directory or regular file.
pub async fn resolve(root: &Path, selector: &str) -> Result<Resolved, RequestError> {
    let selector = normalize(selector);
    let path = to_path(root, &selector);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| RequestError::NotFound)?;

    let kind = if metadata.is_dir() {
        ResourceKind::Directory
    } else if metadata.is_file() {
        ResourceKind::File {
            len: metadata.len(),
        }
    } else {
        return Err(RequestError::NotFound);
    };

    Ok(Resolved {
        selector,
        path,
        kind,
    })
}
