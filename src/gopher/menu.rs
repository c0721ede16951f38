//! Gopher menu lines and their wire rendering.
//!
//! A menu line is `{type}{display}\t{selector}\t{host}\t{port}\r\n` and a
//! menu always ends with the terminator line `.\r\n`.

use super::item_type::ItemType;
use bytes::{Bytes, BytesMut};
use std::fmt::Write;

/// Menu terminator line
pub const TERMINATOR: &[u8] = b".\r\n";

/// One line of a directory menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub item_type: ItemType,
    pub display: String,
    pub selector: String,
    pub host: String,
    /// `None` renders an empty port field (error lines).
    pub port: Option<u16>,
}

impl Entry {
    pub fn new(
        item_type: ItemType,
        display: impl Into<String>,
        selector: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            item_type,
            display: display.into(),
            selector: selector.into(),
            host: host.into(),
            port: Some(port),
        }
    }

    /// An error line. Selector, host and port are left empty.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Error,
            display: message.into(),
            selector: String::new(),
            host: String::new(),
            port: None,
        }
    }

    /// Append the wire form of this entry to `out`.
    pub fn render(&self, out: &mut BytesMut) {
        out.reserve(self.display.len() + self.selector.len() + self.host.len() + 12);
        // Writing into BytesMut cannot fail.
        let _ = write!(
            out,
            "{}{}\t{}\t{}\t",
            self.item_type.code(),
            self.display,
            self.selector,
            self.host
        );
        if let Some(port) = self.port {
            let _ = write!(out, "{port}");
        }
        out.extend_from_slice(b"\r\n");
    }
}

/// Ordered sequence of menu entries; insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    entries: Vec<Entry>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-line error menu.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry::error(message)],
        }
    }

    #[cfg(test)]
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every entry followed by the terminator line.
    pub fn render(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(64 * (self.entries.len() + 1));
        for entry in &self.entries {
            entry.render(&mut out);
        }
        out.extend_from_slice(TERMINATOR);
        out.freeze()
    }
}

impl From<Vec<Entry>> for Listing {
    fn from(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}
