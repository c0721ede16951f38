//! One-level directory menus.

use super::item_type::{ItemType, TypeMap};
use super::menu::{Entry, Listing};
use std::io;
use std::path::Path;
use tracing::debug;

/// Builds menus for directories under the content root.
///
/// Every entry advertises the same host and port so clients know where to
/// send the follow-up request.
#[derive(Debug, Clone)]
pub struct Lister {
    host: String,
    port: u16,
    types: TypeMap,
}

impl Lister {
    pub fn new(host: impl Into<String>, port: u16, types: TypeMap) -> Self {
        Self {
            host: host.into(),
            port,
            types,
        }
    }

    /// List the immediate children of `dir`.
    ///
    /// `selector` is the normalized selector that resolved to `dir`; child
    /// selectors are built beneath it. Subdirectories are listed but never
    /// descended into. Entries are sorted by name.
    pub fn list(&self, dir: &Path, selector: &str) -> io::Result<Listing> {
        let mut entries = Vec::new();

        for child in std::fs::read_dir(dir)? {
            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let name = match child.file_name().into_string() {
                Ok(name) if is_menu_safe(&name) => name,
                Ok(name) => {
                    debug!(name = ?name, "Skipping name that cannot be framed");
                    continue;
                }
                Err(name) => {
                    debug!(name = ?name, "Skipping non UTF-8 name");
                    continue;
                }
            };

            let file_type = match child.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!(name = %name, error = %e, "Skipping entry without file type");
                    continue;
                }
            };

            let item_type = if file_type.is_dir() {
                ItemType::Directory
            } else {
                self.types.classify(&name)
            };

            let child_selector = join_selector(selector, &name);
            entries.push(Entry::new(
                item_type,
                name,
                child_selector,
                self.host.as_str(),
                self.port,
            ));
        }

        entries.sort_by(|a, b| a.display.cmp(&b.display));
        Ok(Listing::from(entries))
    }
}

/// Names carrying menu delimiters would corrupt the line framing.
fn is_menu_safe(name: &str) -> bool {
    !name.contains(['\t', '\r', '\n'])
}

fn join_selector(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{name}")
}
