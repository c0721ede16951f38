//! Gopher item types and the extension-based classifier.

use std::collections::HashMap;

/// Gopher item type, the first character of every menu line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `0` plain text file
    Text,
    /// `1` directory
    Directory,
    /// `3` error
    Error,
    /// `7` full-text search
    Search,
    /// `9` binary file
    Binary,
    /// `g` GIF image
    Gif,
    /// `h` HTML document
    Html,
    /// `i` informational line
    Info,
    /// `I` generic image
    Image,
    /// `s` sound file
    Sound,
}

impl ItemType {
    pub fn code(self) -> char {
        match self {
            ItemType::Text => '0',
            ItemType::Directory => '1',
            ItemType::Error => '3',
            ItemType::Search => '7',
            ItemType::Binary => '9',
            ItemType::Gif => 'g',
            ItemType::Html => 'h',
            ItemType::Info => 'i',
            ItemType::Image => 'I',
            ItemType::Sound => 's',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        let item_type = match code {
            '0' => ItemType::Text,
            '1' => ItemType::Directory,
            '3' => ItemType::Error,
            '7' => ItemType::Search,
            '9' => ItemType::Binary,
            'g' => ItemType::Gif,
            'h' => ItemType::Html,
            'i' => ItemType::Info,
            'I' => ItemType::Image,
            's' => ItemType::Sound,
            _ => return None,
        };
        Some(item_type)
    }
}

/// Built-in extension table. Keys are matched case-sensitively.
const DEFAULT_TYPES: &[(&str, ItemType)] = &[
    ("aiff", ItemType::Sound),
    ("au", ItemType::Sound),
    ("gif", ItemType::Gif),
    ("go", ItemType::Text),
    ("html", ItemType::Html),
    ("jpeg", ItemType::Image),
    ("jpg", ItemType::Image),
    ("mp3", ItemType::Sound),
    ("png", ItemType::Image),
    ("txt", ItemType::Text),
    ("wav", ItemType::Sound),
];

/// Maps file extensions to item types.
///
/// Starts from the built-in table; configured overrides replace or extend
/// it. Anything unmatched is served as [`ItemType::Binary`].
#[derive(Debug, Clone)]
pub struct TypeMap {
    by_extension: HashMap<String, ItemType>,
}

impl TypeMap {
    pub fn new() -> Self {
        let by_extension = DEFAULT_TYPES
            .iter()
            .map(|(ext, item_type)| (ext.to_string(), *item_type))
            .collect();

        Self { by_extension }
    }

    /// Build the default table with `overrides` applied on top.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, ItemType)>,
    {
        let mut map = Self::new();
        for (ext, item_type) in overrides {
            map.insert(ext, item_type);
        }
        map
    }

    pub fn insert(&mut self, extension: impl Into<String>, item_type: ItemType) {
        let extension: String = extension.into();
        let extension = extension.trim_start_matches('.');
        self.by_extension.insert(extension.to_string(), item_type);
    }

    /// Classify a file name by the text after its final `.`.
    pub fn classify(&self, name: &str) -> ItemType {
        name.rsplit_once('.')
            .and_then(|(_, ext)| self.by_extension.get(ext))
            .copied()
            .unwrap_or(ItemType::Binary)
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let types = TypeMap::new();
        assert_eq!(types.classify("a.txt"), ItemType::Text);
        assert_eq!(types.classify("main.go"), ItemType::Text);
        assert_eq!(types.classify("song.mp3"), ItemType::Sound);
        assert_eq!(types.classify("clip.au"), ItemType::Sound);
        assert_eq!(types.classify("logo.gif"), ItemType::Gif);
        assert_eq!(types.classify("index.html"), ItemType::Html);
        assert_eq!(types.classify("photo.jpeg"), ItemType::Image);
        assert_eq!(types.classify("photo.png"), ItemType::Image);
    }

    #[test]
    fn test_fallback_to_binary() {
        let types = TypeMap::new();
        assert_eq!(types.classify("noext"), ItemType::Binary);
        assert_eq!(types.classify("archive.tar.gz"), ItemType::Binary);
        assert_eq!(types.classify("trailing."), ItemType::Binary);
    }

    #[test]
    fn test_case_sensitive() {
        let types = TypeMap::new();
        assert_eq!(types.classify("a.JPG"), ItemType::Binary);
        assert_eq!(types.classify("a.Txt"), ItemType::Binary);
    }

    #[test]
    fn test_final_extension_wins() {
        let types = TypeMap::new();
        assert_eq!(types.classify("notes.txt.png"), ItemType::Image);
        assert_eq!(types.classify(".txt"), ItemType::Text);
    }

    #[test]
    fn test_overrides() {
        let types = TypeMap::with_overrides([
            ("md".to_string(), ItemType::Text),
            (".txt".to_string(), ItemType::Binary),
        ]);
        assert_eq!(types.classify("README.md"), ItemType::Text);
        assert_eq!(types.classify("a.txt"), ItemType::Binary);
        assert_eq!(types.classify("a.gif"), ItemType::Gif);
    }

    #[test]
    fn test_code_mapping() {
        for code in ['0', '1', '3', '7', '9', 'g', 'h', 'i', 'I', 's'] {
            let item_type = ItemType::from_code(code).unwrap();
            assert_eq!(item_type.code(), code);
        }
        assert_eq!(ItemType::from_code('x'), None);
    }
}
