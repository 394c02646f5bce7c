// src/core/resolver.rs
use crate::config::LibraryEntry;

/// Maps an import root (possibly a dotted submodule path) to the library
/// that distributes it.
///
/// Exact matches are tried across the whole table before any submodule
/// match. When several entries claim the same root, the one declared first
/// wins; the table is never reordered or deduplicated.
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    entries: Vec<LibraryEntry>,
}

impl LibraryResolver {
    pub fn new(entries: Vec<LibraryEntry>) -> Self {
        Self { entries }
    }

    /// Resolve a module path to its library name
    pub fn resolve(&self, module_root: &str) -> Option<&str> {
        if module_root.is_empty() || module_root.starts_with('.') {
            return None;
        }

        let exact = self
            .entries
            .iter()
            .find(|entry| entry.roots.iter().any(|root| root == module_root));
        if let Some(entry) = exact {
            return Some(entry.name.as_str());
        }

        self.entries
            .iter()
            .find(|entry| {
                entry.roots.iter().any(|root| {
                    module_root.len() > root.len()
                        && module_root.starts_with(root.as_str())
                        && module_root.as_bytes()[root.len()] == b'.'
                })
            })
            .map(|entry| entry.name.as_str())
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::new(crate::config::default_libraries())
    }
}
