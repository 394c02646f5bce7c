//! Language-specific analyzers
//!
//! Each language gets its own module that turns one source unit into the
//! imports it declares and the library calls it makes.

mod python;

pub use python::PythonAnalyzer;

use crate::error::Result;
use super::FileUsage;

/// Trait that all language analyzers must implement
pub trait LanguageAnalyzer {
    /// Parse one source unit and extract its imports and resolved call sites
    fn analyze(&mut self, content: &str, file_path: &std::path::Path) -> Result<FileUsage>;

    /// Get the file extensions this analyzer handles
    fn file_extensions(&self) -> &[&str];

    /// Get the language name
    fn language_name(&self) -> &str;
}
