// src/core/catalog.rs
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ReqsmithError, Result};

/// File name suffix of per-library catalog documents
const LIBRARY_FILE_SUFFIX: &str = "_signatures.json";

/// Declared parameters of one function in one library version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSignature {
    /// All parameter names, in declaration order
    pub parameter_names: Vec<String>,
    pub required: BTreeSet<String>,
    pub optional: BTreeSet<String>,
}

impl FunctionSignature {
    pub fn accepts(&self, parameter: &str) -> bool {
        self.parameter_names.iter().any(|p| p == parameter)
    }

    /// Read a function entry. Anything that is not an object is not a
    /// function; missing fields are empty.
    fn from_value(value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let strings = |keys: &[&str]| -> Vec<String> {
            keys.iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_array))
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        Some(Self {
            parameter_names: strings(&["parameter_names", "parameters"]),
            required: strings(&["required", "required_params"]).into_iter().collect(),
            optional: strings(&["optional", "optional_params"]).into_iter().collect(),
        })
    }
}

/// Function name -> signature for one version
pub type VersionSignatures = BTreeMap<String, FunctionSignature>;

/// Every catalogued version of one library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryCatalog {
    pub versions: BTreeMap<String, VersionSignatures>,
}

impl LibraryCatalog {
    /// Accepts both `{"versions": {...}, ...}` records and bare `{version: {...}}` maps
    pub fn from_value(value: &Value) -> Result<Self> {
        let document = value
            .as_object()
            .ok_or_else(|| ReqsmithError::Catalog("library entry is not an object".to_string()))?;

        let versions = match document.get("versions").and_then(Value::as_object) {
            Some(versions) => versions,
            None => document,
        };

        let versions = versions
            .iter()
            .map(|(version, functions)| (version.clone(), read_functions(functions)))
            .collect();

        Ok(Self { versions })
    }
}

fn read_functions(value: &Value) -> VersionSignatures {
    let Some(functions) = value.as_object() else {
        return VersionSignatures::new();
    };

    functions
        .iter()
        .filter_map(|(name, entry)| match FunctionSignature::from_value(entry) {
            Some(signature) => Some((name.clone(), signature)),
            None => {
                debug!("Ignoring malformed signature entry for {}", name);
                None
            }
        })
        .collect()
}

/// Read-only snapshot of signature data for all known libraries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureCatalog {
    libraries: BTreeMap<String, LibraryCatalog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStats {
    pub total_libraries: usize,
    pub total_versions: usize,
    pub total_functions: usize,
    pub libraries: Vec<String>,
}

impl SignatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON document or a directory of `<library>_signatures.json` files
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load_directory(path)
        } else if path.is_file() {
            let content = std::fs::read_to_string(path)?;
            Self::from_json_str(&content)
        } else {
            Err(ReqsmithError::Catalog(format!(
                "signature catalog not found at {}",
                path.display()
            )))
        }
    }

    /// Parse a `{library: library_document}` JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let libraries = value
            .as_object()
            .ok_or_else(|| ReqsmithError::Catalog("catalog root is not an object".to_string()))?;

        let mut catalog = Self::new();
        for (name, document) in libraries {
            match LibraryCatalog::from_value(document) {
                Ok(library) => catalog.insert(name, library),
                Err(e) => warn!("⚠️ Skipping catalog entry for {}: {}", name, e),
            }
        }
        Ok(catalog)
    }

    fn load_directory(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ReqsmithError::FileSystem(e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy();
            let Some(stem) = file_name.strip_suffix(LIBRARY_FILE_SUFFIX) else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let loaded = std::fs::read_to_string(entry.path())
                .map_err(ReqsmithError::from)
                .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?))
                .and_then(|value| {
                    let name = value
                        .get("library_name")
                        .and_then(Value::as_str)
                        .unwrap_or(stem)
                        .to_string();
                    Ok((name, LibraryCatalog::from_value(&value)?))
                });

            match loaded {
                Ok((name, library)) => {
                    debug!("Loaded {} versions of {}", library.versions.len(), name);
                    catalog.insert(&name, library);
                }
                Err(e) => warn!("⚠️ Error loading {}: {}", entry.path().display(), e),
            }
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, name: &str, library: LibraryCatalog) {
        self.libraries.insert(name.to_string(), library);
    }

    pub fn library(&self, name: &str) -> Option<&LibraryCatalog> {
        self.libraries.get(name)
    }

    pub fn libraries(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total_libraries: self.libraries.len(),
            total_versions: self.libraries.values().map(|l| l.versions.len()).sum(),
            total_functions: self
                .libraries
                .values()
                .flat_map(|l| l.versions.values())
                .map(|functions| functions.len())
                .sum(),
            libraries: self.libraries.keys().cloned().collect(),
        }
    }
}
