// src/core/symbols.rs
use std::collections::HashMap;

/// What a local name was bound to by an import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    /// `import numpy` / `import numpy as np`
    Module { module: String },
    /// `from numpy import array` / `from numpy import array as arr`
    Member { module: String, member: String },
}

impl ImportBinding {
    pub fn module(&self) -> &str {
        match self {
            ImportBinding::Module { module } => module,
            ImportBinding::Member { module, .. } => module,
        }
    }
}

/// Per-file table of import aliases.
///
/// Plain and member imports live in separate maps. Binding a name in one map
/// removes it from the other, so a later import always shadows an earlier one.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    modules: HashMap<String, String>,
    members: HashMap<String, (String, String)>,
    imported_modules: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `import <module> [as <local>]`
    pub fn bind_module(&mut self, local: &str, module: &str) {
        self.members.remove(local);
        self.modules.insert(local.to_string(), module.to_string());
    }

    /// Record `from <module> import <member> [as <local>]`
    pub fn bind_member(&mut self, local: &str, module: &str, member: &str) {
        self.modules.remove(local);
        self.members
            .insert(local.to_string(), (module.to_string(), member.to_string()));
    }

    /// Remember that a module was imported, whether or not anything is called on it
    pub fn record_import(&mut self, module: &str) {
        if !self.imported_modules.iter().any(|m| m == module) {
            self.imported_modules.push(module.to_string());
        }
    }

    pub fn module_alias(&self, local: &str) -> Option<&str> {
        self.modules.get(local).map(String::as_str)
    }

    pub fn member_alias(&self, local: &str) -> Option<(&str, &str)> {
        self.members
            .get(local)
            .map(|(module, member)| (module.as_str(), member.as_str()))
    }

    /// Look up a local name, member imports first
    pub fn lookup(&self, local: &str) -> Option<ImportBinding> {
        if let Some((module, member)) = self.member_alias(local) {
            return Some(ImportBinding::Member {
                module: module.to_string(),
                member: member.to_string(),
            });
        }
        self.module_alias(local).map(|module| ImportBinding::Module {
            module: module.to_string(),
        })
    }

    /// Every module path named by an import statement, in first-seen order
    pub fn imported_modules(&self) -> &[String] {
        &self.imported_modules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings() {
        let mut table = SymbolTable::new();
        table.bind_module("np", "numpy");
        table.bind_member("arr", "numpy", "array");

        assert_eq!(table.module_alias("np"), Some("numpy"));
        assert_eq!(table.member_alias("arr"), Some(("numpy", "array")));
        assert_eq!(
            table.lookup("arr"),
            Some(ImportBinding::Member {
                module: "numpy".to_string(),
                member: "array".to_string()
            })
        );
        assert_eq!(table.lookup("missing"), None);
    }

    #[test]
    fn test_rebinding_shadows_previous_import() {
        let mut table = SymbolTable::new();
        table.bind_module("tqdm", "tqdm");
        table.bind_member("tqdm", "tqdm", "tqdm");

        assert_eq!(table.module_alias("tqdm"), None);
        assert_eq!(table.lookup("tqdm").unwrap().module(), "tqdm");

        table.bind_module("tqdm", "tqdm.auto");
        assert_eq!(table.member_alias("tqdm"), None);
        assert_eq!(table.module_alias("tqdm"), Some("tqdm.auto"));
    }

    #[test]
    fn test_record_import_deduplicates() {
        let mut table = SymbolTable::new();
        table.record_import("alpha");
        table.record_import("alpha.sub");
        table.record_import("alpha");

        assert_eq!(table.imported_modules(), ["alpha".to_string(), "alpha.sub".to_string()]);
    }
}
