// src/core/call_site.rs
use std::collections::BTreeSet;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use super::symbols::{ImportBinding, SymbolTable};

/// Where a call was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
}

/// A call whose callee resolved to a function of some module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub function: String,
    pub module: String,
    /// Keyword argument names only; positional arguments carry no name
    pub arguments: BTreeSet<String>,
    pub location: SourceLocation,
}

/// The shape of a call's callee expression, reduced to what resolution needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee<'a> {
    /// `f(...)`
    Name(&'a str),
    /// `base.attribute(...)` where `base` is a bare name
    Attribute { base: &'a str, attribute: &'a str },
    /// Anything else: `a.b.c(...)`, `f()(...)`, `x[0](...)`
    Unsupported,
}

/// Resolve a callee to `(function, module)` using the file's imports.
///
/// Returns `None` when the callee cannot be attributed to a module; such calls
/// are dropped rather than guessed.
pub fn resolve_callee(callee: Callee<'_>, symbols: &SymbolTable) -> Option<(String, String)> {
    match callee {
        Callee::Name(name) => match symbols.lookup(name)? {
            ImportBinding::Member { module, member } => Some((member, module)),
            // Calling an imported module object directly: the module stands in
            // for both the function and its owner.
            ImportBinding::Module { module } => Some((module.clone(), module)),
        },
        Callee::Attribute { base, attribute } => match symbols.lookup(base) {
            Some(binding) => Some((attribute.to_string(), binding.module().to_string())),
            // Untracked base: assume it names a module directly.
            None => Some((attribute.to_string(), base.to_string())),
        },
        Callee::Unsupported => None,
    }
}
