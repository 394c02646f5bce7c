// src/core/aggregator.rs
use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CallSite, FileUsage, LibraryResolver};

/// How one library function is used across the codebase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionUsage {
    /// Union of keyword argument names seen at any call site
    #[serde(default)]
    pub arguments: BTreeSet<String>,
    /// Number of call sites
    #[serde(default)]
    pub calls: u64,
}

impl FunctionUsage {
    pub fn record<I, S>(&mut self, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self.calls += 1;
    }

    fn absorb(&mut self, other: FunctionUsage) {
        self.arguments.extend(other.arguments);
        self.calls += other.calls;
    }
}

/// Library name -> function name -> usage.
///
/// Serializes as `{"lib": {"fn": {"arguments": [...], "calls": n}}}`. A library
/// with an empty function map was imported but never called.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageAggregate {
    libraries: BTreeMap<String, BTreeMap<String, FunctionUsage>>,
}

impl UsageAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a library is present, even with no observed calls
    pub fn touch_library(&mut self, library: &str) {
        self.libraries.entry(library.to_string()).or_default();
    }

    /// Record one call of `library.function` with the given keyword arguments
    pub fn record_call<I, S>(&mut self, library: &str, function: &str, arguments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries
            .entry(library.to_string())
            .or_default()
            .entry(function.to_string())
            .or_default()
            .record(arguments);
    }

    /// Fold another aggregate into this one
    pub fn merge(&mut self, other: UsageAggregate) {
        for (library, functions) in other.libraries {
            let target = self.libraries.entry(library).or_default();
            for (function, usage) in functions {
                target.entry(function).or_default().absorb(usage);
            }
        }
    }

    pub fn libraries(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, FunctionUsage>)> {
        self.libraries
            .iter()
            .map(|(name, functions)| (name.as_str(), functions))
    }

    #[cfg(test)]
    pub fn functions(&self, library: &str) -> Option<&BTreeMap<String, FunctionUsage>> {
        self.libraries.get(library)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// Builds a `UsageAggregate` from per-file analysis results.
///
/// Single writer: per-file results may be produced concurrently but are fed
/// in here one at a time.
pub struct UsageAggregator<'r> {
    resolver: &'r LibraryResolver,
    aggregate: UsageAggregate,
    dropped_calls: usize,
}

impl<'r> UsageAggregator<'r> {
    pub fn new(resolver: &'r LibraryResolver) -> Self {
        Self {
            resolver,
            aggregate: UsageAggregate::new(),
            dropped_calls: 0,
        }
    }

    /// Add one file's imports and call sites
    pub fn add_file(&mut self, usage: &FileUsage) {
        for module in &usage.imported_modules {
            if let Some(library) = self.resolver.resolve(module) {
                self.aggregate.touch_library(library);
            }
        }

        for call_site in &usage.call_sites {
            self.add_call_site(call_site);
        }
    }

    /// Add one call site; dropped if no library claims its module
    pub fn add_call_site(&mut self, call_site: &CallSite) {
        match self.resolver.resolve(&call_site.module) {
            Some(library) => {
                self.aggregate
                    .record_call(library, &call_site.function, call_site.arguments.iter().cloned());
            }
            None => {
                debug!(
                    "Dropping call {}.{} at {}:{} (no known library)",
                    call_site.module,
                    call_site.function,
                    call_site.location.path.display(),
                    call_site.location.line
                );
                self.dropped_calls += 1;
            }
        }
    }

    /// Calls skipped because their module belongs to no known library
    pub fn dropped_calls(&self) -> usize {
        self.dropped_calls
    }

    pub fn finish(self) -> UsageAggregate {
        self.aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryEntry;
    use crate::core::SourceLocation;
    use std::path::PathBuf;

    fn resolver() -> LibraryResolver {
        LibraryResolver::new(vec![
            LibraryEntry::new("alpha-dist", &["alpha"]),
            LibraryEntry::new("beta", &["beta"]),
        ])
    }

    fn call(module: &str, function: &str, arguments: &[&str]) -> CallSite {
        CallSite {
            function: function.to_string(),
            module: module.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
            location: SourceLocation {
                path: PathBuf::from("sample.py"),
                line: 1,
            },
        }
    }

    fn file(imports: &[&str], calls: Vec<CallSite>) -> FileUsage {
        FileUsage {
            path: PathBuf::from("sample.py"),
            call_sites: calls,
            imported_modules: imports.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn test_union_of_arguments_and_call_count() {
        let resolver = resolver();
        let mut aggregator = UsageAggregator::new(&resolver);
        aggregator.add_file(&file(
            &["alpha"],
            vec![
                call("alpha", "f", &["x"]),
                call("alpha.sub", "f", &["y", "x"]),
                call("alpha", "g", &[]),
            ],
        ));

        let aggregate = aggregator.finish();
        let functions = aggregate.functions("alpha-dist").unwrap();
        assert_eq!(functions["f"].calls, 2);
        assert_eq!(
            functions["f"].arguments.iter().cloned().collect::<Vec<_>>(),
            vec!["x".to_string(), "y".to_string()]
        );
        assert_eq!(functions["g"].calls, 1);
        assert!(functions["g"].arguments.is_empty());
    }

    #[test]
    fn test_unknown_modules_are_dropped() {
        let resolver = resolver();
        let mut aggregator = UsageAggregator::new(&resolver);
        aggregator.add_file(&file(
            &["os", "alphabeta"],
            vec![call("df", "head", &[]), call("alphabeta", "f", &["x"])],
        ));

        assert_eq!(aggregator.dropped_calls(), 2);
        assert!(aggregator.finish().is_empty());
    }

    #[test]
    fn test_pure_import_appears_with_empty_function_map() {
        let resolver = resolver();
        let mut aggregator = UsageAggregator::new(&resolver);
        aggregator.add_file(&file(&["beta.sub"], vec![]));

        let aggregate = aggregator.finish();
        assert!(aggregate.functions("beta").unwrap().is_empty());
    }

    #[test]
    fn test_order_independence() {
        let resolver = resolver();
        let files = vec![
            file(&["alpha"], vec![call("alpha", "f", &["x"])]),
            file(&["beta"], vec![call("beta", "g", &["z"]), call("alpha", "f", &["y"])]),
        ];

        let mut forward = UsageAggregator::new(&resolver);
        files.iter().for_each(|f| forward.add_file(f));
        let mut backward = UsageAggregator::new(&resolver);
        files.iter().rev().for_each(|f| backward.add_file(f));

        assert_eq!(forward.finish(), backward.finish());
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let mut left = UsageAggregate::new();
        left.record_call("alpha", "f", ["x"]);
        left.touch_library("beta");
        let mut right = UsageAggregate::new();
        right.record_call("alpha", "f", ["y"]);
        right.record_call("beta", "g", Vec::<String>::new());

        let mut single = UsageAggregate::new();
        single.record_call("alpha", "f", ["x"]);
        single.record_call("alpha", "f", ["y"]);
        single.record_call("beta", "g", Vec::<String>::new());

        left.merge(right);
        assert_eq!(left, single);
    }

    #[test]
    fn test_json_shape() {
        let mut aggregate = UsageAggregate::new();
        aggregate.record_call("mathlib", "add", ["axis"]);
        aggregate.touch_library("alpha");

        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "alpha": {},
                "mathlib": {"add": {"arguments": ["axis"], "calls": 1}}
            })
        );

        let parsed: UsageAggregate = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, aggregate);
    }
}
