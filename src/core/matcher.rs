// src/core/matcher.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{FunctionSignature, SignatureCatalog, VersionSignatures};
use super::version;
use super::{FunctionUsage, UsageAggregate};

/// An exact pin on one library version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionConstraint {
    pub library: String,
    pub version: String,
}

impl VersionConstraint {
    /// `==<version>`
    pub fn constraint_string(&self) -> String {
        format!("=={}", self.version)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.library, self.version)
    }
}

/// What matching concluded for one library that appears in the usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        constraint: String,
        compatible_versions: Vec<String>,
    },
    /// Catalogued, but every version contradicts some observed call
    NoCompatibleVersion { versions_checked: usize },
    /// No signature data for this library
    NotInCatalog,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    /// library -> `==<version>`, only for resolved libraries
    pub requirements: BTreeMap<String, String>,
    /// Outcome for every library present in the usage
    pub resolutions: BTreeMap<String, Resolution>,
}

impl MatchReport {
    /// Libraries that were used but could not be pinned
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.resolutions
            .iter()
            .filter(|(_, resolution)| !matches!(resolution, Resolution::Resolved { .. }))
            .map(|(library, _)| library.as_str())
    }
}

/// Matches observed usage against an immutable signature catalog.
///
/// Holds no state of its own beyond configuration; every call is idempotent.
pub struct VersionMatcher<'c> {
    catalog: &'c SignatureCatalog,
    kwargs_markers: Vec<String>,
}

impl<'c> VersionMatcher<'c> {
    pub fn new(catalog: &'c SignatureCatalog, kwargs_markers: Vec<String>) -> Self {
        Self {
            catalog,
            kwargs_markers,
        }
    }

    /// Every catalogued version of `library` consistent with all observed calls
    pub fn find_compatible_versions(
        &self,
        library: &str,
        usage: &BTreeMap<String, FunctionUsage>,
    ) -> BTreeSet<String> {
        let Some(catalog) = self.catalog.library(library) else {
            warn!("⚠️ No signature data found for {}", library);
            return BTreeSet::new();
        };

        catalog
            .versions
            .iter()
            .filter(|(version, signatures)| {
                let compatible = self.version_supports(signatures, usage);
                if !compatible {
                    debug!("{} {} rejected", library, version);
                }
                compatible
            })
            .map(|(version, _)| version.clone())
            .collect()
    }

    /// Pin the greatest compatible version; `None` if there is none
    pub fn resolve_constraint(
        library: &str,
        compatible_versions: &BTreeSet<String>,
    ) -> Option<VersionConstraint> {
        version::latest(compatible_versions.iter().map(String::as_str)).map(|latest| {
            VersionConstraint {
                library: library.to_string(),
                version: latest.to_string(),
            }
        })
    }

    /// Resolve every library in the aggregate independently
    pub fn match_usage(&self, aggregate: &UsageAggregate) -> MatchReport {
        let libraries: Vec<(&str, &BTreeMap<String, FunctionUsage>)> = aggregate.libraries().collect();

        let resolutions: BTreeMap<String, Resolution> = libraries
            .par_iter()
            .map(|(library, usage)| (library.to_string(), self.resolve_library(library, usage)))
            .collect();

        let requirements = resolutions
            .iter()
            .filter_map(|(library, resolution)| match resolution {
                Resolution::Resolved { constraint, .. } => Some((library.clone(), constraint.clone())),
                _ => None,
            })
            .collect();

        MatchReport {
            requirements,
            resolutions,
        }
    }

    fn resolve_library(&self, library: &str, usage: &BTreeMap<String, FunctionUsage>) -> Resolution {
        let Some(catalog) = self.catalog.library(library) else {
            warn!("⚠️ No signature data found for {}", library);
            return Resolution::NotInCatalog;
        };

        let compatible = self.find_compatible_versions(library, usage);
        match Self::resolve_constraint(library, &compatible) {
            Some(constraint) => {
                info!(
                    "✅ {}: {} (from {} compatible versions)",
                    library,
                    constraint.constraint_string(),
                    compatible.len()
                );
                let mut compatible_versions: Vec<String> = compatible.into_iter().collect();
                version::sort_versions(&mut compatible_versions);
                Resolution::Resolved {
                    constraint: constraint.constraint_string(),
                    compatible_versions,
                }
            }
            None => {
                warn!("❌ {}: No compatible versions found", library);
                Resolution::NoCompatibleVersion {
                    versions_checked: catalog.versions.len(),
                }
            }
        }
    }

    fn version_supports(&self, signatures: &VersionSignatures, usage: &BTreeMap<String, FunctionUsage>) -> bool {
        usage.iter().all(|(function, observed)| {
            signatures
                .get(function)
                .is_some_and(|signature| self.function_supports(signature, observed))
        })
    }

    fn function_supports(&self, signature: &FunctionSignature, observed: &FunctionUsage) -> bool {
        let accepts_any_keyword = self
            .kwargs_markers
            .iter()
            .any(|marker| signature.accepts(marker));

        accepts_any_keyword
            || observed
                .arguments
                .iter()
                .all(|argument| signature.accepts(argument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(json: &str) -> SignatureCatalog {
        SignatureCatalog::from_json_str(json).unwrap()
    }

    fn usage(json: serde_json::Value) -> UsageAggregate {
        serde_json::from_value(json).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    fn kwargs() -> Vec<String> {
        vec!["kwargs".to_string()]
    }

    const MATHLIB: &str = r#"{"mathlib": {
        "1.0": {"add": {"parameter_names": ["a", "b"]}},
        "2.0": {"add": {"parameter_names": ["a", "b", "axis"]}}
    }}"#;

    #[test]
    fn test_mathlib_scenario() {
        let catalog = catalog(MATHLIB);
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({
            "mathlib": {"add": {"arguments": ["axis"], "calls": 3}}
        }));

        let compatible = matcher.find_compatible_versions("mathlib", aggregate.functions("mathlib").unwrap());
        assert_eq!(compatible, set(&["2.0"]));

        let constraint = VersionMatcher::resolve_constraint("mathlib", &compatible).unwrap();
        assert_eq!(constraint.constraint_string(), "==2.0");
        assert_eq!(constraint.to_string(), "mathlib==2.0");

        let report = matcher.match_usage(&aggregate);
        assert_eq!(report.requirements["mathlib"], "==2.0");
    }

    #[test]
    fn test_no_arguments_selects_greatest() {
        let catalog = catalog(
            r#"{"alpha": {
                "0.9": {"f": {"parameter_names": ["x"]}},
                "0.10": {"f": {"parameter_names": []}},
                "0.10rc1": {"f": {"parameter_names": []}}
            }}"#,
        );
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({"alpha": {"f": {"arguments": [], "calls": 1}}}));

        let compatible = matcher.find_compatible_versions("alpha", aggregate.functions("alpha").unwrap());
        assert_eq!(compatible, set(&["0.9", "0.10", "0.10rc1"]));
        assert_eq!(
            VersionMatcher::resolve_constraint("alpha", &compatible).unwrap().version,
            "0.10"
        );
    }

    #[test]
    fn test_missing_function_excludes_version() {
        let catalog = catalog(
            r#"{"alpha": {
                "1.0": {"f": {"parameter_names": ["x"]}},
                "2.0": {"f": {"parameter_names": ["x"]}, "g": {"parameter_names": []}}
            }}"#,
        );
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({"alpha": {
            "f": {"arguments": ["x"], "calls": 1},
            "g": {"arguments": [], "calls": 1}
        }}));

        let compatible = matcher.find_compatible_versions("alpha", aggregate.functions("alpha").unwrap());
        assert_eq!(compatible, set(&["2.0"]));
    }

    #[test]
    fn test_kwargs_marker_accepts_any_keyword() {
        let catalog = catalog(
            r#"{"alpha": {
                "1.0": {"f": {"parameter_names": ["x"]}},
                "1.1": {"f": {"parameter_names": ["x", "kwargs"]}}
            }}"#,
        );
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({"alpha": {"f": {"arguments": ["anything", "else"], "calls": 2}}}));

        let compatible = matcher.find_compatible_versions("alpha", aggregate.functions("alpha").unwrap());
        assert_eq!(compatible, set(&["1.1"]));

        let strict = VersionMatcher::new(&catalog, Vec::new());
        assert!(strict
            .find_compatible_versions("alpha", aggregate.functions("alpha").unwrap())
            .is_empty());
    }

    #[test]
    fn test_more_arguments_never_grow_compatible_set() {
        let catalog = catalog(
            r#"{"alpha": {
                "1.0": {"f": {"parameter_names": ["x"]}},
                "2.0": {"f": {"parameter_names": ["x", "y"]}},
                "3.0": {"f": {"parameter_names": ["x", "y", "z"]}}
            }}"#,
        );
        let matcher = VersionMatcher::new(&catalog, kwargs());

        let mut aggregate = UsageAggregate::new();
        let mut previous: Option<BTreeSet<String>> = None;
        for arguments in [vec![], vec!["x"], vec!["y"], vec!["z"], vec!["w"]] {
            aggregate.record_call("alpha", "f", arguments);
            let compatible = matcher.find_compatible_versions("alpha", aggregate.functions("alpha").unwrap());
            if let Some(previous) = &previous {
                assert!(compatible.is_subset(previous));
            }
            previous = Some(compatible);
        }
        assert!(previous.unwrap().is_empty());
    }

    #[test]
    fn test_pure_import_matches_every_version() {
        let catalog = catalog(MATHLIB);
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let mut aggregate = UsageAggregate::new();
        aggregate.touch_library("mathlib");

        let compatible = matcher.find_compatible_versions("mathlib", aggregate.functions("mathlib").unwrap());
        assert_eq!(compatible, set(&["1.0", "2.0"]));
        assert_eq!(matcher.match_usage(&aggregate).requirements["mathlib"], "==2.0");
    }

    #[test]
    fn test_report_distinguishes_unresolved_outcomes() {
        let catalog = catalog(MATHLIB);
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({
            "mathlib": {"subtract": {"arguments": [], "calls": 1}},
            "unknownlib": {"f": {"arguments": [], "calls": 1}}
        }));

        let report = matcher.match_usage(&aggregate);
        assert!(report.requirements.is_empty());
        assert_eq!(
            report.resolutions["mathlib"],
            Resolution::NoCompatibleVersion { versions_checked: 2 }
        );
        assert_eq!(report.resolutions["unknownlib"], Resolution::NotInCatalog);
        assert_eq!(report.unresolved().collect::<Vec<_>>(), vec!["mathlib", "unknownlib"]);
        assert!(!report.resolutions.contains_key("unusedlib"));
    }

    #[test]
    fn test_matching_is_idempotent() {
        let catalog = catalog(MATHLIB);
        let matcher = VersionMatcher::new(&catalog, kwargs());
        let aggregate = usage(serde_json::json!({"mathlib": {"add": {"arguments": ["a"], "calls": 1}}}));

        assert_eq!(matcher.match_usage(&aggregate), matcher.match_usage(&aggregate));
    }

    #[test]
    fn test_empty_compatible_set_has_no_constraint() {
        assert!(VersionMatcher::resolve_constraint("alpha", &BTreeSet::new()).is_none());
    }
}
