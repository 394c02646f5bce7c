// src/core/mod.rs
mod engine;
mod parser;
mod symbols;
mod call_site;
mod aggregator;
mod resolver;
mod version;
mod catalog;
mod matcher;
mod requirements;

// Language-specific analyzers
mod languages;

pub use parser::{SourceAnalyzer, FileUsage, AnalysisOutcome};
pub use symbols::SymbolTable;
pub use call_site::{CallSite, Callee, SourceLocation, resolve_callee};
pub use aggregator::{UsageAggregate, UsageAggregator, FunctionUsage};
pub use resolver::LibraryResolver;
pub use catalog::SignatureCatalog;
pub use matcher::{VersionMatcher, MatchReport, Resolution};
pub use requirements::write_requirements;

// Export the main engine
pub use engine::{Engine, STDIN_PATH};
