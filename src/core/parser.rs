use std::path::{Path, PathBuf};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ParsingConfig, ProjectConfig};
use crate::error::{ReqsmithError, Result};
use super::languages::{LanguageAnalyzer, PythonAnalyzer};
use super::{CallSite, LibraryResolver, UsageAggregate, UsageAggregator};

/// Imports and resolved call sites of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUsage {
    /// File path as discovered
    pub path: PathBuf,

    /// Calls whose callee resolved to some module
    pub call_sites: Vec<CallSite>,

    /// Every module path named by an import statement
    pub imported_modules: Vec<String>,
}

/// A source unit that was excluded from the analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of analyzing a file or directory tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisOutcome {
    pub aggregate: UsageAggregate,
    pub files_analyzed: usize,
    pub calls_dropped: usize,
    pub failures: Vec<AnalysisFailure>,
}

impl AnalysisOutcome {
    /// Combine the outcomes of two disjoint sets of files
    pub fn merge(mut self, other: AnalysisOutcome) -> Self {
        self.aggregate.merge(other.aggregate);
        self.files_analyzed += other.files_analyzed;
        self.calls_dropped += other.calls_dropped;
        self.failures.extend(other.failures);
        self
    }
}

/// Folds per-file results into a partial outcome; one per rayon worker split
struct OutcomeBuilder<'r> {
    aggregator: UsageAggregator<'r>,
    files_analyzed: usize,
    failures: Vec<AnalysisFailure>,
}

impl<'r> OutcomeBuilder<'r> {
    fn new(resolver: &'r LibraryResolver) -> Self {
        Self {
            aggregator: UsageAggregator::new(resolver),
            files_analyzed: 0,
            failures: Vec::new(),
        }
    }

    fn add(&mut self, path: PathBuf, result: Result<FileUsage>) {
        match result {
            Ok(usage) => {
                debug!("{}: {} call sites", path.display(), usage.call_sites.len());
                self.aggregator.add_file(&usage);
                self.files_analyzed += 1;
            }
            Err(e) => {
                warn!("⚠️ Error analyzing {}: {}", path.display(), e);
                self.failures.push(AnalysisFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn finish(self) -> AnalysisOutcome {
        AnalysisOutcome {
            calls_dropped: self.aggregator.dropped_calls(),
            aggregate: self.aggregator.finish(),
            files_analyzed: self.files_analyzed,
            failures: self.failures,
        }
    }
}

/// Finds source files and turns them into a usage aggregate
pub struct SourceAnalyzer {
    parsing: ParsingConfig,
    ignore_dirs: Vec<String>,
    extensions: Vec<String>,
    resolver: LibraryResolver,
}

impl SourceAnalyzer {
    pub fn new(parsing: &ParsingConfig, project: &ProjectConfig, resolver: LibraryResolver) -> Result<Self> {
        // Fail early if the grammar cannot be loaded
        let analyzer = PythonAnalyzer::new()?;

        let extensions: Vec<String> = parsing
            .file_extensions
            .iter()
            .filter(|ext| analyzer.file_extensions().contains(&ext.as_str()))
            .cloned()
            .collect();
        if extensions.is_empty() {
            return Err(ReqsmithError::Config(format!(
                "none of the configured extensions {:?} are handled by the {} analyzer",
                parsing.file_extensions,
                analyzer.language_name()
            )));
        }

        Ok(Self {
            parsing: parsing.clone(),
            ignore_dirs: project.ignore_dirs.clone(),
            extensions,
            resolver,
        })
    }

    pub fn resolver(&self) -> &LibraryResolver {
        &self.resolver
    }

    /// Analyze a single file or every matching file below a directory
    pub fn analyze_path<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisOutcome> {
        let files = self.collect_files(path.as_ref())?;
        info!("Found {} source files", files.len());

        // Each worker owns a parser and a partial aggregate; partials are merged pairwise
        let outcome = files
            .into_par_iter()
            .fold(
                || (PythonAnalyzer::new(), OutcomeBuilder::new(&self.resolver)),
                |(mut analyzer, mut builder), path| {
                    let result = match &mut analyzer {
                        Ok(analyzer) => self.analyze_file(analyzer, &path),
                        Err(e) => Err(ReqsmithError::Parser(e.to_string())),
                    };
                    builder.add(path, result);
                    (analyzer, builder)
                },
            )
            .map(|(_, builder)| builder.finish())
            .reduce(AnalysisOutcome::default, AnalysisOutcome::merge);

        Ok(outcome)
    }

    /// Analyze an in-memory code string
    pub fn analyze_source(&self, name: &str, source: &str) -> Result<AnalysisOutcome> {
        let mut analyzer = PythonAnalyzer::new()?;
        let mut builder = OutcomeBuilder::new(&self.resolver);
        builder.add(PathBuf::from(name), analyzer.analyze(source, Path::new(name)));
        Ok(builder.finish())
    }

    fn analyze_file(&self, analyzer: &mut PythonAnalyzer, path: &Path) -> Result<FileUsage> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() as usize > self.parsing.max_file_size {
            return Err(ReqsmithError::Parser(format!(
                "File {} exceeds maximum size limit",
                path.display()
            )));
        }

        let source = std::fs::read_to_string(path)?;
        analyzer.analyze(&source, path)
    }

    fn collect_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(if self.should_parse_file(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }
        if !path.is_dir() {
            return Err(ReqsmithError::FileSystem(format!(
                "Code path does not exist: {}",
                path.display()
            )));
        }

        let ignore_dirs = self.ignore_dirs.clone();
        let walker = WalkBuilder::new(path)
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0
                    && ignore_dirs.iter().any(|d| entry.file_name() == d.as_str()))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| ReqsmithError::FileSystem(e.to_string()))?;
            let path = entry.path();

            if path.is_file() && self.should_parse_file(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    fn should_parse_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}
