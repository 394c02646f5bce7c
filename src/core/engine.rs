// src/core/engine.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use super::{
    write_requirements, AnalysisOutcome, LibraryResolver, MatchReport, Resolution,
    SignatureCatalog, SourceAnalyzer, UsageAggregate, VersionMatcher,
};

/// Code path that means "read the source from stdin"
pub const STDIN_PATH: &str = "-";

/// Main orchestration engine for reqsmith
pub struct Engine {
    config: Config,
    analyzer: Arc<SourceAnalyzer>,
}

impl Engine {
    /// Create a new engine instance from a configuration file (or defaults)
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let resolver = LibraryResolver::new(config.libraries.clone());
        let analyzer = SourceAnalyzer::new(&config.parsing, &config.project, resolver)?;
        debug!("Resolver knows {} libraries", analyzer.resolver().entries().len());

        Ok(Self {
            config,
            analyzer: Arc::new(analyzer),
        })
    }

    /// Analyze a codebase, match it against the catalog and write requirements.txt
    pub async fn analyze(
        &self,
        code_path: PathBuf,
        output: Option<PathBuf>,
        catalog_path: Option<PathBuf>,
        dry_run: bool,
    ) -> Result<MatchReport> {
        info!("📁 Analyzing codebase at: {}", code_path.display());
        let outcome = self.collect_usage(code_path).await?;
        log_usage(&outcome.aggregate);

        if outcome.aggregate.is_empty() {
            warn!("❌ No library usage found in codebase");
            return Ok(MatchReport::default());
        }

        let catalog = self.load_catalog(catalog_path).await?;
        let report = self.match_usage(outcome.aggregate, catalog).await?;
        print_report(&report);

        if report.requirements.is_empty() {
            warn!("❌ No compatible versions found for any libraries");
        } else if dry_run {
            info!("Dry run: not writing requirements file");
        } else {
            let output = output.unwrap_or_else(|| self.config.project.output.clone());
            write_requirements(&output, &report.requirements)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("📄 Generated requirements.txt at {}", output.display());
        }

        Ok(report)
    }

    /// Analyze a codebase and emit its usage aggregate as JSON
    pub async fn usage(&self, code_path: PathBuf, output: Option<PathBuf>) -> Result<UsageAggregate> {
        let outcome = self.collect_usage(code_path).await?;
        log_usage(&outcome.aggregate);

        let json = serde_json::to_string_pretty(&outcome.aggregate)?;
        match output {
            Some(path) => {
                tokio::fs::write(&path, json)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("💾 Saved usage to {}", path.display());
            }
            None => println!("{}", json),
        }

        Ok(outcome.aggregate)
    }

    /// Match a previously saved usage aggregate against the catalog
    pub async fn resolve(
        &self,
        usage_path: PathBuf,
        catalog_path: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Result<MatchReport> {
        let content = tokio::fs::read_to_string(&usage_path)
            .await
            .with_context(|| format!("Failed to read {}", usage_path.display()))?;
        let aggregate: UsageAggregate = serde_json::from_str(&content)
            .with_context(|| format!("Invalid usage document {}", usage_path.display()))?;

        let catalog = self.load_catalog(catalog_path).await?;
        let report = self.match_usage(aggregate, catalog).await?;
        print_report(&report);

        if let Some(output) = output {
            write_requirements(&output, &report.requirements).await?;
            info!("📄 Generated requirements.txt at {}", output.display());
        }

        Ok(report)
    }

    /// List libraries present in the catalog
    pub async fn list(&self, catalog_path: Option<PathBuf>) -> Result<Vec<String>> {
        let catalog = self.load_catalog(catalog_path).await?;
        let libraries: Vec<String> = catalog.libraries().map(str::to_string).collect();

        if libraries.is_empty() {
            println!("📚 No libraries in catalog");
        } else {
            println!("📚 Catalogued libraries:");
            for library in &libraries {
                println!("  📦 {}", library);
            }
        }

        Ok(libraries)
    }

    /// Print catalog statistics
    pub async fn stats(&self, catalog_path: Option<PathBuf>) -> Result<()> {
        let stats = self.load_catalog(catalog_path).await?.stats();

        println!("📊 Catalog Statistics:");
        println!("  📚 Total libraries: {}", stats.total_libraries);
        println!("  🔢 Total versions: {}", stats.total_versions);
        println!("  ⚙️  Total functions: {}", stats.total_functions);
        if !stats.libraries.is_empty() {
            println!("\n📦 Libraries: {}", stats.libraries.join(", "));
        }

        Ok(())
    }

    /// Match a usage aggregate against a loaded catalog, off the async runtime
    pub async fn match_usage(&self, aggregate: UsageAggregate, catalog: SignatureCatalog) -> Result<MatchReport> {
        let kwargs_markers = self.config.matching.kwargs_markers.clone();
        let report = tokio::task::spawn_blocking(move || {
            VersionMatcher::new(&catalog, kwargs_markers).match_usage(&aggregate)
        })
        .await
        .context("Version matching task failed")?;

        Ok(report)
    }

    /// Write the effective configuration to a file so it can be edited
    pub async fn init(&self, path: PathBuf, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        self.config
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("📝 Wrote configuration to {}", path.display());
        Ok(())
    }

    /// Run source analysis off the async runtime. `-` reads one file from stdin.
    pub async fn collect_usage(&self, code_path: PathBuf) -> Result<AnalysisOutcome> {
        let outcome = if code_path.as_os_str() == STDIN_PATH {
            self.collect_usage_from(tokio::io::stdin()).await?
        } else {
            let analyzer = Arc::clone(&self.analyzer);
            tokio::task::spawn_blocking(move || analyzer.analyze_path(&code_path))
                .await
                .context("Source analysis task failed")??
        };

        info!(
            "📊 Analyzed {} files ({} skipped, {} calls to unknown modules)",
            outcome.files_analyzed,
            outcome.failures.len(),
            outcome.calls_dropped
        );
        Ok(outcome)
    }

    /// Analyze one source unit read from `reader`
    async fn collect_usage_from<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<AnalysisOutcome> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .await
            .context("Failed to read source from stdin")?;

        let analyzer = Arc::clone(&self.analyzer);
        let outcome = tokio::task::spawn_blocking(move || analyzer.analyze_source("<stdin>", &source))
            .await
            .context("Source analysis task failed")??;
        Ok(outcome)
    }

    async fn load_catalog(&self, catalog_path: Option<PathBuf>) -> Result<SignatureCatalog> {
        let path = catalog_path.unwrap_or_else(|| self.config.catalog.path.clone());
        debug!("Loading signature catalog from {}", path.display());

        let display = path.display().to_string();
        let catalog = tokio::task::spawn_blocking(move || SignatureCatalog::load(&path))
            .await
            .context("Catalog loading task failed")?
            .with_context(|| format!("Failed to load signature catalog from {}", display))?;

        Ok(catalog)
    }
}

fn log_usage(aggregate: &UsageAggregate) {
    info!("📊 Found usage of {} libraries:", aggregate.len());
    for (library, functions) in aggregate.libraries() {
        info!("  📦 {}: {} functions", library, functions.len());
    }
}

fn print_report(report: &MatchReport) {
    if !report.requirements.is_empty() {
        println!("📋 Generated requirements:");
        for (library, constraint) in &report.requirements {
            println!("  {}{}", library, constraint);
        }
    }

    for library in report.unresolved() {
        match &report.resolutions[library] {
            Resolution::NotInCatalog => println!("  ⚠️  {}: not in signature catalog", library),
            Resolution::NoCompatibleVersion { versions_checked } => println!(
                "  ❌ {}: none of {} catalogued versions fit the observed calls",
                library, versions_checked
            ),
            Resolution::Resolved { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LibraryEntry;

    const CATALOG: &str = r#"{
        "mathlib": {
            "1.0": {"add": {"parameter_names": ["a", "b"]}},
            "2.0": {"add": {"parameter_names": ["a", "b", "axis"]}},
            "2.1rc1": {"add": {"parameter_names": ["a", "b", "axis"]}}
        },
        "alpha": {
            "0.1": {"f": {"parameter_names": ["x"]}},
            "0.2": {"f": {"parameter_names": ["x"]}}
        }
    }"#;

    fn engine(dir: &Path) -> Engine {
        let catalog_path = dir.join("catalog.json");
        std::fs::write(&catalog_path, CATALOG).unwrap();

        let mut config = Config::default();
        config.libraries = vec![
            LibraryEntry::new("mathlib", &["mathlib", "ml"]),
            LibraryEntry::new("alpha", &["alpha"]),
            LibraryEntry::new("gamma", &["gamma"]),
        ];
        config.catalog.path = catalog_path;
        config.project.output = dir.join("requirements.txt");
        Engine::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("calc.py"),
            "import mathlib as ml\nml.add(1, 2, axis=0)\nml.add(3, 4)\n",
        )
        .unwrap();
        std::fs::write(src.join("other.py"), "import alpha\nimport gamma\n").unwrap();

        let engine = engine(dir.path());
        let report = engine.analyze(src, None, None, false).await.unwrap();

        assert_eq!(report.requirements["mathlib"], "==2.1rc1");
        assert_eq!(report.requirements["alpha"], "==0.2");
        assert_eq!(report.resolutions["gamma"], Resolution::NotInCatalog);

        let written = std::fs::read_to_string(dir.path().join("requirements.txt")).unwrap();
        assert!(written.contains("alpha==0.2\n"));
        assert!(written.contains("mathlib==2.1rc1\n"));
        assert!(!written.contains("gamma"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("code.py");
        std::fs::write(&code, "import alpha\nalpha.f(x=1)\n").unwrap();

        let engine = engine(dir.path());
        let report = engine.analyze(code, None, None, true).await.unwrap();

        assert_eq!(report.requirements["alpha"], "==0.2");
        assert!(!dir.path().join("requirements.txt").exists());
    }

    #[tokio::test]
    async fn test_usage_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("code.py");
        std::fs::write(&code, "from mathlib import add\nadd(a=1, b=2)\n").unwrap();
        let usage_path = dir.path().join("usage.json");

        let engine = engine(dir.path());
        let aggregate = engine.usage(code, Some(usage_path.clone())).await.unwrap();
        assert_eq!(aggregate.functions("mathlib").unwrap()["add"].calls, 1);

        let output = dir.path().join("pinned.txt");
        let report = engine
            .resolve(usage_path, None, Some(output.clone()))
            .await
            .unwrap();
        assert_eq!(report.requirements["mathlib"], "==2.1rc1");
        assert!(std::fs::read_to_string(output).unwrap().contains("mathlib==2.1rc1"));
    }

    #[tokio::test]
    async fn test_source_from_reader() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let source: &[u8] = b"import mathlib as ml\nml.add(1, 2, axis=0)\nprint(ml)\n";
        let outcome = engine.collect_usage_from(source).await.unwrap();

        assert_eq!(outcome.files_analyzed, 1);
        assert_eq!(outcome.aggregate.functions("mathlib").unwrap()["add"].calls, 1);

        let outcome = engine.collect_usage_from(&b"def broken(:\n"[..]).await.unwrap();
        assert_eq!(outcome.files_analyzed, 0);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_match_usage_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let catalog = SignatureCatalog::from_json_str(CATALOG).unwrap();

        let mut aggregate = UsageAggregate::new();
        aggregate.record_call("mathlib", "add", ["axis"]);
        aggregate.record_call("alpha", "f", ["nope"]);

        let report = engine.match_usage(aggregate, catalog).await.unwrap();
        assert_eq!(report.requirements["mathlib"], "==2.1rc1");
        assert_eq!(
            report.resolutions["alpha"],
            Resolution::NoCompatibleVersion { versions_checked: 2 }
        );
    }

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let path = dir.path().join("Reqsmith.toml");

        engine.init(path.clone(), false).await.unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.libraries.len(), 3);
        assert_eq!(loaded.libraries[0].name, "mathlib");

        assert!(engine.init(path.clone(), false).await.is_err());
        engine.init(path, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let result = engine.list(Some(dir.path().join("nowhere"))).await;
        assert!(result.is_err());

        let libraries = engine.list(None).await.unwrap();
        assert_eq!(libraries, vec!["alpha", "mathlib"]);
    }
}
