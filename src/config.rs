use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReqsmithError, Result};

/// Known distributions and the import roots they provide, in declaration order.
/// When two entries claim the same root the first one wins.
const DEFAULT_LIBRARIES: &[(&str, &[&str])] = &[
    ("pandas", &["pandas", "pd"]),
    ("numpy", &["numpy", "np"]),
    ("matplotlib", &["matplotlib", "plt", "mpl"]),
    ("seaborn", &["seaborn", "sns"]),
    ("scikit-learn", &["sklearn"]),
    ("requests", &["requests"]),
    ("flask", &["flask"]),
    ("django", &["django"]),
    ("fastapi", &["fastapi"]),
    ("aiohttp", &["aiohttp"]),
    ("beautifulsoup4", &["bs4", "beautifulsoup"]),
    ("selenium", &["selenium"]),
    ("sqlalchemy", &["sqlalchemy"]),
    ("psycopg2", &["psycopg2"]),
    ("pymongo", &["pymongo"]),
    ("redis", &["redis"]),
    ("click", &["click"]),
    ("argparse", &["argparse"]),
    ("tqdm", &["tqdm"]),
    ("python-dotenv", &["dotenv"]),
    ("pyyaml", &["yaml"]),
    ("jinja2", &["jinja2"]),
    ("markdown", &["markdown"]),
    ("lxml", &["lxml"]),
    ("python-dateutil", &["dateutil"]),
    ("pytz", &["pytz"]),
    ("watchdog", &["watchdog"]),
    ("pathlib", &["pathlib"]),
    ("pillow", &["PIL"]),
    ("opencv-python", &["cv2"]),
    ("plotly", &["plotly"]),
    ("bokeh", &["bokeh"]),
    ("statsmodels", &["statsmodels"]),
    ("sympy", &["sympy"]),
    ("networkx", &["networkx"]),
    ("scipy", &["scipy"]),
    ("jupyter", &["jupyter"]),
    ("ipython", &["IPython"]),
    ("tensorflow", &["tensorflow", "tf"]),
    ("torch", &["torch"]),
    ("transformers", &["transformers"]),
    ("openai", &["openai"]),
    ("langchain", &["langchain"]),
    ("pandas-profiling", &["pandas_profiling"]),
    ("h5py", &["h5py"]),
    ("pyarrow", &["pyarrow"]),
    ("urllib3", &["urllib3"]),
    ("httpx", &["httpx"]),
    ("websockets", &["websockets"]),
    ("sqlite3", &["sqlite3"]),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Source code parsing configuration
    pub parsing: ParsingConfig,

    /// Signature catalog location
    pub catalog: CatalogConfig,

    /// Version matching rules
    pub matching: MatchingConfig,

    /// Library name resolver table
    pub libraries: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory names never descended into
    pub ignore_dirs: Vec<String>,

    /// Where `analyze` writes the requirements file
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// File extensions to analyze
    pub file_extensions: Vec<String>,

    /// Maximum file size to parse (in bytes)
    pub max_file_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog JSON document or directory of `<library>_signatures.json` files
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Parameter names that mean "accepts any keyword argument"
    pub kwargs_markers: Vec<String>,
}

/// One distributed library and the import roots it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    pub roots: Vec<String>,
}

impl LibraryEntry {
    pub fn new(name: impl Into<String>, roots: &[&str]) -> Self {
        Self {
            name: name.into(),
            roots: roots.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: vec![
                ".git".to_string(),
                "__pycache__".to_string(),
                "venv".to_string(),
                "env".to_string(),
                ".venv".to_string(),
                "node_modules".to_string(),
            ],
            output: PathBuf::from("requirements.txt"),
        }
    }
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            file_extensions: vec!["py".to_string()],
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("signature_database"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            kwargs_markers: vec!["kwargs".to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            parsing: ParsingConfig::default(),
            catalog: CatalogConfig::default(),
            matching: MatchingConfig::default(),
            libraries: default_libraries(),
        }
    }
}

/// The built-in resolver table
pub fn default_libraries() -> Vec<LibraryEntry> {
    DEFAULT_LIBRARIES
        .iter()
        .map(|(name, roots)| LibraryEntry::new(*name, roots))
        .collect()
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ReqsmithError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReqsmithError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Reqsmith.toml",
                    "reqsmith.toml",
                    ".reqsmith.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for entry in &self.libraries {
            if entry.name.trim().is_empty() {
                return Err(ReqsmithError::Config(
                    "library entry with an empty name".to_string(),
                ));
            }
            if entry.roots.iter().any(|root| root.trim().is_empty()) {
                return Err(ReqsmithError::Config(format!(
                    "library '{}' declares an empty import root",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}
