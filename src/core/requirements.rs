// src/core/requirements.rs
use std::collections::BTreeMap;
use std::path::Path;
use chrono::{SecondsFormat, Utc};

use crate::error::Result;

/// Render `requirements.txt` content: a comment header, then one
/// `library==version` line per library in name order.
pub fn render_requirements(requirements: &BTreeMap<String, String>) -> String {
    let mut content = format!(
        "# Generated by reqsmith {} on {}\n",
        env!("CARGO_PKG_VERSION"),
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    for (library, constraint) in requirements {
        content.push_str(library);
        content.push_str(constraint);
        content.push('\n');
    }

    content
}

pub async fn write_requirements<P: AsRef<Path>>(path: P, requirements: &BTreeMap<String, String>) -> Result<()> {
    tokio::fs::write(path, render_requirements(requirements)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_requirements() {
        let mut requirements = BTreeMap::new();
        requirements.insert("requests".to_string(), "==2.31.0".to_string());
        requirements.insert("numpy".to_string(), "==1.26.4".to_string());

        let content = render_requirements(&requirements);
        let lines: Vec<&str> = content.lines().collect();

        assert!(lines[0].starts_with("# Generated by reqsmith"));
        assert_eq!(&lines[1..], &["numpy==1.26.4", "requests==2.31.0"]);
    }

    #[tokio::test]
    async fn test_write_requirements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        let mut requirements = BTreeMap::new();
        requirements.insert("flask".to_string(), "==3.0.0".to_string());

        write_requirements(&path, &requirements).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("flask==3.0.0\n"));
    }
}
