//! Report persistence.
//!
//! A report is the research output wrapped in a front-matter block and an
//! attribution footer, written to a file named after the topic.

use crate::config::ReportConfig;
use crate::errors::{CrewflowError, Result};
use chrono::{Local, NaiveDateTime};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Timestamp format of the `date` front-matter field.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix shared by every report file name.
pub const REPORT_SUFFIX: &str = "_research_report.md";

/// Derives the report file name for a topic.
///
/// The topic is lowercased, spaces and hyphens become underscores, and
/// `_research_report.md` is appended. Nothing else is changed.
#[must_use]
pub fn report_filename(topic: &str) -> String {
    format!("{}{REPORT_SUFFIX}", topic.to_lowercase().replace([' ', '-'], "_"))
}

/// Renders the report file contents.
#[must_use]
pub fn render_report(
    topic: &str,
    content: &str,
    generated_by: &str,
    backend: &str,
    attribution: &str,
    at: NaiveDateTime,
) -> String {
    let mut out = String::with_capacity(content.len() + 256);
    // Writing to a String cannot fail.
    let _ = write!(
        out,
        "---\ntitle: {topic} Research Report\ngenerated_by: {generated_by}\ndate: {}\nmodel: {backend}\n---\n\n{content}\n\n---\n*{attribution}*\n",
        at.format(DATE_FORMAT)
    );
    out
}

/// Writes reports into a directory.
#[derive(Debug, Clone)]
pub struct ReportPersister {
    output_dir: PathBuf,
    generated_by: String,
    attribution: String,
}

impl ReportPersister {
    /// Creates a persister writing into `output_dir`.
    #[must_use]
    pub fn new(
        output_dir: impl Into<PathBuf>,
        generated_by: impl Into<String>,
        attribution: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            generated_by: generated_by.into(),
            attribution: attribution.into(),
        }
    }

    /// Builds a persister from the report configuration.
    #[must_use]
    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(
            config.output_dir.clone(),
            config.generated_by.clone(),
            config.attribution.clone(),
        )
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Returns where the report for `topic` is written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the derived file name contains a path
    /// separator.
    pub fn report_path(&self, topic: &str) -> Result<PathBuf> {
        let filename = report_filename(topic);
        if filename.contains(['/', '\\']) || filename.contains(std::path::MAIN_SEPARATOR) {
            return Err(CrewflowError::InvalidInput(format!(
                "topic '{topic}' would produce a report name containing a path separator"
            )));
        }
        Ok(self.output_dir.join(filename))
    }

    /// Writes the report for `topic`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unsafe names and `PersistFailed` when the
    /// file cannot be written.
    pub async fn persist(&self, topic: &str, content: &str, backend_identity: &str) -> Result<PathBuf> {
        let path = self.report_path(topic)?;
        self.write_report(&path, topic, content, backend_identity).await?;
        Ok(path)
    }

    /// Writes the report for `topic` to `path`, a path previously returned
    /// by [`Self::report_path`].
    ///
    /// # Errors
    ///
    /// Returns `PersistFailed` when the file cannot be written.
    pub async fn write_report(
        &self,
        path: &Path,
        topic: &str,
        content: &str,
        backend_identity: &str,
    ) -> Result<()> {
        let body = render_report(
            topic,
            content,
            &self.generated_by,
            backend_identity,
            &self.attribution,
            Local::now().naive_local(),
        );

        let persist_failed = |source| CrewflowError::PersistFailed {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(persist_failed)?;
        tokio::fs::write(path, body).await.map_err(persist_failed)?;

        info!(path = %path.display(), bytes = content.len(), "Report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use regex::Regex;

    fn persister(dir: &Path) -> ReportPersister {
        ReportPersister::from_config(&ReportConfig {
            output_dir: dir.to_path_buf(),
            ..ReportConfig::default()
        })
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename("Space Exploration"),
            "space_exploration_research_report.md"
        );
        assert_eq!(
            report_filename("Self-Driving Cars"),
            "self_driving_cars_research_report.md"
        );
        assert_eq!(report_filename("AI"), "ai_research_report.md");
        // Other punctuation is kept as written.
        assert_eq!(report_filename("C++ & Rust"), "c++_&_rust_research_report.md");
    }

    #[test]
    fn test_render_report_layout() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();

        let rendered = render_report(
            "Blockchain Technology",
            "# Blockchain Technology Research Report\n\n## 1. Overview",
            "Research Specialist",
            "Ollama + Mistral (Free Local AI)",
            "This report was generated using free local AI (Ollama + Mistral)",
            at,
        );

        assert_eq!(
            rendered,
            "---\n\
             title: Blockchain Technology Research Report\n\
             generated_by: Research Specialist\n\
             date: 2024-03-09 14:05:07\n\
             model: Ollama + Mistral (Free Local AI)\n\
             ---\n\
             \n\
             # Blockchain Technology Research Report\n\
             \n\
             ## 1. Overview\n\
             \n\
             ---\n\
             *This report was generated using free local AI (Ollama + Mistral)*\n"
        );
    }

    #[tokio::test]
    async fn test_persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = persister(dir.path())
            .persist("Space Exploration", "Rockets.", "Ollama + Mistral (Free Local AI)")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("space_exploration_research_report.md"));

        let text = std::fs::read_to_string(&path).unwrap();
        let date = Regex::new(r"(?m)^date: \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
        assert!(date.is_match(&text));
        assert!(text.starts_with("---\ntitle: Space Exploration Research Report\n"));

        let body = text.find("Rockets.").unwrap();
        let footer = text.find("*This report was generated using").unwrap();
        assert!(body < footer);
    }

    #[tokio::test]
    async fn test_persist_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let persister = persister(dir.path());

        persister.persist("Cybersecurity", "first version", "m").await.unwrap();
        let path = persister.persist("Cybersecurity", "second", "m").await.unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("second"));
        assert!(!text.contains("first version"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_persist_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("2024");

        let path = persister(&nested).persist("Biotechnology", "cells", "m").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_persist_rejects_path_separator() {
        let dir = tempfile::tempdir().unwrap();
        let err = persister(dir.path())
            .persist("../etc/passwd", "x", "m")
            .await
            .unwrap_err();

        assert!(matches!(err, CrewflowError::InvalidInput(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = persister(&blocker).persist("Quantum Computing", "x", "m").await.unwrap_err();
        assert!(matches!(err, CrewflowError::PersistFailed { .. }));
    }
}
