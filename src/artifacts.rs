//! Artifact Store
//!
//! Per-run filesystem layout. Each run gets a flat directory named by a
//! human-sortable timestamp id with a `dsstar_` prefix; each iteration gets
//! an `iter_<N>` subdirectory holding only the files its phases produced.
//! JSON is pretty-printed. Writes are atomic (temp file + rename) and the
//! files of one iteration are written as a parallel fan-out. `final.html` is
//! written even for failed runs so every run stays inspectable.

use std::path::{Path, PathBuf};

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use dsstar_core::events::RunSummary;
use dsstar_core::plan::Plan;

use crate::error::{AppError, AppResult};

/// Factory for per-run directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

/// Handle to one run's directory.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    run_id: String,
    run_dir: PathBuf,
}

/// Files produced by one iteration. Absent phases write nothing.
#[derive(Debug, Clone, Default)]
pub struct IterationFiles {
    pub prompt: Option<String>,
    pub plan: Option<Value>,
    pub plan_critique: Option<Value>,
    pub html: Option<String>,
    pub code_critique: Option<Value>,
    pub smoke_test: Option<Value>,
    pub meta: Option<Value>,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create a fresh run directory and return its handle.
    pub async fn start_run(&self) -> AppResult<RunArtifacts> {
        tokio::fs::create_dir_all(&self.base_dir).await?;

        let run_id = format!(
            "dsstar_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let run_dir = self.base_dir.join(&run_id);
        tokio::fs::create_dir_all(&run_dir).await?;

        tracing::info!(run_id = %run_id, "run directory created");
        Ok(RunArtifacts { run_id, run_dir })
    }
}

impl RunArtifacts {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn final_html_path(&self) -> PathBuf {
        self.run_dir.join("final.html")
    }

    /// Write one iteration's files as a parallel fan-out.
    pub async fn write_iteration(&self, index: u32, files: IterationFiles) -> AppResult<()> {
        let iter_dir = self.run_dir.join(format!("iter_{index}"));
        tokio::fs::create_dir_all(&iter_dir).await?;

        let mut writes: Vec<(PathBuf, String)> = Vec::new();
        if let Some(prompt) = files.prompt {
            writes.push((iter_dir.join("prompt.txt"), prompt));
        }
        if let Some(html) = files.html {
            writes.push((iter_dir.join("html.html"), html));
        }
        for (name, value) in [
            ("plan.json", files.plan),
            ("plan_critique.json", files.plan_critique),
            ("code_critique.json", files.code_critique),
            ("smoke_test.json", files.smoke_test),
            ("meta.json", files.meta),
        ] {
            if let Some(value) = value {
                writes.push((iter_dir.join(name), pretty(&value)?));
            }
        }

        let results = join_all(
            writes
                .into_iter()
                .map(|(path, content)| write_atomic(path, content)),
        )
        .await;
        for result in results {
            result?;
        }
        Ok(())
    }

    pub async fn write_final_plan(&self, plan: &Plan) -> AppResult<()> {
        write_atomic(
            self.run_dir.join("final_plan.json"),
            serde_json::to_string_pretty(plan)?,
        )
        .await
    }

    pub async fn write_final_html(&self, html: &str) -> AppResult<()> {
        write_atomic(self.final_html_path(), html.to_string()).await
    }

    pub async fn write_summary(&self, summary: &RunSummary) -> AppResult<()> {
        write_atomic(
            self.run_dir.join("summary.json"),
            serde_json::to_string_pretty(summary)?,
        )
        .await
    }
}

fn pretty(value: &Value) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write through a temp file in the same directory, then rename into place.
async fn write_atomic(path: PathBuf, content: String) -> AppResult<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, content.as_bytes()).await?;
    tokio::fs::rename(&tmp, &path).await.map_err(|e| {
        AppError::fatal(format!("renaming {} into place failed: {e}", path.display()))
    })?;
    Ok(())
}
