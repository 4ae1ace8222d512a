use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ProcessConfig;
use crate::io::{read_textgrid, write_textgrid, FileReport, MetricsTable, TableRow};
use crate::stages::{process_timeline, Diagnostic, ProcessOutcome};

const TEXTGRID_EXTENSION: &str = "TextGrid";

/// Configuration for a directory run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    /// Aggregate table; existing rows are merged in
    pub table_path: Option<PathBuf>,
    /// Where reconciled TextGrids are written
    pub save_dir: Option<PathBuf>,
    /// Where per-file JSON reports are written
    pub json_dir: Option<PathBuf>,
    /// Files processed at once
    pub jobs: usize,
    /// Delete inputs once their reconciled copy is saved
    pub remove_processed: bool,
    pub process: ProcessConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            table_path: None,
            save_dir: None,
            json_dir: None,
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            remove_processed: false,
            process: ProcessConfig::default(),
        }
    }
}

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Processed {
        file: PathBuf,
        report: FileReport,
    },
    Invalid {
        file: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },
    Failed {
        file: PathBuf,
        message: String,
    },
}

impl FileOutcome {
    pub fn file(&self) -> &Path {
        match self {
            FileOutcome::Processed { file, .. }
            | FileOutcome::Invalid { file, .. }
            | FileOutcome::Failed { file, .. } => file,
        }
    }
}

/// Result of a directory run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    /// One entry per input file, in input order
    pub outcomes: Vec<FileOutcome>,
    /// Rows written to the aggregate table, historical rows included
    pub table_rows: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Processed { .. }))
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Invalid { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }

    /// Diagnostic and failure lines of every skipped file
    pub fn problem_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for outcome in &self.outcomes {
            let name = display_name(outcome.file());
            match outcome {
                FileOutcome::Invalid { diagnostics, .. } => {
                    lines.extend(diagnostics.iter().map(|d| d.render(&name)));
                }
                FileOutcome::Failed { message, .. } => {
                    lines.push(format!("{}: {}", name, message));
                }
                FileOutcome::Processed { .. } => {}
            }
        }
        lines
    }
}

/// TextGrid files directly inside `dir`, sorted by name
pub fn discover_textgrids(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Input directory not found: {:?}", dir);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let is_textgrid = entry
                    .path()
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(TEXTGRID_EXTENSION));
                if entry.file_type().is_file() && is_textgrid {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }

    Ok(files)
}

/// Process every TextGrid in the input directory and write the aggregate table
pub async fn run_batch(config: BatchConfig) -> Result<BatchSummary> {
    let files = discover_textgrids(&config.input_dir)?;
    info!("Found {} TextGrid files in {:?}", files.len(), config.input_dir);

    let config = Arc::new(config);
    let jobs = config.jobs.max(1);
    let mut slots: Vec<Option<FileOutcome>> = vec![None; files.len()];
    let mut set = JoinSet::new();

    for (index, path) in files.iter().cloned().enumerate() {
        if set.len() >= jobs {
            collect_next(&mut set, &mut slots).await;
        }
        let config = Arc::clone(&config);
        set.spawn(async move {
            let worker_path = path.clone();
            let result =
                tokio::task::spawn_blocking(move || process_file(&worker_path, &config)).await;
            let outcome = result.unwrap_or_else(|e| FileOutcome::Failed {
                message: format!("worker failed: {}", e),
                file: path,
            });
            (index, outcome)
        });
    }
    while !set.is_empty() {
        collect_next(&mut set, &mut slots).await;
    }

    let outcomes: Vec<FileOutcome> = slots
        .into_iter()
        .zip(files)
        .map(|(slot, file)| {
            slot.unwrap_or_else(|| FileOutcome::Failed {
                file,
                message: "worker did not complete".to_string(),
            })
        })
        .collect();

    let table_rows = match &config.table_path {
        Some(path) => write_table(path, &outcomes)?,
        None => 0,
    };

    let summary = BatchSummary {
        generated_at: Utc::now(),
        outcomes,
        table_rows,
    };

    info!(
        "Batch complete: {} processed, {} invalid, {} failed",
        summary.processed(),
        summary.invalid(),
        summary.failed()
    );

    Ok(summary)
}

async fn collect_next(
    set: &mut JoinSet<(usize, FileOutcome)>,
    slots: &mut [Option<FileOutcome>],
) {
    match set.join_next().await {
        Some(Ok((index, outcome))) => slots[index] = Some(outcome),
        Some(Err(e)) => warn!("Batch task failed: {}", e),
        None => {}
    }
}

/// Run one file through the pipeline and write its outputs. Never fails;
/// every error becomes part of the outcome.
fn process_file(path: &Path, config: &BatchConfig) -> FileOutcome {
    let name = display_name(path);
    let failed = |message: String| {
        warn!("{}: {}", name, message);
        FileOutcome::Failed {
            file: path.to_path_buf(),
            message,
        }
    };

    let timeline = match read_textgrid(path, &config.process.layout) {
        Ok(t) => t,
        Err(e) => return failed(e.to_string()),
    };

    let processed = match process_timeline(timeline, &name, &config.process) {
        Ok(ProcessOutcome::Processed(processed)) => processed,
        Ok(ProcessOutcome::Invalid(diagnostics)) => {
            for diagnostic in &diagnostics {
                warn!("{}", diagnostic.render(&name));
            }
            return FileOutcome::Invalid {
                file: path.to_path_buf(),
                diagnostics,
            };
        }
        Err(e) => return failed(e.to_string()),
    };

    if let Some(save_dir) = &config.save_dir {
        if let Err(e) = write_textgrid(&processed.timeline, &save_dir.join(&name)) {
            return failed(e.to_string());
        }
        if config.remove_processed {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed processed input {:?}", path),
                Err(e) => warn!("Could not remove {:?}: {}", path, e),
            }
        }
    }

    if let Some(json_dir) = &config.json_dir {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        if let Err(e) = processed.report.write_json(&json_dir.join(format!("{}.json", stem))) {
            return failed(format!("{:#}", e));
        }
    }

    info!(
        "{}: {} reconcile changes, PhonRat {:.2}",
        name,
        processed.report.reconcile.total_changes(),
        processed.report.metrics.fluency.phonation_rate
    );

    FileOutcome::Processed {
        file: path.to_path_buf(),
        report: processed.report,
    }
}

/// Merge new rows with the existing table file and rewrite it
fn write_table(path: &Path, outcomes: &[FileOutcome]) -> Result<usize> {
    let mut table = MetricsTable::new();
    for outcome in outcomes {
        if let FileOutcome::Processed { report, .. } = outcome {
            table.push(TableRow::from_metrics(&report.identity, &report.metrics));
        }
    }

    if path.exists() {
        let historical = table
            .append_csv(path)
            .with_context(|| format!("Failed to read existing table {:?}", path))?;
        debug!("Merged {} historical rows from {:?}", historical, path);
    } else {
        warn!("No existing table at {:?}; creating a new one", path);
    }

    table.sort();
    table
        .write_csv(path)
        .with_context(|| format!("Failed to write table {:?}", path))?;
    info!("Wrote {} rows to {:?}", table.len(), path);

    Ok(table.len())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Interval, Tier, TierLayout, Timeline};

    fn tier(name: &str, spans: &[(f64, f64, &str)]) -> Tier {
        Tier::new(
            name,
            spans
                .iter()
                .map(|(s, e, l)| Interval::new(*s, *e, *l))
                .collect(),
        )
    }

    fn valid_timeline() -> Timeline {
        Timeline::new(
            0.0,
            6.0,
            vec![
                tier("Words", &[(0.0, 6.0, "")]),
                tier(
                    "Phrases",
                    &[(0.0, 1.0, ""), (1.0, 2.5, "pr"), (2.5, 3.5, "ps"), (3.5, 5.0, "pr"), (5.0, 6.0, "")],
                ),
                tier(
                    "DFauto (English)",
                    &[(0.0, 1.5, ""), (1.5, 1.9, "v"), (1.9, 4.0, ""), (4.0, 4.3, "v"), (4.3, 6.0, "")],
                ),
                tier("Repairs", &[(0.0, 6.0, "")]),
                tier("Japanese", &[(0.0, 6.0, "")]),
                tier(
                    "Intensity",
                    &[(0.0, 1.5, ""), (1.5, 1.9, "70"), (1.9, 4.0, ""), (4.0, 4.3, "65"), (4.3, 6.0, "")],
                ),
                tier(
                    "Pitch",
                    &[(0.0, 1.5, ""), (1.5, 1.9, "200"), (1.9, 4.0, ""), (4.0, 4.3, "180"), (4.3, 6.0, "")],
                ),
            ],
            TierLayout::default(),
        )
    }

    #[test]
    fn test_discover_only_textgrids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.TextGrid"), "").unwrap();
        std::fs::write(dir.path().join("a.textgrid"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.TextGrid"), "").unwrap();

        let files = discover_textgrids(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|f| display_name(f)).collect();
        assert_eq!(names, vec!["a.textgrid", "b.TextGrid"]);
    }

    #[test]
    fn test_discover_missing_directory() {
        assert!(discover_textgrids(Path::new("/nonexistent/fluency")).is_err());
    }

    #[tokio::test]
    async fn test_batch_skips_invalid_files() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        write_textgrid(&valid_timeline(), &input.path().join("S01R01041523.TextGrid")).unwrap();

        let mut short = valid_timeline();
        short.tiers.truncate(5);
        write_textgrid(&short, &input.path().join("S02R01041523.TextGrid")).unwrap();

        std::fs::write(input.path().join("S03R01041523.TextGrid"), "not a textgrid").unwrap();

        let table_path = output.path().join("master.csv");
        let config = BatchConfig {
            input_dir: input.path().to_path_buf(),
            table_path: Some(table_path.clone()),
            save_dir: Some(output.path().join("saved")),
            json_dir: Some(output.path().join("json")),
            jobs: 2,
            ..Default::default()
        };

        let summary = run_batch(config).await.unwrap();

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.invalid(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.table_rows, 1);
        assert!(matches!(summary.outcomes[1], FileOutcome::Invalid { .. }));

        let lines = summary.problem_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("S02R01041523.TextGrid: fewer tiers"));

        assert!(output.path().join("saved").join("S01R01041523.TextGrid").exists());
        assert!(output.path().join("json").join("S01R01041523.json").exists());
        // inputs stay without --remove-processed
        assert!(input.path().join("S01R01041523.TextGrid").exists());

        let table = std::fs::read_to_string(&table_path).unwrap();
        assert_eq!(table.lines().count(), 2);
        assert!(table.lines().nth(1).unwrap().starts_with("S01R01041523.TextGrid,S01,R01,04-15-23,2,"));
    }

    #[tokio::test]
    async fn test_remove_processed_inputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = input.path().join("S01R01041523.TextGrid");
        write_textgrid(&valid_timeline(), &path).unwrap();

        let config = BatchConfig {
            input_dir: input.path().to_path_buf(),
            save_dir: Some(output.path().to_path_buf()),
            remove_processed: true,
            jobs: 1,
            ..Default::default()
        };
        let summary = run_batch(config).await.unwrap();

        assert_eq!(summary.processed(), 1);
        assert_eq!(summary.table_rows, 0);
        assert!(!path.exists());
        assert!(output.path().join("S01R01041523.TextGrid").exists());
    }
}
