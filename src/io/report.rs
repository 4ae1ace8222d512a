use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{FileIdentity, FluencyMetrics};
use crate::stages::ReconcileReport;

/// Per-file JSON report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub identity: FileIdentity,
    pub metrics: FluencyMetrics,
    pub reconcile: ReconcileReport,
}

impl FileReport {
    /// Write to a JSON file, creating the parent directory
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FluencyMeasures, ProsodyMeasures};

    #[test]
    fn test_write_json_uses_record_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("S01R02041523.json");
        let report = FileReport {
            identity: FileIdentity::from_filename("S01R02041523.TextGrid"),
            metrics: FluencyMetrics::new(
                FluencyMeasures {
                    phonation_rate: 75.0,
                    ..Default::default()
                },
                ProsodyMeasures::default(),
            ),
            reconcile: ReconcileReport::default(),
        };

        report.write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(value["ID"], "S01");
        assert_eq!(value["Date"], "04-15-23");
        assert_eq!(value["metrics"]["version"], 1);
        assert_eq!(value["metrics"]["fluency"]["PhonRat"], 75.0);
        assert_eq!(value["reconcile"]["phrase_gaps_filled"], 0);
    }
}
