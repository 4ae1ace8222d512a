pub mod stage0_validate;
pub mod stage1_reconcile;
pub mod stage2_fluency;
pub mod stage3_prosody;

pub use stage0_validate::*;
pub use stage1_reconcile::*;
pub use stage2_fluency::measure_fluency;
pub use stage3_prosody::{hz_to_mel, measure_prosody};

use tracing::debug;

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::io::FileReport;
use crate::models::{FileIdentity, FluencyMetrics, Timeline};

/// Outcome of running one timeline through the pipeline
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Failed the consistency checks; nothing was reconciled
    Invalid(Vec<Diagnostic>),
    Processed(Box<ProcessedFile>),
}

/// Reconciled timeline and the measures taken from it
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub timeline: Timeline,
    pub report: FileReport,
}

/// Validate, reconcile and measure one timeline
pub fn process_timeline(
    timeline: Timeline,
    filename: &str,
    config: &ProcessConfig,
) -> Result<ProcessOutcome> {
    if let Validation::Invalid(diagnostics) =
        validate(&timeline, &config.validation, &config.undefined_sentinel)
    {
        return Ok(ProcessOutcome::Invalid(diagnostics));
    }

    let Reconciliation {
        timeline,
        before_repairs,
        report: reconcile_report,
    } = reconcile_with_snapshot(timeline, &config.reconcile)?;
    let fluency = measure_fluency(&before_repairs, &timeline)?;
    let prosody = measure_prosody(&timeline, &config.undefined_sentinel)?;
    debug!("{}: measured", filename);

    Ok(ProcessOutcome::Processed(Box::new(ProcessedFile {
        timeline,
        report: FileReport {
            identity: FileIdentity::from_filename(filename),
            metrics: FluencyMetrics::new(fluency, prosody),
            reconcile: reconcile_report,
        },
    })))
}
