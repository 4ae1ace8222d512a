pub mod batch;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod stages;

pub use batch::{run_batch, BatchConfig, BatchSummary, FileOutcome};
pub use config::{ProcessConfig, ReconcileConfig, ValidationConfig};
pub use error::{FluencyError, Result};
pub use io::{read_textgrid, write_textgrid, FileReport, MetricsTable};
pub use models::{FileIdentity, FluencyMetrics, TierLayout, TierRole, Timeline};
pub use stages::{
    measure_fluency, measure_prosody, process_timeline, reconcile, reconcile_with_snapshot,
    validate, Diagnostic, ProcessOutcome, ReconcileReport, Reconciliation, Validation,
};
