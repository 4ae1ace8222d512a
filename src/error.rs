use std::fmt::Display;
use std::path::Path;

use thiserror::Error;

use crate::models::TierRole;

/// Result alias for the library layer
pub type Result<T> = std::result::Result<T, FluencyError>;

/// Errors raised while loading, reconciling or measuring a timeline
#[derive(Debug, Error)]
pub enum FluencyError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("TextGrid {path}: {message}")]
    TextGrid { path: String, message: String },

    #[error("tier {0:?} is a point tier; only interval tiers are supported")]
    PointTier(String),

    #[error("tier for role {0} not found")]
    MissingTier(TierRole),

    #[error("{role} tier is not aligned with the segmental tier at interval {index}")]
    Misaligned { role: TierRole, index: usize },

    #[error("{role} value {value:?} at {time} is not a number")]
    InvalidNumber {
        role: TierRole,
        time: f64,
        value: String,
    },

    #[error("table error: {0}")]
    Table(#[from] csv::Error),
}

impl FluencyError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn textgrid(path: &Path, message: impl Display) -> Self {
        Self::TextGrid {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}
