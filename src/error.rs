//! Error and warning taxonomy.
//!
//! Malformed inputs fail fast with [`EngineError`] before any optimization
//! starts. Per-item and per-respondent problems are isolated as
//! [`EngineWarning`] values attached to the batch result; they never abort
//! the remaining work.

use serde::Serialize;
use thiserror::Error;

/// Fatal input errors, raised before any estimation begins.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The response matrix has no respondents or no items.
    #[error("response matrix is empty")]
    EmptyMatrix,

    /// The id maps do not agree with the matrix dimensions.
    #[error("inconsistent id map: {0}")]
    InconsistentIdMap(String),

    /// A respondent or item id appears more than once.
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// A matrix cell holds something other than 0, 1, or the missing marker.
    #[error("invalid response value {value} at row {row}, column {col} (expected 0, 1, or -1)")]
    InvalidResponseValue { row: usize, col: usize, value: i32 },

    /// An anchor references an item the matrix does not contain.
    #[error("anchor item '{item_id}' is not present in the response matrix")]
    UnknownAnchorItem { item_id: String },

    /// A parameter set is missing an item required by the operation.
    #[error("parameter set has no entry for item '{item_id}'")]
    MissingItemParameters { item_id: String },

    /// Equating cannot produce a finite transform from these inputs.
    #[error("cannot equate scales: {0}")]
    DegenerateEquating(String),

    /// The fit test needs at least two bins and enough respondents to fill
    /// them.
    #[error("invalid fit binning: {0}")]
    InvalidFitBinning(String),
}

/// Non-fatal, per-unit diagnostics attached to batch results.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind")]
pub enum EngineWarning {
    /// Too few usable responses (or no response variance) to estimate;
    /// fallback values were substituted.
    #[error("{id}: insufficient data ({valid_count} valid responses, {detail}); fallback used")]
    DataInsufficiency {
        id: String,
        valid_count: usize,
        detail: String,
    },

    /// Every starting point of the bounded search failed to converge;
    /// fallback values were substituted.
    #[error("{id}: optimization did not converge from any starting point; fallback used")]
    OptimizationFailure { id: String },

    /// The converged parameters violated a hard validity constraint and were
    /// rejected.
    #[error("item {item_id}: invalid calibrated parameters ({detail}); fallback used")]
    InvalidParameter { item_id: String, detail: String },

    /// The equating transform is usable but its anchor fit is weak.
    #[error("equating quality: {detail}")]
    EquatingQuality { detail: String },
}
