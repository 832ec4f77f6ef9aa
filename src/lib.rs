//! 3PL item response theory estimation engine.
//!
//! This crate is the statistical core of an assessment-scoring system:
//! - Item-parameter calibration under the 3PL model, as plain maximum
//!   likelihood (ML) or with adaptive fences (MLF)
//! - Anchor-item handling for cross-administration consistency
//! - Respondent proficiency (theta) estimation and reporting-scale scores
//! - Mean/sigma scale equating through shared anchors
//! - Chi-square model-fit diagnostics over theta quantile groups
//! - Seeded response simulation for validation
//!
//! Ingestion, persistence, and presentation layers are external
//! collaborators: the engine consumes an in-memory [`ResponseMatrix`] plus a
//! caller-owned [`EngineConfig`] and produces parameter sets, result tables,
//! and equating transforms.
//!
//! Calibration approximates each item's likelihood at a point theta derived
//! from the item's observed proportion correct; this is deliberately exposed
//! as the named [`PointThetaStrategy`] so a joint EM-based estimator can be
//! added behind the same [`CalibrationStrategy`] interface.

pub mod anchors;
pub mod calibration;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod equating;
pub mod error;
pub mod fences;
pub mod optim;
pub mod scoring;
pub mod simulation;
pub mod utils;

pub use anchors::AnchorParameters;
pub use calibration::{
    calibrate, Calibration, CalibrationMethod, CalibrationStrategy, PointThetaStrategy,
};
pub use config::EngineConfig;
pub use data::{
    CancelToken, ItemParameters, ParameterSet, ResponseMatrix, ResultTable, ThetaEstimate,
};
pub use diagnostics::{test_fit, FitReport};
pub use equating::{equate, Equating, EquatingTransform};
pub use error::{EngineError, EngineWarning};
pub use scoring::{convert_score, estimate_theta, score_respondents};
