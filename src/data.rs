//! Core data model: the response matrix, calibrated parameter sets, and
//! per-respondent results.
//!
//! Responses are stored as `i32` with `1` = correct, `0` = incorrect and
//! `-1` = missing. Both matrix axes carry explicit bidirectional id/index
//! maps; nothing downstream ever assumes positional ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineWarning};

/// Cell marker for a missing response.
pub const MISSING: i32 = -1;

/// Respondents x items response grid with validated id maps.
#[derive(Debug, Clone)]
pub struct ResponseMatrix {
    data: Array2<i32>,
    respondent_ids: Vec<String>,
    item_ids: Vec<String>,
    respondent_index: HashMap<String, usize>,
    item_index: HashMap<String, usize>,
}

impl ResponseMatrix {
    /// Build a matrix, failing fast on empty axes, id/shape mismatches,
    /// duplicate ids, or cell values outside `{-1, 0, 1}`.
    pub fn new(
        data: Array2<i32>,
        respondent_ids: Vec<String>,
        item_ids: Vec<String>,
    ) -> Result<Self, EngineError> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(EngineError::EmptyMatrix);
        }
        if respondent_ids.len() != data.nrows() {
            return Err(EngineError::InconsistentIdMap(format!(
                "{} respondent ids for {} matrix rows",
                respondent_ids.len(),
                data.nrows()
            )));
        }
        if item_ids.len() != data.ncols() {
            return Err(EngineError::InconsistentIdMap(format!(
                "{} item ids for {} matrix columns",
                item_ids.len(),
                data.ncols()
            )));
        }
        for ((row, col), &value) in data.indexed_iter() {
            if value != MISSING && value != 0 && value != 1 {
                return Err(EngineError::InvalidResponseValue { row, col, value });
            }
        }
        let respondent_index = build_index(&respondent_ids, "respondent")?;
        let item_index = build_index(&item_ids, "item")?;
        Ok(Self {
            data,
            respondent_ids,
            item_ids,
            respondent_index,
            item_index,
        })
    }

    pub fn n_respondents(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.data.ncols()
    }

    pub fn respondent_ids(&self) -> &[String] {
        &self.respondent_ids
    }

    pub fn item_ids(&self) -> &[String] {
        &self.item_ids
    }

    /// Column index of an item id.
    pub fn item_column(&self, item_id: &str) -> Option<usize> {
        self.item_index.get(item_id).copied()
    }

    /// Row index of a respondent id.
    pub fn respondent_row(&self, respondent_id: &str) -> Option<usize> {
        self.respondent_index.get(respondent_id).copied()
    }

    /// One item's responses across all respondents.
    pub fn column(&self, col: usize) -> ArrayView1<'_, i32> {
        self.data.column(col)
    }

    /// One respondent's responses across all items.
    pub fn row(&self, row: usize) -> ArrayView1<'_, i32> {
        self.data.row(row)
    }

    pub fn data(&self) -> &Array2<i32> {
        &self.data
    }
}

fn build_index(
    ids: &[String],
    kind: &'static str,
) -> Result<HashMap<String, usize>, EngineError> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(EngineError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(index)
}

/// Calibrated (or anchored) parameters of a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemParameters {
    pub item_id: String,
    /// Discrimination, > 0.
    pub a: f64,
    /// Difficulty.
    pub b: f64,
    /// Pseudo-guessing, in [0, 1].
    pub c: f64,
    pub is_anchor: bool,
    /// False for anchors and fallback substitutions.
    pub calibrated: bool,
}

/// Ordered, immutable collection of item parameters from one calibration run.
///
/// A new calibration always produces a new set; `complete` is false when a
/// cancellation discarded part of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSet {
    items: Vec<ItemParameters>,
    complete: bool,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ParameterSet {
    pub fn new(items: Vec<ItemParameters>, complete: bool) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, p)| (p.item_id.clone(), i))
            .collect();
        Self {
            items,
            complete,
            index,
        }
    }

    pub fn items(&self) -> &[ItemParameters] {
        &self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemParameters> {
        self.index.get(item_id).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Parameter vectors aligned to the matrix's column order, for the
    /// slice-oriented likelihood kernels.
    pub fn aligned_to(
        &self,
        matrix: &ResponseMatrix,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), EngineError> {
        let mut a = Vec::with_capacity(matrix.n_items());
        let mut b = Vec::with_capacity(matrix.n_items());
        let mut c = Vec::with_capacity(matrix.n_items());
        for item_id in matrix.item_ids() {
            let p = self
                .get(item_id)
                .ok_or_else(|| EngineError::MissingItemParameters {
                    item_id: item_id.clone(),
                })?;
            a.push(p.a);
            b.push(p.b);
            c.push(p.c);
        }
        Ok((a, b, c))
    }
}

/// Proficiency estimate and reporting score for one respondent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThetaEstimate {
    pub respondent_id: String,
    pub theta: f64,
    pub correct_count: usize,
    pub total_items: usize,
    pub percent_correct: f64,
    pub reporting_score: f64,
}

/// Batch scoring output: one row per respondent, in matrix row order, plus
/// the warnings accumulated along the way.
#[derive(Debug, Clone, Serialize)]
pub struct ResultTable {
    pub rows: Vec<ThetaEstimate>,
    pub warnings: Vec<EngineWarning>,
    /// False when a cancellation discarded part of the batch.
    pub complete: bool,
}

/// Shared cooperative cancellation flag.
///
/// Workers check the token between units of work; a cancelled batch returns
/// with its result marked incomplete rather than silently truncated.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
