//! Anchor-item resolution.
//!
//! Anchors are owned by the caller; calibration only borrows them. Columns
//! are located through the matrix's item_id map, never by position.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::ResponseMatrix;
use crate::error::EngineError;

/// Fixed parameters for one anchor item, as supplied by a prior calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorParameters {
    pub item_id: String,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Anchor placement over the columns of one response matrix.
#[derive(Debug, Clone)]
pub struct AnchorLayout<'a> {
    mask: Vec<bool>,
    by_column: HashMap<usize, &'a AnchorParameters>,
}

impl<'a> AnchorLayout<'a> {
    /// Boolean mask over matrix columns; true where the item is anchored.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn is_anchor(&self, col: usize) -> bool {
        self.mask.get(col).copied().unwrap_or(false)
    }

    pub fn anchor_for(&self, col: usize) -> Option<&'a AnchorParameters> {
        self.by_column.get(&col).copied()
    }

    pub fn anchor_count(&self) -> usize {
        self.by_column.len()
    }
}

/// Resolve anchors against a matrix, failing fast when an anchor id does not
/// exist in the matrix.
pub fn resolve<'a>(
    matrix: &ResponseMatrix,
    anchors: &'a [AnchorParameters],
) -> Result<AnchorLayout<'a>, EngineError> {
    let mut mask = vec![false; matrix.n_items()];
    let mut by_column = HashMap::with_capacity(anchors.len());
    for anchor in anchors {
        let col = matrix
            .item_column(&anchor.item_id)
            .ok_or_else(|| EngineError::UnknownAnchorItem {
                item_id: anchor.item_id.clone(),
            })?;
        mask[col] = true;
        by_column.insert(col, anchor);
    }
    Ok(AnchorLayout { mask, by_column })
}
