//! Land-cover code to clutter-height classification.

use crate::types::{ClassGrid, HeightGrid, LandCover, RfError, RfResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Partial mapping from land-cover class code to clutter height in
/// meters. Codes outside the table are classification errors; there is
/// deliberately no zero default, since a silently flat cell would skew
/// the engine's diffraction geometry with no indication of the defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightTable {
    heights: HashMap<u8, f64>,
}

impl Default for HeightTable {
    /// Heights for the full fixed class set.
    fn default() -> Self {
        let heights = LandCover::ALL
            .iter()
            .map(|&c| (c.code(), c.default_height()))
            .collect();
        Self { heights }
    }
}

impl HeightTable {
    /// Table with no classes mapped.
    pub fn empty() -> Self {
        Self {
            heights: HashMap::new(),
        }
    }

    pub fn set(&mut self, class: LandCover, height_m: f64) -> &mut Self {
        self.heights.insert(class.code(), height_m);
        self
    }

    /// Map a raw code outside the named class set; escape hatch for
    /// rasters with a nonstandard legend.
    pub fn set_code(&mut self, code: u8, height_m: f64) -> &mut Self {
        self.heights.insert(code, height_m);
        self
    }

    pub fn height(&self, code: u8) -> Option<f64> {
        self.heights.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

/// Element-wise lookup of a reprojected class grid through the table.
///
/// Total over the grid or an error: any cell whose code is missing from
/// the table aborts the run.
pub fn classify_heights(codes: &ClassGrid, table: &HeightTable) -> RfResult<HeightGrid> {
    let mut heights = HeightGrid::zeros(codes.dim());
    for ((i, j), &code) in codes.indexed_iter() {
        match table.height(code) {
            Some(h) => heights[[i, j]] = h,
            None => {
                log::error!(
                    "land cover code {} at row {} col {} has no height mapping",
                    code,
                    i,
                    j
                );
                return Err(RfError::UnknownLandCoverClass { code });
            }
        }
    }
    log::debug!(
        "classified {}x{} cells against {} mapped classes",
        codes.nrows(),
        codes.ncols(),
        table.len()
    );
    Ok(heights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_is_total_over_mapped_codes() {
        let table = HeightTable::default();
        let codes: ClassGrid = array![[2, 7], [1, 11]];
        let heights = classify_heights(&codes, &table).unwrap();
        assert_eq!(heights, array![[8.0, 15.0], [0.0, 0.1]]);
    }

    #[test]
    fn test_unknown_code_is_a_hard_error() {
        let table = HeightTable::default();
        // 3 is a hole in the class code space
        let codes: ClassGrid = array![[2, 3], [1, 1]];
        let err = classify_heights(&codes, &table).unwrap_err();
        assert!(matches!(err, RfError::UnknownLandCoverClass { code: 3 }));
    }

    #[test]
    fn test_no_zero_default_for_missing_classes() {
        let mut table = HeightTable::empty();
        table.set(LandCover::Trees, 8.0);
        let codes: ClassGrid = array![[2, 1]];
        // water is unmapped in this table, so the lookup must fail
        // rather than default its height
        assert!(classify_heights(&codes, &table).is_err());
    }

    #[test]
    fn test_custom_code_mapping() {
        let mut table = HeightTable::default();
        table.set_code(42, 3.5);
        let codes: ClassGrid = array![[42]];
        let heights = classify_heights(&codes, &table).unwrap();
        assert_eq!(heights[[0, 0]], 3.5);
    }
}
