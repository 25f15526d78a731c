//! Class-to-class transition counts between two categorical land-cover rasters.
use serde::Serialize;
use tracing::info;

use crate::core::raster::Raster;
use crate::error::{Error, Result};

/// Class codes and names used when none are given
pub const DEFAULT_CLASSES: [(i64, &str); 4] = [
    (1, "Water"),
    (2, "Vegetation"),
    (3, "Built-up"),
    (4, "Barren"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandCoverClass {
    pub code: i64,
    pub name: String,
}

impl LandCoverClass {
    pub fn new(code: i64, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }

    pub fn defaults() -> Vec<LandCoverClass> {
        DEFAULT_CLASSES
            .iter()
            .map(|(code, name)| LandCoverClass::new(*code, *name))
            .collect()
    }

    /// Classes for the given codes, named from the defaults where known
    pub fn from_codes(codes: &[i64]) -> Vec<LandCoverClass> {
        codes
            .iter()
            .map(|code| {
                let name = DEFAULT_CLASSES
                    .iter()
                    .find(|(c, _)| c == code)
                    .map(|(_, n)| n.to_string())
                    .unwrap_or_else(|| format!("class {}", code));
                LandCoverClass::new(*code, name)
            })
            .collect()
    }
}

/// `counts[i][j]` = pixels of class `i` before that are class `j` after
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionMatrix {
    pub classes: Vec<LandCoverClass>,
    pub counts: Vec<Vec<usize>>,
    /// Pixels invalid in either raster
    pub invalid_pixels: usize,
    /// Valid pixel pairs where either value is not one of `classes`
    pub unclassified_pixels: usize,
}

impl TransitionMatrix {
    pub fn count(&self, from: i64, to: i64) -> Option<usize> {
        let i = self.position(from)?;
        let j = self.position(to)?;
        Some(self.counts[i][j])
    }

    fn position(&self, code: i64) -> Option<usize> {
        self.classes.iter().position(|c| c.code == code)
    }

    /// Pixel pairs counted in the matrix
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn unchanged(&self) -> usize {
        (0..self.counts.len()).map(|i| self.counts[i][i]).sum()
    }

    pub fn changed(&self) -> usize {
        self.total() - self.unchanged()
    }

    pub fn changed_fraction(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.changed() as f64 / total as f64)
    }

    /// Off-diagonal entries as (from, to, pixels), largest first
    pub fn transitions(&self) -> Vec<(&LandCoverClass, &LandCoverClass, usize)> {
        let mut out = Vec::new();
        for (i, from) in self.classes.iter().enumerate() {
            for (j, to) in self.classes.iter().enumerate() {
                if i != j && self.counts[i][j] > 0 {
                    out.push((from, to, self.counts[i][j]));
                }
            }
        }
        out.sort_by(|a, b| b.2.cmp(&a.2));
        out
    }
}

/// Count class transitions between two rasters on the same grid.
///
/// Sample values are rounded to the nearest integer before matching class codes.
pub fn transition_matrix(
    before: &Raster<f64>,
    after: &Raster<f64>,
    classes: &[LandCoverClass],
) -> Result<TransitionMatrix> {
    if classes.is_empty() {
        return Err(Error::InvalidArgument {
            arg: "classes",
            value: "[]".to_string(),
        });
    }
    for (i, c) in classes.iter().enumerate() {
        if classes[..i].iter().any(|o| o.code == c.code) {
            return Err(Error::InvalidArgument {
                arg: "classes",
                value: format!("duplicate code {}", c.code),
            });
        }
    }
    before
        .georef()
        .ensure_matches(after.georef(), "before classes", "after classes")?;

    let n = classes.len();
    let mut counts = vec![vec![0usize; n]; n];
    let mut invalid = 0;
    let mut unclassified = 0;
    let lookup = |v: f64| {
        let code = v.round() as i64;
        classes.iter().position(|c| c.code == code)
    };

    for ((pos, &a), &b) in before.data().indexed_iter().zip(after.data().iter()) {
        if !before.valid_mask()[pos] || !after.valid_mask()[pos] {
            invalid += 1;
            continue;
        }
        match (lookup(a), lookup(b)) {
            (Some(i), Some(j)) => counts[i][j] += 1,
            _ => unclassified += 1,
        }
    }

    let matrix = TransitionMatrix {
        classes: classes.to_vec(),
        counts,
        invalid_pixels: invalid,
        unclassified_pixels: unclassified,
    };
    info!(
        "Transitions: {} of {} classified pixels changed class",
        matrix.changed(),
        matrix.total()
    );
    Ok(matrix)
}
