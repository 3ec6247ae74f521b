use serde::{Deserialize, Serialize};

use crate::error::AllocationError;

/// Absolute tolerance used to judge whether an allocation hits its target sum.
pub const TOLERANCE: f64 = 1e-6;

/// Amount of money or budget.
pub type Amount = f64;

/// One amount per section, in section order.
pub type Allocation = Vec<Amount>;

// ============================================================================
// Shape checks shared by every matrix-shaped input
// ============================================================================

/// Width of a non-empty rectangular table, or an error naming `what`.
pub(crate) fn rectangular_width(rows: &[Vec<f64>], what: &str) -> Result<usize, AllocationError> {
    let Some(first) = rows.first() else {
        return Err(AllocationError::invalid(format!("{what} has no rows")));
    };
    let width = first.len();
    if width == 0 {
        return Err(AllocationError::invalid(format!("{what} has no columns")));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(AllocationError::invalid(format!(
            "{what} row {i} has {} entries, expected {width}",
            row.len()
        )));
    }
    Ok(width)
}

/// Rejects negative or non-finite entries.
pub(crate) fn check_non_negative(rows: &[Vec<f64>], what: &str) -> Result<(), AllocationError> {
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            if !v.is_finite() || v < 0.0 {
                return Err(AllocationError::invalid(format!(
                    "{what}[{i}][{j}] = {v} must be finite and non-negative"
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Vote matrix
// ============================================================================

/// Citizens' proposed budgets: row `i` is citizen `i`'s split across all sections.
///
/// Construction only checks the shape (at least one citizen, at least one
/// section, every row the same length). Row sums and signs are left to the
/// caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct VoteMatrix {
    rows: Vec<Vec<f64>>,
    sections: usize,
}

impl VoteMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self, AllocationError> {
        let sections = rectangular_width(&rows, "vote matrix")?;
        Ok(Self { rows, sections })
    }

    /// Number of citizens (n).
    pub fn citizens(&self) -> usize {
        self.rows.len()
    }

    /// Number of budget sections (m).
    pub fn sections(&self) -> usize {
        self.sections
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// All citizens' votes for section `j`.
    pub fn column(&self, j: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[j])
    }
}

impl TryFrom<Vec<Vec<f64>>> for VoteMatrix {
    type Error = AllocationError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl TryFrom<&[Vec<f64>]> for VoteMatrix {
    type Error = AllocationError;

    fn try_from(rows: &[Vec<f64>]) -> Result<Self, Self::Error> {
        Self::new(rows.to_vec())
    }
}

impl From<VoteMatrix> for Vec<Vec<f64>> {
    fn from(matrix: VoteMatrix) -> Self {
        matrix.rows
    }
}
