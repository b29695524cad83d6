//! Dimension vectors

use std::fmt;

use smallvec::SmallVec;

/// Column-major dimension vector with at least two entries
///
/// Trailing singleton dimensions past the second are dropped, so
/// `[2, 3, 1, 1]` and `[2, 3]` compare equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Dims(SmallVec<[usize; 4]>);

impl Dims {
    pub fn new(dims: &[usize]) -> Self {
        let mut inner: SmallVec<[usize; 4]> = SmallVec::from_slice(dims);
        while inner.len() < 2 {
            inner.push(1);
        }
        while inner.len() > 2 && inner.last() == Some(&1) {
            inner.pop();
        }
        Self(inner)
    }

    pub fn scalar() -> Self {
        Self::new(&[1, 1])
    }

    pub fn row(columns: usize) -> Self {
        Self::new(&[1, columns])
    }

    pub fn column(rows: usize) -> Self {
        Self::new(&[rows, 1])
    }

    pub fn matrix(rows: usize, columns: usize) -> Self {
        Self::new(&[rows, columns])
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn ndims(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> usize {
        self.0[0]
    }

    pub fn columns(&self) -> usize {
        self.0[1]
    }

    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.ndims() == 2 && self.rows() == 1 && self.columns() == 1
    }

    /// Exactly one row or one column
    pub fn is_vector(&self) -> bool {
        self.ndims() == 2 && (self.rows() == 1 || self.columns() == 1)
    }

    /// Two-dimensional with at most one row or at most one column
    pub fn is_flat(&self) -> bool {
        self.ndims() == 2 && (self.rows() <= 1 || self.columns() <= 1)
    }
}

impl Default for Dims {
    fn default() -> Self {
        Self::matrix(0, 0)
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        f.write_str(&parts.join("x"))
    }
}

impl fmt::Debug for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dims({self})")
    }
}
