//! Character arrays

use crate::errors::{ConvResult, ConversionError};
use crate::value::Dims;

/// Byte-per-character array, column-major like every other host array
///
/// A single-row array is an ordinary string; bytes are UTF-8 by
/// convention but not validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharArray {
    dims: Dims,
    data: Vec<u8>,
}

impl CharArray {
    pub fn new(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// One row holding `bytes`; the empty string is 0x0
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let dims = if bytes.is_empty() {
            Dims::matrix(0, 0)
        } else {
            Dims::row(bytes.len())
        };
        Self { dims, data: bytes }
    }

    /// Stack rows, padding short ones with blanks
    pub fn from_rows(rows: &[&str]) -> Self {
        let columns = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        let mut data = vec![b' '; rows.len() * columns];
        for (r, row) in rows.iter().enumerate() {
            for (c, byte) in row.bytes().enumerate() {
                data[c * rows.len() + r] = byte;
            }
        }
        Self {
            dims: Dims::matrix(rows.len(), columns),
            data,
        }
    }

    /// Column-major character data of any shape
    pub fn with_dims(dims: Dims, data: Vec<u8>) -> ConvResult<Self> {
        if dims.numel() != data.len() {
            return Err(ConversionError::value_convert(format!(
                "char array of size {} cannot hold {} characters",
                dims,
                data.len()
            )));
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Raw column-major bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.dims.rows()
    }

    pub fn is_multirow(&self) -> bool {
        self.dims.ndims() > 2 || self.rows() > 1
    }

    /// Bytes of row `r` (2-D arrays only)
    pub fn row_bytes(&self, r: usize) -> Vec<u8> {
        let rows = self.rows();
        if r >= rows {
            return Vec::new();
        }
        (0..self.dims.columns())
            .map(|c| self.data[c * rows + r])
            .collect()
    }

    /// Contents of a single-row array, lossily decoded
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.row_bytes(0)).into_owned()
    }
}

impl From<&str> for CharArray {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let text = CharArray::new("Octave");
        assert_eq!(text.dims(), &Dims::row(6));
        assert!(!text.is_multirow());
        assert_eq!(text.to_string_lossy(), "Octave");
        assert_eq!(CharArray::new("").dims(), &Dims::matrix(0, 0));
    }

    #[test]
    fn test_rows_are_padded() {
        let text = CharArray::from_rows(&["ab", "c"]);
        assert!(text.is_multirow());
        assert_eq!(text.data(), b"acb ");
        assert_eq!(text.row_bytes(1), b"c ".to_vec());
    }
}
