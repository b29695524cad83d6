//! Structs and cell arrays

use crate::errors::{ConvResult, ConversionError};
use crate::value::{Dims, HostValue};

/// Whether `name` can be a struct field: a letter or `_`, then letters,
/// digits or `_`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Scalar struct with fields kept in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    fields: Vec<(String, HostValue)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields<I, K>(fields: I) -> ConvResult<Self>
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        let mut value = Self::new();
        for (name, field) in fields {
            value.insert(name, field)?;
        }
        Ok(value)
    }

    /// Set a field, replacing an existing one in place
    pub fn insert(&mut self, name: impl Into<String>, value: HostValue) -> ConvResult<()> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(ConversionError::invalid_identifier(&name));
        }
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Struct array: every element shares the same field names
#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    dims: Dims,
    elements: Vec<StructValue>,
}

impl StructArray {
    pub fn new(dims: Dims, elements: Vec<StructValue>) -> ConvResult<Self> {
        if dims.numel() != elements.len() {
            return Err(ConversionError::value_convert(format!(
                "struct array of size {} cannot hold {} elements",
                dims,
                elements.len()
            )));
        }
        if let Some(first) = elements.first() {
            let names = first.field_names();
            if elements.iter().any(|element| element.field_names() != names) {
                return Err(ConversionError::value_convert(
                    "struct array elements must have the same fields",
                ));
            }
        }
        Ok(Self { dims, elements })
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn elements(&self) -> &[StructValue] {
        &self.elements
    }
}

/// Rectangular array of host values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellArray {
    dims: Dims,
    items: Vec<HostValue>,
}

impl CellArray {
    pub fn new(dims: Dims, items: Vec<HostValue>) -> ConvResult<Self> {
        if dims.numel() != items.len() {
            return Err(ConversionError::value_convert(format!(
                "cell array of size {} cannot hold {} elements",
                dims,
                items.len()
            )));
        }
        Ok(Self { dims, items })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row(items: Vec<HostValue>) -> Self {
        Self {
            dims: Dims::row(items.len()),
            items,
        }
    }

    pub fn column(items: Vec<HostValue>) -> Self {
        Self {
            dims: Dims::column(items.len()),
            items,
        }
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    /// Items in linear (column-major) order
    pub fn items(&self) -> &[HostValue] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&HostValue> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("a"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1x"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("é"));
    }

    #[test]
    fn test_struct_keeps_insertion_order() {
        let mut value = StructValue::new();
        value.insert("b", HostValue::from(1.0)).unwrap();
        value.insert("a", HostValue::from(2.0)).unwrap();
        value.insert("b", HostValue::from(3.0)).unwrap();
        assert_eq!(value.field_names(), vec!["b", "a"]);
        assert_eq!(value.get("b"), Some(&HostValue::from(3.0)));

        let error = value.insert("not valid", HostValue::from(0.0)).unwrap_err();
        assert_eq!(error.kind, crate::errors::ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_cell_shapes() {
        assert!(CellArray::new(Dims::matrix(2, 2), vec![HostValue::Undefined; 3]).is_err());
        let cell = CellArray::row(vec![HostValue::from(1.0), HostValue::from("x")]);
        assert_eq!(cell.dims(), &Dims::row(2));
        assert!(CellArray::empty().dims().is_empty());
    }
}
