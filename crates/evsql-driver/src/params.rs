//! Statement parameters for the parameterized execution path.

use bytes::Bytes;

/// Wire format of parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Values are text representations.
    #[default]
    Text,
    /// Values are the driver's binary encoding.
    Binary,
}

/// A single bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// SQL `NULL`.
    Null,
    /// Encoded value bytes, interpreted according to the [`Format`].
    Value(Bytes),
}

impl Param {
    /// Borrow the encoded bytes, `None` for `NULL`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Null => None,
            Self::Value(b) => Some(b),
        }
    }

    /// Length of the encoded value (0 for `NULL`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    /// Whether the value is `NULL` or empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Value(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Value(Bytes::from(value))
    }
}

impl From<Vec<u8>> for Param {
    fn from(value: Vec<u8>) -> Self {
        Self::Value(Bytes::from(value))
    }
}

impl From<Bytes> for Param {
    fn from(value: Bytes) -> Self {
        Self::Value(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::from(value.to_string())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
