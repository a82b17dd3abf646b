use std::collections::BTreeMap;

/// Typed scalar cell of a query result.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view, `None` for nulls and non-numbers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[expect(clippy::cast_precision_loss)]
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Scalar {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Boolean(value),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(value) => Self::Text(value),
            value @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(value.to_string())
            }
        }
    }
}

/// Query result row: column name to scalar.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row(BTreeMap<String, Scalar>);

impl Row {
    const NULL: Scalar = Scalar::Null;

    /// Get the column value, missing columns are nulls.
    pub fn get(&self, column: &str) -> &Scalar {
        self.0.get(column).unwrap_or(&Self::NULL)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Row {
    fn from(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(object.into_iter().map(|(column, value)| (column, Scalar::from(value))).collect())
    }
}

impl<K: Into<String>> FromIterator<(K, Scalar)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Scalar)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(column, value)| (column.into(), value)).collect())
    }
}
