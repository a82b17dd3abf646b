use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use derive_more::From;
use influxdb::{Query, Timestamp, Type, WriteQuery};

use crate::prelude::*;

#[derive(Clone, Debug, PartialEq, From)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl From<FieldValue> for Type {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Float(value) => Self::Float(value),
            FieldValue::Integer(value) => Self::SignedInteger(value),
            FieldValue::Text(value) => Self::Text(value),
            FieldValue::Boolean(value) => Self::Boolean(value),
        }
    }
}

/// Single time-series point.
#[must_use]
#[derive(Clone, Debug)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add the field only when there is a value: the store does not accept nulls.
    pub fn field_opt(self, key: impl Into<String>, value: Option<impl Into<FieldValue>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    /// Render the point in the line protocol with nanosecond precision.
    pub fn to_line(&self) -> Result<String> {
        let nanos = self
            .timestamp
            .timestamp_nanos_opt()
            .and_then(|nanos| u128::try_from(nanos).ok())
            .with_context(|| format!("`{}` is out of the nanosecond range", self.timestamp))?;
        let mut query = WriteQuery::new(Timestamp::Nanoseconds(nanos), self.measurement.as_str());
        for (key, value) in &self.tags {
            query = query.add_tag(key.as_str(), value.as_str());
        }
        for (key, value) in &self.fields {
            if let FieldValue::Float(value) = value {
                ensure!(value.is_finite(), "InfluxDB does not accept `{value}` in `{key}`");
            }
            query = query.add_field(key.as_str(), value.clone());
        }
        let line = query
            .build()
            .with_context(|| format!("invalid point of `{}`", self.measurement))?
            .get();
        Ok(line)
    }
}
