use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    api::{
        influxdb::{FieldValue, Point, Row, Store, sql},
        modbus::Value,
    },
    poller::RegisterReading,
    prelude::*,
};

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Integer(value) => Self::Integer(value),
            Value::Float(value) => Self::Float(value),
            Value::Text(value) => Self::Text(value),
        }
    }
}

/// Writes the live readings and exposes the query side to the rollups.
pub struct TelemetryWriter<S> {
    store: S,
    measurement: String,
}

impl<S: Store> TelemetryWriter<S> {
    pub const fn new(store: S, measurement: String) -> Self {
        Self { store, measurement }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Write one point per reading, all sharing the timestamp.
    ///
    /// Null readings are omitted, the rest of the batch is still written.
    #[instrument(skip_all, fields(n_readings = readings.len()))]
    pub async fn write_batch(
        &self,
        readings: Vec<RegisterReading>,
        timestamp: DateTime<Utc>,
    ) -> Result {
        let points: Vec<Point> = readings
            .into_iter()
            .filter_map(|reading| {
                let Some(value) = reading.value else {
                    debug!(metric = reading.name, "skipping the null reading");
                    return None;
                };
                Some(
                    Point::new(&self.measurement, timestamp)
                        .tag("source", reading.source.to_string())
                        .field(reading.name, value),
                )
            })
            .collect();
        self.store.write(&points).await.context("failed to write the readings")?;
        info!(n_points = points.len(), "written");
        Ok(())
    }

    /// Columns of the live measurement, empty when nothing has been written yet.
    #[instrument(skip_all, level = Level::DEBUG)]
    pub async fn columns(&self) -> Result<HashSet<String>> {
        let query = format!(
            "SELECT column_name FROM information_schema.columns WHERE table_name = {}",
            sql::string(&self.measurement),
        );
        let rows = self.store.query(&query).await.context("failed to list the columns")?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("column_name").as_str())
            .map(str::to_owned)
            .collect())
    }

    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.store.query(sql).await
    }

    pub async fn write_point(&self, point: Point) -> Result {
        self.store.write(&[point]).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{api::influxdb::testing::MemoryStore, catalog::Source};

    fn reading(name: &'static str, source: Source, value: Option<Value>) -> RegisterReading {
        RegisterReading { name, source, unit: None, value }
    }

    #[tokio::test]
    async fn write_batch_ok() -> Result {
        let writer = TelemetryWriter::new(MemoryStore::default(), "sun2000_monitoring".to_owned());
        let timestamp = Utc.with_ymd_and_hms(2025, 12, 20, 12, 0, 0).unwrap();
        let readings = vec![
            reading("battery_soc", Source::Battery, Some(Value::Float(55.5))),
            reading("battery_unit1_battery_temperature", Source::Battery, None),
            reading("device_status", Source::Inverter, Some(Value::Text("On-grid".to_owned()))),
            reading("meter_active_power", Source::Meter, Some(Value::Integer(-1200))),
        ];
        writer.write_batch(readings, timestamp).await?;

        let points = writer.store().points_of("sun2000_monitoring");
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|point| point.timestamp == timestamp));
        assert_eq!(points[0].tags["source"], "battery");
        assert_eq!(points[0].fields["battery_soc"], FieldValue::Float(55.5));
        assert_eq!(points[1].tags["source"], "inverter");
        assert_eq!(points[2].fields["meter_active_power"], FieldValue::Integer(-1200));
        Ok(())
    }

    #[tokio::test]
    async fn columns_ok() -> Result {
        let writer = TelemetryWriter::new(MemoryStore::default(), "sun2000_monitoring".to_owned());
        assert_eq!(writer.columns().await?, HashSet::from(["time".to_owned()]));

        let readings = vec![reading("battery_soc", Source::Battery, Some(Value::Float(55.5)))];
        writer.write_batch(readings, Utc::now()).await?;
        let columns = writer.columns().await?;
        assert!(columns.contains("battery_soc"));
        assert!(columns.contains("source"));
        assert!(!columns.contains("meter_reverse_active_power"));
        Ok(())
    }

    #[tokio::test]
    async fn write_failure_is_propagated() {
        let store = MemoryStore::default();
        store.fail_writes.set(true);
        let writer = TelemetryWriter::new(store, "sun2000_monitoring".to_owned());
        let readings = vec![reading("battery_soc", Source::Battery, Some(Value::Float(1.0)))];
        assert!(writer.write_batch(readings, Utc::now()).await.is_err());
    }
}
