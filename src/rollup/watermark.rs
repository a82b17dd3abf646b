use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

use crate::{
    api::influxdb::{Point, Store, is_not_found, sql},
    prelude::*,
    rollup::{
        RollupType,
        day::{local_day, local_midnight},
    },
    telemetry::TelemetryWriter,
};

/// Completed days per rollup type, kept as points in a dedicated measurement.
///
/// Each point sits at the local midnight of the completed day, and its `rollup_<type>` field holds
/// the same instant as Unix seconds.
pub struct Watermarks<'a, S> {
    writer: &'a TelemetryWriter<S>,
    measurement: &'a str,
    timezone: Tz,
}

impl<'a, S: Store> Watermarks<'a, S> {
    pub const fn new(writer: &'a TelemetryWriter<S>, measurement: &'a str, timezone: Tz) -> Self {
        Self { writer, measurement, timezone }
    }

    /// Latest completed day, `None` when the type has never been rolled up.
    #[instrument(skip_all, fields(rollup_type = %rollup_type))]
    pub async fn get_last_completed_day(
        &self,
        rollup_type: RollupType,
    ) -> Result<Option<NaiveDate>> {
        let query = format!(
            "SELECT MAX({}) AS last_completed FROM {}",
            sql::identifier(rollup_type.field_name()),
            sql::identifier(self.measurement),
        );
        let rows = match self.writer.query(&query).await {
            Ok(rows) => rows,
            Err(error) if is_not_found(&error) => {
                debug!("no watermark yet");
                return Ok(None);
            }
            Err(error) => return Err(error.context("failed to query the watermark")),
        };
        let Some(seconds) = rows.first().and_then(|row| row.get("last_completed").as_i64()) else {
            return Ok(None);
        };
        let day = self.decode(seconds)?;
        debug!(%day, "last completed");
        Ok(Some(day))
    }

    /// Completed days since the given day inclusive.
    #[instrument(skip_all, fields(rollup_type = %rollup_type, since = %since))]
    pub async fn completed_days(
        &self,
        rollup_type: RollupType,
        since: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        let field = rollup_type.field_name();
        let query = format!(
            "SELECT {} AS completed FROM {} WHERE time >= {}",
            sql::identifier(field),
            sql::identifier(self.measurement),
            sql::timestamp(local_midnight(self.timezone, since)?),
        );
        let rows = match self.writer.query(&query).await {
            Ok(rows) => rows,
            Err(error) if is_not_found(&error) => return Ok(BTreeSet::new()),
            Err(error) => return Err(error.context("failed to query the watermarks")),
        };
        rows.iter()
            .filter_map(|row| row.get("completed").as_i64())
            .map(|seconds| self.decode(seconds))
            .collect()
    }

    /// Check whether a watermark exists for exactly this local day.
    #[instrument(skip_all, fields(rollup_type = %rollup_type, day = %day))]
    pub async fn is_already_rolled_up(
        &self,
        rollup_type: RollupType,
        day: NaiveDate,
    ) -> Result<bool> {
        let field = rollup_type.field_name();
        let query = format!(
            "SELECT {} FROM {} WHERE time = {}",
            sql::identifier(field),
            sql::identifier(self.measurement),
            sql::timestamp(local_midnight(self.timezone, day)?),
        );
        let rows = match self.writer.query(&query).await {
            Ok(rows) => rows,
            Err(error) if is_not_found(&error) => return Ok(false),
            Err(error) => return Err(error.context("failed to query the watermark")),
        };
        for seconds in rows.iter().filter_map(|row| row.get(field).as_i64()) {
            if self.decode(seconds)? == day {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip_all, fields(rollup_type = %rollup_type, day = %day))]
    pub async fn mark_completed(&self, rollup_type: RollupType, day: NaiveDate) -> Result {
        let midnight = local_midnight(self.timezone, day)?;
        let point = Point::new(self.measurement, midnight)
            .field(rollup_type.field_name(), midnight.timestamp());
        self.writer.write_point(point).await.context("failed to mark the day completed")?;
        debug!("marked");
        Ok(())
    }

    fn decode(&self, seconds: i64) -> Result<NaiveDate> {
        let instant = DateTime::from_timestamp(seconds, 0)
            .with_context(|| format!("watermark `{seconds}` is out of range"))?;
        Ok(local_day(self.timezone, instant))
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe::Amsterdam;

    use super::*;
    use crate::api::influxdb::{FieldValue, testing::MemoryStore};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn writer() -> TelemetryWriter<MemoryStore> {
        TelemetryWriter::new(MemoryStore::default(), "sun2000_monitoring".to_owned())
    }

    #[tokio::test]
    async fn fresh_store_has_no_watermark() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        assert_eq!(watermarks.get_last_completed_day(RollupType::Battery).await?, None);
        assert!(!watermarks.is_already_rolled_up(RollupType::Battery, date(20)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn mark_completed_ok() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        watermarks.mark_completed(RollupType::EnergyBreakdown, date(20)).await?;
        watermarks.mark_completed(RollupType::EnergyBreakdown, date(21)).await?;

        let points = writer.store().points_of("rollup_watermarks");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, DateTime::parse_from_rfc3339("2025-12-19T23:00:00Z")?);
        assert_eq!(
            points[0].fields["rollup_energy_breakdown"],
            FieldValue::Integer(points[0].timestamp.timestamp()),
        );

        assert_eq!(
            watermarks.get_last_completed_day(RollupType::EnergyBreakdown).await?,
            Some(date(21)),
        );
        assert!(watermarks.is_already_rolled_up(RollupType::EnergyBreakdown, date(20)).await?);
        assert!(watermarks.is_already_rolled_up(RollupType::EnergyBreakdown, date(21)).await?);
        assert!(!watermarks.is_already_rolled_up(RollupType::EnergyBreakdown, date(22)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn watermark_of_another_day_does_not_count() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        let previous_midnight = local_midnight(Amsterdam, date(19))?;
        writer
            .write_point(
                Point::new("rollup_watermarks", local_midnight(Amsterdam, date(20))?)
                    .field("rollup_battery", previous_midnight.timestamp()),
            )
            .await?;
        assert!(!watermarks.is_already_rolled_up(RollupType::Battery, date(20)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn completed_days_ok() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        assert!(watermarks.completed_days(RollupType::Battery, date(20)).await?.is_empty());

        for day in [19, 20, 22] {
            watermarks.mark_completed(RollupType::Battery, date(day)).await?;
        }
        watermarks.mark_completed(RollupType::EnergyBreakdown, date(21)).await?;
        let completed = watermarks.completed_days(RollupType::Battery, date(20)).await?;
        assert_eq!(completed.into_iter().collect::<Vec<_>>(), [date(20), date(22)]);
        Ok(())
    }

    #[tokio::test]
    async fn types_are_tracked_independently() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        watermarks.mark_completed(RollupType::EnergyBreakdown, date(20)).await?;
        assert_eq!(watermarks.get_last_completed_day(RollupType::Battery).await?, None);
        assert!(!watermarks.is_already_rolled_up(RollupType::Battery, date(20)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn queries_quote_identifiers() -> Result {
        let writer = writer();
        let watermarks = Watermarks::new(&writer, "rollup_watermarks", Amsterdam);
        watermarks.is_already_rolled_up(RollupType::Battery, date(20)).await?;
        assert_eq!(
            writer.store().queries.borrow().last().unwrap(),
            r#"SELECT "rollup_battery" FROM "rollup_watermarks" WHERE time = TIMESTAMP '2025-12-19T23:00:00Z'"#,
        );
        Ok(())
    }
}
