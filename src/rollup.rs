//! Idempotent daily rollups of the live telemetry.

mod battery;
pub mod day;
mod energy;
mod watermark;

use std::{collections::HashSet, fmt::Debug};

use bon::Builder;
use chrono::NaiveDate;
use chrono_tz::Tz;
use derive_more::Display;

use self::{battery::BatteryDaily, energy::EnergyBreakdown, watermark::Watermarks};
use crate::{
    api::influxdb::{Point, Row, Store, is_not_found},
    prelude::*,
    rollup::day::{LocalDay, days_since},
    telemetry::TelemetryWriter,
};

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum RollupType {
    #[display("energy_breakdown")]
    EnergyBreakdown,

    #[display("battery")]
    Battery,
}

impl RollupType {
    pub const ALL: [Self; 2] = [Self::EnergyBreakdown, Self::Battery];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnergyBreakdown => "energy_breakdown",
            Self::Battery => "battery",
        }
    }

    /// Watermark field name.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::EnergyBreakdown => "rollup_energy_breakdown",
            Self::Battery => "rollup_battery",
        }
    }
}

/// Day-level failures which leave the day unmarked until the next attempt.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    #[error("no samples on {day}")]
    NoData { day: NaiveDate },

    #[error("`{metric}` is missing on {day}")]
    MissingSubMetric { day: NaiveDate, metric: &'static str },
}

/// Aggregate computed by a single query over the local day.
trait DailyAggregate: Debug + Sized {
    const ROLLUP_TYPE: RollupType;

    /// Build the query, which must also return the number of the day's samples as `samples`.
    ///
    /// Columns missing from the live measurement are queried as nulls.
    fn query(live_measurement: &str, columns: &HashSet<String>, day: &LocalDay) -> String;

    fn from_row(day: NaiveDate, row: &Row) -> Result<Self>;

    fn add_fields(&self, point: Point) -> Point;
}

#[derive(Clone, Builder)]
pub struct RollupSettings {
    pub timezone: Tz,

    #[builder(into)]
    daily_measurement: String,

    #[builder(into)]
    watermark_measurement: String,

    energy_breakdown_bootstrap_day: NaiveDate,
    battery_bootstrap_day: NaiveDate,
}

impl RollupSettings {
    /// First day to roll up on a fresh deployment.
    #[must_use]
    pub const fn bootstrap_day(&self, rollup_type: RollupType) -> NaiveDate {
        match rollup_type {
            RollupType::EnergyBreakdown => self.energy_breakdown_bootstrap_day,
            RollupType::Battery => self.battery_bootstrap_day,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Skipped,
    Computed,
}

#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Summary {
    pub rollup_type: RollupType,
    pub n_computed: usize,
    pub n_skipped: usize,
    pub n_failed: usize,
}

impl Summary {
    const fn new(rollup_type: RollupType) -> Self {
        Self { rollup_type, n_computed: 0, n_skipped: 0, n_failed: 0 }
    }
}

/// Stateless: every run re-derives the pending days from the watermarks.
pub struct Engine<'a, S> {
    writer: &'a TelemetryWriter<S>,
    settings: &'a RollupSettings,
}

impl<'a, S: Store> Engine<'a, S> {
    pub const fn new(writer: &'a TelemetryWriter<S>, settings: &'a RollupSettings) -> Self {
        Self { writer, settings }
    }

    fn watermarks(&self) -> Watermarks<'a, S> {
        let settings: &'a RollupSettings = self.settings;
        Watermarks::new(self.writer, &settings.watermark_measurement, settings.timezone)
    }

    /// Roll up every type up to and including yesterday.
    ///
    /// A failing type does not affect the others.
    pub async fn run_all(&self, today: NaiveDate) -> Vec<Summary> {
        let mut summaries = Vec::with_capacity(RollupType::ALL.len());
        for rollup_type in RollupType::ALL {
            match self.run(rollup_type, today).await {
                Ok(summary) => {
                    info!(
                        %rollup_type,
                        n_computed = summary.n_computed,
                        n_skipped = summary.n_skipped,
                        n_failed = summary.n_failed,
                        "done",
                    );
                    summaries.push(summary);
                }
                Err(error) => {
                    error!(%rollup_type, "failed to roll up: {error:#}");
                }
            }
        }
        summaries
    }

    /// Process the pending days oldest first.
    ///
    /// The range starts at the earliest unmarked day since the bootstrap day, so a day which
    /// failed earlier is retried even when later days are already marked. Day failures are logged
    /// and counted, only a failure to resolve the range is returned.
    #[instrument(skip_all, fields(rollup_type = %rollup_type, today = %today))]
    pub async fn run(&self, rollup_type: RollupType, today: NaiveDate) -> Result<Summary> {
        let watermarks = self.watermarks();
        let bootstrap_day = self.settings.bootstrap_day(rollup_type);
        let first_pending = match watermarks.get_last_completed_day(rollup_type).await? {
            Some(last_completed) => {
                let completed = watermarks.completed_days(rollup_type, bootstrap_day).await?;
                let first_pending = bootstrap_day
                    .iter_days()
                    .find(|day| !completed.contains(day))
                    .context("no pending day")?;
                debug!(%last_completed, %first_pending, "resuming…");
                first_pending
            }
            None => {
                info!(%bootstrap_day, "bootstrapping…");
                bootstrap_day
            }
        };
        let latest_complete = today.pred_opt().context("today is out of range")?;

        let mut summary = Summary::new(rollup_type);
        for day in days_since(first_pending, latest_complete) {
            match self.roll_up_day(rollup_type, day).await {
                Ok(Outcome::Computed) => summary.n_computed += 1,
                Ok(Outcome::Skipped) => summary.n_skipped += 1,
                Err(error) => {
                    summary.n_failed += 1;
                    if error.downcast_ref::<RollupError>().is_some() {
                        warn!(%day, "skipping: {error:#}");
                    } else {
                        error!(%day, "failed: {error:#}");
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Compute, write, and mark a single day unless it is already marked.
    #[instrument(skip_all, fields(rollup_type = %rollup_type, day = %day))]
    pub async fn roll_up_day(&self, rollup_type: RollupType, day: NaiveDate) -> Result<Outcome> {
        let watermarks = self.watermarks();
        if watermarks.is_already_rolled_up(rollup_type, day).await? {
            debug!("already rolled up");
            return Ok(Outcome::Skipped);
        }
        let local_day = LocalDay::new(self.settings.timezone, day)?;
        match rollup_type {
            RollupType::EnergyBreakdown => self.compute::<EnergyBreakdown>(&local_day).await?,
            RollupType::Battery => self.compute::<BatteryDaily>(&local_day).await?,
        }
        watermarks.mark_completed(rollup_type, day).await?;
        Ok(Outcome::Computed)
    }

    async fn compute<A: DailyAggregate>(&self, day: &LocalDay) -> Result {
        let columns = self.writer.columns().await?;
        let query = A::query(self.writer.measurement(), &columns, day);
        let rows = match self.writer.query(&query).await {
            Ok(rows) => rows,
            Err(error) if is_not_found(&error) => {
                debug!("the live measurement does not exist yet: {error:#}");
                Vec::new()
            }
            Err(error) => return Err(error.context("failed to query the aggregate")),
        };
        let row = rows
            .first()
            .filter(|row| row.get("samples").as_i64().unwrap_or_default() > 0)
            .ok_or(RollupError::NoData { day: day.day })?;
        let aggregate = A::from_row(day.day, row)?;
        info!(day = %day.day, ?aggregate, "rolled up");
        let point = aggregate.add_fields(
            Point::new(&self.settings.daily_measurement, day.start)
                .tag("rollup", A::ROLLUP_TYPE.as_str()),
        );
        self.writer.write_point(point).await.context("failed to write the aggregate")
    }
}
