use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{
    api::influxdb::{Point, Row, sql},
    prelude::*,
    rollup::{DailyAggregate, RollupType, day::LocalDay},
};

/// Daily energy flows in kilowatt-hours.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnergyBreakdown {
    /// Produced by the panels.
    pub pv_energy: f64,

    /// Imported from the grid.
    pub house_from_grid: f64,

    /// Exported to the grid.
    pub feed_in: f64,

    /// Consumed directly from the panels.
    pub house_from_pv: f64,
}

impl DailyAggregate for EnergyBreakdown {
    const ROLLUP_TYPE: RollupType = RollupType::EnergyBreakdown;

    fn query(live_measurement: &str, columns: &HashSet<String>, day: &LocalDay) -> String {
        let delta = |field: &str, alias: &str| {
            let field = sql::column_or_null(field, columns);
            format!("MAX({field}) - MIN({field}) AS {alias}")
        };
        format!(
            "SELECT {}, {}, {}, COUNT(*) AS samples FROM {} WHERE time >= {} AND time < {}",
            delta("accumulated_energy_yield", "pv_energy"),
            delta("meter_reverse_active_power", "house_from_grid"),
            delta("meter_positive_active_electricity", "feed_in"),
            sql::identifier(live_measurement),
            sql::timestamp(day.start),
            sql::timestamp(day.end),
        )
    }

    /// Counters without samples contribute zero.
    fn from_row(_day: NaiveDate, row: &Row) -> Result<Self> {
        let pv_energy = row.get("pv_energy").as_f64().unwrap_or_default();
        let house_from_grid = row.get("house_from_grid").as_f64().unwrap_or_default();
        let feed_in = row.get("feed_in").as_f64().unwrap_or_default();
        Ok(Self { pv_energy, house_from_grid, feed_in, house_from_pv: pv_energy - feed_in })
    }

    fn add_fields(&self, point: Point) -> Point {
        point
            .field("pv_energy", self.pv_energy)
            .field("house_from_grid", self.house_from_grid)
            .field("feed_in", self.feed_in)
            .field("house_from_pv", self.house_from_pv)
    }
}
