use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{
    api::influxdb::{Point, Row, sql},
    prelude::*,
    rollup::{DailyAggregate, RollupError, RollupType, day::LocalDay},
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatteryDaily {
    pub charge_kwh: f64,
    pub discharge_kwh: Option<f64>,
    pub soc_min: Option<f64>,
    pub soc_max: Option<f64>,
    pub soc_avg: Option<f64>,
    pub temperature_max: Option<f64>,
}

impl DailyAggregate for BatteryDaily {
    const ROLLUP_TYPE: RollupType = RollupType::Battery;

    fn query(live_measurement: &str, columns: &HashSet<String>, day: &LocalDay) -> String {
        let charge = sql::column_or_null("battery_total_charge", columns);
        let discharge = sql::column_or_null("battery_total_discharge", columns);
        let soc = sql::column_or_null("battery_soc", columns);
        let temperature = sql::column_or_null("battery_unit1_battery_temperature", columns);
        format!(
            "SELECT \
                MAX({charge}) - MIN({charge}) AS battery_charge_kwh, \
                MAX({discharge}) - MIN({discharge}) AS battery_discharge_kwh, \
                MIN({soc}) AS battery_soc_min, \
                MAX({soc}) AS battery_soc_max, \
                AVG({soc}) AS battery_soc_avg, \
                MAX({temperature}) AS battery_temp_max, \
                COUNT(*) AS samples \
            FROM {} WHERE time >= {} AND time < {}",
            sql::identifier(live_measurement),
            sql::timestamp(day.start),
            sql::timestamp(day.end),
        )
    }

    /// Without the charge delta there was no battery telemetry, the other metrics are optional.
    fn from_row(day: NaiveDate, row: &Row) -> Result<Self> {
        Ok(Self {
            charge_kwh: row
                .get("battery_charge_kwh")
                .as_f64()
                .ok_or(RollupError::MissingSubMetric { day, metric: "battery_charge_kwh" })?,
            discharge_kwh: row.get("battery_discharge_kwh").as_f64(),
            soc_min: row.get("battery_soc_min").as_f64(),
            soc_max: row.get("battery_soc_max").as_f64(),
            soc_avg: row.get("battery_soc_avg").as_f64(),
            temperature_max: row.get("battery_temp_max").as_f64(),
        })
    }

    fn add_fields(&self, point: Point) -> Point {
        point
            .field("battery_charge_kwh", self.charge_kwh)
            .field_opt("battery_discharge_kwh", self.discharge_kwh)
            .field_opt("battery_soc_min", self.soc_min)
            .field_opt("battery_soc_max", self.soc_max)
            .field_opt("battery_soc_avg", self.soc_avg)
            .field_opt("battery_temp_max", self.temperature_max)
    }
}
