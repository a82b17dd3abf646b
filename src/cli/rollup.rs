use chrono::NaiveDate;
use chrono_tz::Tz;
use clap::Parser;

use crate::rollup::RollupSettings;

#[derive(Parser)]
pub struct RollupArgs {
    /// IANA timezone of the installation, defines the calendar days.
    #[clap(long, env = "TIMEZONE")]
    timezone: Tz,

    #[clap(long = "daily-measurement", env = "DAILY_MEASUREMENT", default_value = "sun2000_daily")]
    daily_measurement: String,

    #[clap(
        long = "watermark-measurement",
        env = "WATERMARK_MEASUREMENT",
        default_value = "rollup_watermarks"
    )]
    watermark_measurement: String,

    /// First day of the energy breakdown rollup on a fresh database.
    #[clap(long, env = "ENERGY_BREAKDOWN_BOOTSTRAP_DAY")]
    energy_breakdown_bootstrap_day: NaiveDate,

    /// First day of the battery rollup on a fresh database.
    #[clap(long, env = "BATTERY_BOOTSTRAP_DAY")]
    battery_bootstrap_day: NaiveDate,
}

impl RollupArgs {
    pub fn settings(&self) -> RollupSettings {
        RollupSettings::builder()
            .timezone(self.timezone)
            .daily_measurement(&self.daily_measurement)
            .watermark_measurement(&self.watermark_measurement)
            .energy_breakdown_bootstrap_day(self.energy_breakdown_bootstrap_day)
            .battery_bootstrap_day(self.battery_bootstrap_day)
            .build()
    }
}
