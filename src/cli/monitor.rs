use chrono::NaiveTime;
use clap::Parser;

use crate::{
    cli::{influxdb::InfluxDbArgs, inverter::InverterArgs, rollup::RollupArgs},
    prelude::*,
    scheduler::Scheduler,
};

#[derive(Parser)]
pub struct MonitorArgs {
    #[clap(long, env = "POLLING_INTERVAL", default_value = "60s")]
    polling_interval: humantime::Duration,

    /// Local hour to run the daily rollups at.
    #[clap(long, env = "ROLLUP_HOUR", value_parser = clap::value_parser!(u32).range(0..24))]
    rollup_hour: u32,

    #[clap(long, env = "ROLLUP_MINUTE", value_parser = clap::value_parser!(u32).range(0..60))]
    rollup_minute: u32,

    /// Run the rollups on every minute instead of the configured time.
    #[clap(long, env = "FORCE_ROLLUP")]
    force_rollup: bool,

    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    influxdb: InfluxDbArgs,

    #[clap(flatten)]
    rollup: RollupArgs,
}

impl MonitorArgs {
    pub async fn run(self) -> Result {
        let rollup_time = NaiveTime::from_hms_opt(self.rollup_hour, self.rollup_minute, 0)
            .context("invalid rollup time")?;
        if self.force_rollup {
            warn!("the rollups are forced on every minute");
        }
        Scheduler::builder()
            .poller(self.inverter.poller())
            .writer(self.influxdb.writer()?)
            .settings(self.rollup.settings())
            .polling_interval(self.polling_interval)
            .rollup_time(rollup_time)
            .force_rollup(self.force_rollup)
            .build()
            .run()
            .await
    }
}
