use clap::Parser;
use reqwest::Url;

use crate::{api::influxdb, prelude::*, telemetry::TelemetryWriter};

#[derive(Parser)]
pub struct InfluxDbArgs {
    #[clap(long = "influxdb-url", env = "INFLUXDB_URL")]
    url: Url,

    #[clap(long = "influxdb-token", env = "INFLUXDB_TOKEN", hide_env_values = true)]
    token: String,

    #[clap(
        long = "influxdb-database",
        env = "INFLUXDB_DATABASE",
        default_value = "sun2000_monitoring"
    )]
    database: String,

    /// Measurement for the raw readings.
    #[clap(
        long = "live-measurement",
        env = "LIVE_MEASUREMENT",
        default_value = "sun2000_monitoring"
    )]
    live_measurement: String,
}

impl InfluxDbArgs {
    pub fn writer(&self) -> Result<TelemetryWriter<influxdb::Client>> {
        let client =
            influxdb::Client::new(self.url.clone(), self.database.clone(), self.token.clone())?;
        Ok(TelemetryWriter::new(client, self.live_measurement.clone()))
    }
}
