mod burrow;
mod influxdb;
mod inverter;
mod monitor;
mod rollup;

use clap::{Parser, Subcommand};

use crate::cli::{burrow::BurrowArgs, monitor::MonitorArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: poll the inverter, write the readings, and roll them up daily.
    #[clap(name = "monitor")]
    Monitor(Box<MonitorArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn monitor_args_ok() {
        let result = Args::try_parse_from([
            "sun2000-monitor",
            "monitor",
            "--inverter-host=192.168.1.10",
            "--influxdb-url=http://localhost:8181/",
            "--influxdb-token=secret",
            "--timezone=Europe/Amsterdam",
            "--rollup-hour=1",
            "--rollup-minute=5",
            "--energy-breakdown-bootstrap-day=2025-12-20",
            "--battery-bootstrap-day=2025-12-20",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn rollup_hour_is_range_checked() {
        let result = Args::try_parse_from([
            "sun2000-monitor",
            "monitor",
            "--inverter-host=192.168.1.10",
            "--influxdb-url=http://localhost:8181/",
            "--influxdb-token=secret",
            "--timezone=Europe/Amsterdam",
            "--rollup-hour=24",
            "--rollup-minute=5",
            "--energy-breakdown-bootstrap-day=2025-12-20",
            "--battery-bootstrap-day=2025-12-20",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let result = Args::try_parse_from([
            "sun2000-monitor",
            "burrow",
            "rollup",
            "--influxdb-url=http://localhost:8181/",
            "--influxdb-token=secret",
            "--timezone=Mars/Olympus_Mons",
            "--energy-breakdown-bootstrap-day=2025-12-20",
            "--battery-bootstrap-day=2025-12-20",
        ]);
        assert!(result.is_err());
    }
}
