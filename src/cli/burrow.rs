use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::{
    api::influxdb::Store,
    cli::{influxdb::InfluxDbArgs, inverter::InverterArgs, rollup::RollupArgs},
    prelude::*,
    rollup::{Engine, day::local_day},
    tables::{build_readings_table, build_summaries_table},
};

#[derive(Parser)]
pub struct BurrowArgs {
    #[command(subcommand)]
    command: BurrowCommand,
}

impl BurrowArgs {
    pub async fn run(self) -> Result {
        match self.command {
            BurrowCommand::Registers(args) => args.run().await,
            BurrowCommand::Rollup(args) => args.run().await,
            BurrowCommand::Ping(args) => args.run().await,
        }
    }
}

#[derive(Subcommand)]
enum BurrowCommand {
    /// Poll the inverter once and print the readings.
    Registers(Box<BurrowRegistersArgs>),

    /// Run the daily rollups once, right now.
    Rollup(Box<BurrowRollupArgs>),

    /// Check the store and the inverter connectivity.
    Ping(Box<BurrowPingArgs>),
}

#[derive(Parser)]
struct BurrowRegistersArgs {
    #[clap(flatten)]
    inverter: InverterArgs,
}

impl BurrowRegistersArgs {
    async fn run(self) -> Result {
        let readings = self.inverter.poller().poll_all().await?;
        println!("{}", build_readings_table(&readings));
        Ok(())
    }
}

#[derive(Parser)]
struct BurrowRollupArgs {
    #[clap(flatten)]
    influxdb: InfluxDbArgs,

    #[clap(flatten)]
    rollup: RollupArgs,
}

impl BurrowRollupArgs {
    async fn run(self) -> Result {
        let writer = self.influxdb.writer()?;
        let settings = self.rollup.settings();
        let today = local_day(settings.timezone, Utc::now());
        let summaries = Engine::new(&writer, &settings).run_all(today).await;
        println!("{}", build_summaries_table(&summaries));
        Ok(())
    }
}

#[derive(Parser)]
struct BurrowPingArgs {
    #[clap(flatten)]
    inverter: InverterArgs,

    #[clap(flatten)]
    influxdb: InfluxDbArgs,
}

impl BurrowPingArgs {
    async fn run(self) -> Result {
        let version = self.influxdb.writer()?.store().server_version().await?;
        info!(%version, "store is up");
        ensure!(self.inverter.poller().ping().await, "the inverter is unreachable");
        info!("inverter is up");
        Ok(())
    }
}
