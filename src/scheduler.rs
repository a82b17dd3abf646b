use std::time::Duration;

use bon::Builder;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    api::{influxdb::Store, modbus::Transport},
    poller::Poller,
    prelude::*,
    rollup::{Engine, RollupSettings},
    telemetry::TelemetryWriter,
};

/// The main loop: poll and write on every tick, roll up once a day.
#[derive(Builder)]
pub struct Scheduler<T, S> {
    poller: Poller<T>,
    writer: TelemetryWriter<S>,
    settings: RollupSettings,

    #[builder(into)]
    polling_interval: Duration,

    /// Local time of day to trigger the rollups at, with minute precision.
    rollup_time: NaiveTime,

    /// Roll up on every new minute regardless of the trigger time.
    #[builder(default)]
    force_rollup: bool,

    /// Last local minute (date, hour, minute) the rollups were triggered at.
    #[builder(skip)]
    last_triggered: Option<(NaiveDate, u32, u32)>,
}

impl<T: Transport, S: Store> Scheduler<T, S> {
    /// Log the store version and the device connectivity, the loop retries anyway.
    pub async fn check_health(&mut self) {
        match self.writer.store().server_version().await {
            Ok(version) => info!(%version, "store is up"),
            Err(error) => warn!("store is unreachable: {error:#}"),
        }
        if self.poller.ping().await {
            info!("inverter is up");
        } else {
            warn!("inverter is unreachable");
        }
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(mut self) -> Result {
        self.check_health().await;

        let mut interval = interval(self.polling_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        info!(
            polling_interval = ?self.polling_interval,
            rollup_time = %self.rollup_time,
            "running…",
        );
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(Utc::now()).await,
                result = &mut shutdown => {
                    result?;
                    info!("shutting down…");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Single cycle: device and store failures are logged and never escape.
    #[instrument(skip_all, fields(now = %now))]
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        match self.poller.poll_all().await {
            Ok(readings) => {
                if let Err(error) = self.writer.write_batch(readings, now).await {
                    error!("failed to write the readings: {error:#}");
                }
            }
            Err(error) => {
                error!("failed to poll the device: {error:#}");
            }
        }

        let local_now = now.with_timezone(&self.settings.timezone).naive_local();
        if self.should_roll_up(local_now) {
            info!(today = %local_now.date(), "rolling up…");
            Engine::new(&self.writer, &self.settings).run_all(local_now.date()).await;
        }
    }

    fn should_roll_up(&mut self, local_now: NaiveDateTime) -> bool {
        let is_trigger_minute = local_now.hour() == self.rollup_time.hour()
            && local_now.minute() == self.rollup_time.minute();
        if !self.force_rollup && !is_trigger_minute {
            return false;
        }
        let minute = (local_now.date(), local_now.hour(), local_now.minute());
        if self.last_triggered == Some(minute) {
            debug!("already triggered this minute");
            return false;
        }
        self.last_triggered = Some(minute);
        true
    }
}

async fn shutdown_signal() -> Result {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install the SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Amsterdam;

    use super::*;
    use crate::api::{
        influxdb::{Row, Scalar, testing::MemoryStore},
        modbus::testing::FakeTransport,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
    }

    fn local(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Amsterdam.with_ymd_and_hms(2025, 12, day, hour, minute, second).unwrap().with_timezone(&Utc)
    }

    fn scheduler(
        transport: FakeTransport,
        store: MemoryStore,
    ) -> Scheduler<FakeTransport, MemoryStore> {
        let settings = RollupSettings::builder()
            .timezone(Amsterdam)
            .daily_measurement("sun2000_daily")
            .watermark_measurement("rollup_watermarks")
            .energy_breakdown_bootstrap_day(date(20))
            .battery_bootstrap_day(date(20))
            .build();
        Scheduler::builder()
            .poller(Poller::new(transport))
            .writer(TelemetryWriter::new(store, "sun2000_monitoring".to_owned()))
            .settings(settings)
            .polling_interval(Duration::from_secs(20))
            .rollup_time(NaiveTime::from_hms_opt(1, 0, 0).unwrap())
            .build()
    }

    fn n_rollup_runs(scheduler: &Scheduler<FakeTransport, MemoryStore>) -> usize {
        let queries = scheduler.writer.store().queries.borrow();
        queries.iter().filter(|query| query.contains("last_completed")).count()
    }

    #[tokio::test]
    async fn health_check_is_not_fatal() {
        let mut scheduler = scheduler(FakeTransport::default().refusing(), MemoryStore::default());
        scheduler.check_health().await;
        scheduler.tick(local(22, 12, 0, 0)).await;
        assert!(scheduler.writer.store().points.borrow().is_empty());
    }

    #[tokio::test]
    async fn device_failure_writes_nothing() {
        let mut scheduler =
            scheduler(FakeTransport::default().failing_at(32080), MemoryStore::default());
        scheduler.tick(local(22, 12, 0, 0)).await;
        assert!(scheduler.writer.store().points_of("sun2000_monitoring").is_empty());
    }

    #[tokio::test]
    async fn poll_is_written() {
        let mut scheduler = scheduler(FakeTransport::default(), MemoryStore::default());
        let now = local(22, 12, 0, 0);
        scheduler.tick(now).await;
        let points = scheduler.writer.store().points_of("sun2000_monitoring");
        assert!(!points.is_empty());
        assert!(points.iter().all(|point| point.timestamp == now && point.fields.len() == 1));
    }

    #[tokio::test]
    async fn write_failure_does_not_escape() {
        let store = MemoryStore::default();
        store.fail_writes.set(true);
        let mut scheduler = scheduler(FakeTransport::default(), store);
        scheduler.tick(local(22, 12, 0, 0)).await;
        scheduler.tick(local(22, 12, 0, 20)).await;
        assert!(scheduler.writer.store().points.borrow().is_empty());
    }

    #[tokio::test]
    async fn rollup_triggers_once_per_minute() {
        let row =
            Row::from_iter([("pv_energy", Scalar::Float(1.0)), ("samples", Scalar::Integer(1))]);
        let store = MemoryStore::default().with_aggregate(
            crate::rollup::day::local_midnight(Amsterdam, date(22)).unwrap(),
            row,
        );
        let mut scheduler = scheduler(FakeTransport::default(), store);

        scheduler.tick(local(23, 0, 59, 50)).await;
        assert_eq!(n_rollup_runs(&scheduler), 0);

        scheduler.tick(local(23, 1, 0, 10)).await;
        scheduler.tick(local(23, 1, 0, 30)).await;
        scheduler.tick(local(23, 1, 0, 50)).await;
        scheduler.tick(local(23, 1, 1, 10)).await;
        assert_eq!(n_rollup_runs(&scheduler), 2);

        scheduler.tick(local(24, 1, 0, 0)).await;
        assert_eq!(n_rollup_runs(&scheduler), 4);
    }

    #[tokio::test]
    async fn forced_rollup_ignores_trigger_time() {
        let mut scheduler = scheduler(FakeTransport::default(), MemoryStore::default());
        scheduler.force_rollup = true;
        scheduler.tick(local(23, 15, 42, 0)).await;
        scheduler.tick(local(23, 15, 42, 20)).await;
        assert_eq!(n_rollup_runs(&scheduler), 2);
        scheduler.tick(local(23, 15, 43, 0)).await;
        assert_eq!(n_rollup_runs(&scheduler), 4);
    }
}
