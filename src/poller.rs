use crate::{
    api::modbus::{Transport, Value},
    catalog::{CATALOG, MetricDescriptor, Source},
    prelude::*,
};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device is unavailable while reading `{metric}`: {reason}")]
    Unavailable { metric: &'static str, reason: String },

    #[error("not connected to the device: {reason}")]
    NotConnected { reason: String },
}

/// Single catalog entry reading, `None` value means the reading is null.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterReading {
    pub name: &'static str,
    pub source: Source,
    pub unit: Option<&'static str>,
    pub value: Option<Value>,
}

pub struct Poller<T> {
    transport: T,
    catalog: &'static [MetricDescriptor],
}

impl<T: Transport> Poller<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport, catalog: CATALOG }
    }

    /// Check that the device responds at all.
    #[instrument(skip_all)]
    pub async fn ping(&mut self) -> bool {
        if let Err(error) = self.transport.connect().await {
            warn!("device is unreachable: {error:#}");
            return false;
        }
        let Some(metric) = self.catalog.first() else {
            return true;
        };
        match self.transport.read_words(&metric.register).await {
            Ok(_) => true,
            Err(error) => {
                warn!("device does not respond: {error:#}");
                self.transport.disconnect();
                false
            }
        }
    }

    /// Read the entire catalog in order.
    ///
    /// Any transport failure aborts the batch, so that a partial poll never gets written.
    #[instrument(skip_all)]
    pub async fn poll_all(&mut self) -> Result<Vec<RegisterReading>, DeviceError> {
        let mut readings = Vec::with_capacity(self.catalog.len());
        for metric in self.catalog {
            self.ensure_connected().await?;
            let words = match self.transport.read_words(&metric.register).await {
                Ok(words) => words,
                Err(error) => {
                    self.transport.disconnect();
                    return Err(DeviceError::Unavailable {
                        metric: metric.name,
                        reason: format!("{error:#}"),
                    });
                }
            };
            trace!(metric = metric.name, ?words, "read");
            readings.push(RegisterReading {
                name: metric.name,
                source: metric.source,
                unit: metric.unit,
                value: metric.decode(&words),
            });
        }
        debug!(n_readings = readings.len(), "polled");
        Ok(readings)
    }

    async fn ensure_connected(&mut self) -> Result<(), DeviceError> {
        if self.transport.is_connected() {
            return Ok(());
        }
        info!("connecting…");
        self.transport
            .connect()
            .await
            .map_err(|error| DeviceError::NotConnected { reason: format!("{error:#}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::modbus::testing::FakeTransport;

    #[tokio::test]
    async fn poll_all_ok() -> Result {
        let transport = FakeTransport::default()
            .with_words(37760, &[555])
            .with_words(37762, &[2])
            .with_words(37752, &[1200]);
        let mut poller = Poller::new(transport);
        let readings = poller.poll_all().await?;
        assert_eq!(readings.len(), CATALOG.len());
        assert_eq!(poller.transport.n_connects, 1);

        let find = |name| readings.iter().find(|reading| reading.name == name).unwrap();
        assert_eq!(find("battery_soc").value, Some(Value::Float(55.5)));
        assert_eq!(find("battery_soc").source, Source::Battery);
        assert_eq!(find("battery_running_status").value, Some(Value::Text("Running".to_owned())));
        assert_eq!(find("battery_unit1_battery_temperature").value, None);
        assert_eq!(find("active_power").value, Some(Value::Integer(0)));
        Ok(())
    }

    #[tokio::test]
    async fn read_failure_aborts_the_batch() {
        let mut poller = Poller::new(FakeTransport::default().failing_at(32080));
        let error = poller.poll_all().await.unwrap_err();
        assert!(
            matches!(error, DeviceError::Unavailable { metric: "active_power", .. }),
            "{error:?}",
        );
        assert!(!poller.transport.is_connected());
    }

    #[tokio::test]
    async fn reconnects_on_next_poll() -> Result {
        let mut poller = Poller::new(FakeTransport::default().failing_at(32080));
        assert!(poller.poll_all().await.is_err());
        poller.transport.failing_address = None;
        poller.poll_all().await?;
        assert_eq!(poller.transport.n_connects, 2);
        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_is_not_connected() {
        let mut poller = Poller::new(FakeTransport::default().refusing());
        assert!(matches!(poller.poll_all().await, Err(DeviceError::NotConnected { .. })));
        assert!(!poller.ping().await);
    }

    #[tokio::test]
    async fn ping_ok() {
        let mut poller = Poller::new(FakeTransport::default());
        assert!(poller.ping().await);
    }
}
