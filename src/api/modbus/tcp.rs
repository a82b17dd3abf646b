use std::time::Duration;

use itertools::Itertools;
use tokio::{
    net::{TcpStream, lookup_host},
    time::timeout,
};
use tokio_modbus::{
    Slave,
    SlaveId,
    client::{Context as ModbusContext, Reader, tcp::attach_slave},
};

use crate::{
    api::modbus::{Operation, Register, Transport},
    prelude::*,
};

/// Modbus TCP session with the inverter, opened lazily.
pub struct TcpTransport {
    host: String,
    port: u16,
    slave_id: SlaveId,
    context: Option<ModbusContext>,
}

impl TcpTransport {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    pub const fn new(host: String, port: u16, slave_id: SlaveId) -> Self {
        Self { host, port, slave_id, context: None }
    }

    async fn new_tcp_stream(&self) -> Result<TcpStream> {
        info!("connecting…");
        let addresses = lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to resolve `{}`", self.host))?
            .collect_vec();
        let tcp_stream = timeout(Self::CONNECT_TIMEOUT, TcpStream::connect(&*addresses))
            .await
            .context("timed out while connecting to the inverter")?
            .context("failed to connect to the inverter")?;
        tcp_stream.set_nodelay(true)?;
        info!("connected");
        Ok(tcp_stream)
    }
}

impl Transport for TcpTransport {
    #[instrument(skip_all, fields(host = %self.host, port = self.port, slave_id = self.slave_id))]
    async fn connect(&mut self) -> Result {
        self.context = None;
        let tcp_stream = self.new_tcp_stream().await?;
        self.context = Some(attach_slave(tcp_stream, Slave(self.slave_id)));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    fn disconnect(&mut self) {
        if self.context.take().is_some() {
            warn!("dropped the inverter session");
        }
    }

    #[instrument(
        skip_all,
        level = Level::DEBUG,
        fields(address = register.address, data_type = ?register.data_type),
    )]
    async fn read_words(&mut self, register: &Register) -> Result<Vec<u16>> {
        let n_words = register.data_type.num_words();
        let operation = register.operation()?;
        let context = self.context.as_mut().context("the inverter session is not open")?;
        debug!(n_words, "reading…");
        let read = async {
            match operation {
                Operation::Input => context.read_input_registers(register.address, n_words).await,
                Operation::Holding => {
                    context.read_holding_registers(register.address, n_words).await
                }
            }
        };
        let words = timeout(Self::READ_TIMEOUT, read)
            .await
            .context("timeout reading the register")???;
        ensure!(
            words.len() == usize::from(n_words),
            "read {} words while expected {}",
            words.len(),
            n_words,
        );
        Ok(words)
    }
}
