use clap::Parser;
use tokio_modbus::SlaveId;

use crate::{api::modbus::TcpTransport, poller::Poller};

#[derive(Parser)]
pub struct InverterArgs {
    #[clap(long = "inverter-host", env = "INVERTER_HOST")]
    host: String,

    /// Modbus TCP port, older dongles listen on 502.
    #[clap(long = "inverter-port", env = "INVERTER_PORT", default_value = "6607")]
    port: u16,

    #[clap(long = "inverter-slave-id", env = "INVERTER_SLAVE_ID", default_value = "1")]
    slave_id: SlaveId,
}

impl InverterArgs {
    /// The session is opened on the first poll.
    pub fn poller(&self) -> Poller<TcpTransport> {
        Poller::new(TcpTransport::new(self.host.clone(), self.port, self.slave_id))
    }
}
