mod register;
mod tcp;
mod value;

pub use self::{
    register::{DataType, Operation, Register},
    tcp::TcpTransport,
    value::Value,
};
use crate::prelude::*;

/// Word-level access to the inverter registers.
pub trait Transport {
    /// Open the session, replacing a dropped one.
    async fn connect(&mut self) -> Result;

    fn is_connected(&self) -> bool;

    /// Drop the session so that the next read reconnects.
    fn disconnect(&mut self);

    /// Read the raw words backing the register.
    ///
    /// Implementations must return exactly [`DataType::num_words`] words.
    async fn read_words(&mut self, register: &Register) -> Result<Vec<u16>>;
}
