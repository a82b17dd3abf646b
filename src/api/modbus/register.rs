use tokio_modbus::Address;

use crate::{api::modbus::Value, prelude::*};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Input,
    Holding,
}

impl TryFrom<Address> for Operation {
    type Error = Error;

    fn try_from(address: Address) -> std::result::Result<Self, Self::Error> {
        match address {
            30000..=39999 => Ok(Self::Input),
            40000..=49999 => Ok(Self::Holding),
            _ => bail!("cannot determine register #{address} type"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataType {
    U16,
    I16,
    U32,
    I32,

    /// NUL-padded ASCII string of the specified number of words.
    Text(u16),
}

impl DataType {
    pub const fn num_words(self) -> u16 {
        match self {
            Self::U16 | Self::I16 => 1,
            Self::U32 | Self::I32 => 2,
            Self::Text(n_words) => n_words,
        }
    }
}

/// Register address with the data layout.
#[derive(Copy, Clone, Debug)]
pub struct Register {
    pub address: Address,
    pub data_type: DataType,

    /// Raw integer is divided by the gain to get the value in the engineering unit.
    pub gain: u16,
}

impl Register {
    pub const fn new(address: Address, data_type: DataType) -> Self {
        Self { address, data_type, gain: 1 }
    }

    pub const fn with_gain(mut self, gain: u16) -> Self {
        self.gain = gain;
        self
    }

    pub fn operation(&self) -> Result<Operation> {
        Operation::try_from(self.address)
    }

    /// Convert the raw words to the target value, applying the gain to numbers.
    pub fn decode(&self, words: &[u16]) -> Result<Value> {
        ensure!(
            words.len() == usize::from(self.data_type.num_words()),
            "register #{} returned {} words while expected {}",
            self.address,
            words.len(),
            self.data_type.num_words(),
        );
        let raw = match self.data_type {
            DataType::U16 => i64::from(words[0]),
            #[expect(clippy::cast_possible_wrap)]
            DataType::I16 => i64::from(words[0] as i16),
            DataType::U32 => i64::from(u32::from(words[0]) << 16 | u32::from(words[1])),
            #[expect(clippy::cast_possible_wrap)]
            DataType::I32 => i64::from((u32::from(words[0]) << 16 | u32::from(words[1])) as i32),
            DataType::Text(_) => return Self::decode_text(words),
        };
        if self.gain == 1 {
            return Ok(Value::Integer(raw));
        }
        #[expect(clippy::cast_precision_loss)]
        let value = raw as f64 / f64::from(self.gain);
        Ok(Value::Float(value))
    }

    fn decode_text(words: &[u16]) -> Result<Value> {
        let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
        let text = String::from_utf8(bytes).context("the register contains a non-UTF-8 string")?;
        Ok(Value::Text(text.trim_end_matches('\0').trim().to_owned()))
    }
}
