//! Static catalog of the polled SUN2000 registers.

use std::ops::RangeInclusive;

use derive_more::Display;

use crate::{
    api::modbus::{DataType, Register, Value},
    prelude::*,
};

/// Device part the metric comes from, written as the `source` tag.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum Source {
    #[display("inverter")]
    Inverter,

    #[display("battery")]
    Battery,

    #[display("meter")]
    Meter,
}

#[derive(Copy, Clone)]
pub enum Decode {
    /// Scaled number or text as is.
    Raw,

    /// Enumeration or status code mapped to a label.
    Formatted(fn(i64) -> &'static str),
}

pub struct MetricDescriptor {
    pub name: &'static str,
    pub source: Source,
    pub register: Register,
    pub unit: Option<&'static str>,
    pub decode: Decode,

    /// Values outside of the range are physically implausible and get discarded.
    pub plausible: Option<RangeInclusive<f64>>,
}

impl MetricDescriptor {
    const fn new(name: &'static str, source: Source, register: Register) -> Self {
        Self { name, source, register, unit: None, decode: Decode::Raw, plausible: None }
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    const fn formatted(mut self, format: fn(i64) -> &'static str) -> Self {
        self.decode = Decode::Formatted(format);
        self
    }

    const fn plausible(mut self, range: RangeInclusive<f64>) -> Self {
        self.plausible = Some(range);
        self
    }

    /// Decode the register words, `None` when the value cannot be trusted.
    ///
    /// Anomalies are logged and never fail the batch.
    pub fn decode(&self, words: &[u16]) -> Option<Value> {
        let value = match self.register.decode(words) {
            Ok(value) => value,
            Err(error) => {
                warn!(metric = self.name, "failed to decode: {error:#}");
                return None;
            }
        };
        let value = match (self.decode, value) {
            (Decode::Raw, value) => value,
            (Decode::Formatted(format), Value::Integer(code)) => {
                Value::Text(format(code).to_owned())
            }
            (Decode::Formatted(_), value) => {
                warn!(metric = self.name, ?value, "only integers can be formatted");
                return None;
            }
        };
        if let (Some(range), Some(number)) = (&self.plausible, value.as_f64())
            && !range.contains(&number)
        {
            warn!(metric = self.name, number, ?range, "implausible reading, discarding");
            return None;
        }
        Some(value)
    }
}

const fn inverter(name: &'static str, register: Register) -> MetricDescriptor {
    MetricDescriptor::new(name, Source::Inverter, register)
}

const fn battery(name: &'static str, register: Register) -> MetricDescriptor {
    MetricDescriptor::new(name, Source::Battery, register)
}

const fn meter(name: &'static str, register: Register) -> MetricDescriptor {
    MetricDescriptor::new(name, Source::Meter, register)
}

const fn u16_(address: u16) -> Register {
    Register::new(address, DataType::U16)
}

const fn i16_(address: u16) -> Register {
    Register::new(address, DataType::I16)
}

const fn u32_(address: u16) -> Register {
    Register::new(address, DataType::U32)
}

const fn i32_(address: u16) -> Register {
    Register::new(address, DataType::I32)
}

const fn text(address: u16, n_words: u16) -> Register {
    Register::new(address, DataType::Text(n_words))
}

/// Polled metrics in the polling order.
#[rustfmt::skip]
pub static CATALOG: &[MetricDescriptor] = &[
    inverter("model", text(30000, 15)),
    inverter("sn", text(30015, 10)),
    inverter("firmware_version", text(30035, 15)),
    inverter("software_version", text(30050, 15)),
    inverter("rated_power", u32_(30073)).unit("W"),
    inverter("maximum_active_power", u32_(30075)).unit("W"),
    inverter("maximum_apparent_power", u32_(30077).with_gain(1000)).unit("kVA"),
    inverter("state1", u16_(32000)).formatted(format_state1),
    inverter("state2", u16_(32002)),
    inverter("state3", u32_(32003)),
    inverter("peak_active_power_of_current_day", i32_(32078)).unit("W"),
    inverter("active_power", i32_(32080)).unit("W"),
    inverter("reactive_power", i32_(32082).with_gain(1000)).unit("kvar"),
    inverter("power_factor", i16_(32084).with_gain(1000)),
    inverter("grid_frequency", u16_(32085).with_gain(100)).unit("Hz"),
    inverter("efficiency", u16_(32086).with_gain(100)).unit("%"),
    inverter("internal_temperature", i16_(32087).with_gain(10)).unit("°C"),
    inverter("device_status", u16_(32089)).formatted(format_device_status),
    inverter("accumulated_energy_yield", u32_(32106).with_gain(100)).unit("kWh"),
    inverter("daily_energy_yield", u32_(32114).with_gain(100)).unit("kWh"),

    battery("battery_running_status", u16_(37762)).formatted(format_battery_running_status),
    battery("battery_working_mode_settings", u16_(47086)).formatted(format_battery_working_mode),
    battery("battery_charge_discharge_power", i32_(37765)).unit("W"),
    battery("battery_rated_capacity", u32_(37758)).unit("Wh"),
    battery("battery_soc", u16_(37760).with_gain(10)).unit("%"),
    battery("battery_backup_power_soc", u16_(47102).with_gain(10)).unit("%"),
    battery("battery_unit1_battery_temperature", i16_(37752).with_gain(10))
        .unit("°C")
        .plausible(-40.0..=100.0),
    battery("battery_total_charge", u32_(37780).with_gain(100)).unit("kWh"),
    battery("battery_total_discharge", u32_(37782).with_gain(100)).unit("kWh"),
    battery("battery_current_day_charge_capacity", u32_(37784).with_gain(100)).unit("kWh"),
    battery("battery_current_day_discharge_capacity", u32_(37786).with_gain(100)).unit("kWh"),

    meter("meter_status", u16_(37100)).formatted(format_meter_status),
    meter("meter_a_phase_voltage", i32_(37101).with_gain(10)).unit("V"),
    meter("meter_b_phase_voltage", i32_(37103).with_gain(10)).unit("V"),
    meter("meter_c_phase_voltage", i32_(37105).with_gain(10)).unit("V"),
    meter("meter_a_phase_current", i32_(37107).with_gain(100)).unit("A"),
    meter("meter_b_phase_current", i32_(37109).with_gain(100)).unit("A"),
    meter("meter_c_phase_current", i32_(37111).with_gain(100)).unit("A"),
    // Positive when feeding into the grid, negative when supplied from it:
    meter("meter_active_power", i32_(37113)).unit("W"),
    meter("meter_reactive_power", i32_(37115)).unit("var"),
    meter("meter_power_factor", i16_(37117).with_gain(1000)),
    meter("meter_grid_frequency", i16_(37118).with_gain(100)).unit("Hz"),
    // Energy fed by the inverter to the grid:
    meter("meter_positive_active_electricity", i32_(37119).with_gain(100)).unit("kWh"),
    // Energy supplied from the grid:
    meter("meter_reverse_active_power", i32_(37121).with_gain(100)).unit("kWh"),
    meter("meter_meter_type", u16_(37125)).formatted(format_meter_type),
    meter("meter_a_phase_active_power", i32_(37132)).unit("W"),
    meter("meter_b_phase_active_power", i32_(37134)).unit("W"),
    meter("meter_c_phase_active_power", i32_(37136)).unit("W"),
];

/// Highest known set bit wins.
fn format_state1(bits: i64) -> &'static str {
    const LABELS: [&str; 10] = [
        "Standby",
        "Grid connected",
        "Grid connected",
        "Grid connection with derating due to power rationing",
        "Grid connection with derating due to internal causes of the solar inverter",
        "Normal stop",
        "Stop due to faults",
        "Stop due to power rationing",
        "Shutdown",
        "Spot check",
    ];
    LABELS
        .iter()
        .enumerate()
        .rev()
        .find(|(bit, _)| bits & (1 << bit) != 0)
        .map_or("Unknown", |(_, label)| label)
}

fn format_device_status(code: i64) -> &'static str {
    match code {
        0x0000 => "Standby: initializing",
        0x0001 => "Standby: detecting insulation resistance",
        0x0002 => "Standby: detecting irradiation",
        0x0003 => "Standby: grid detecting",
        0x0100 => "Starting",
        0x0200 => "On-grid",
        0x0201 => "Grid connection: power limited",
        0x0202 => "Grid connection: self-derating",
        0x0203 => "Off-grid running",
        0x0300 => "Shutdown: fault",
        0x0301 => "Shutdown: command",
        0x0302 => "Shutdown: OVGR",
        0x0303 => "Shutdown: communication disconnected",
        0x0304 => "Shutdown: power limited",
        0x0305 => "Shutdown: manual startup required",
        0x0306 => "Shutdown: DC switches disconnected",
        0x0307 => "Shutdown: rapid cutoff",
        0x0308 => "Shutdown: input underpowered",
        0x0401 => "Grid scheduling: cosphi-P curve",
        0x0402 => "Grid scheduling: Q-U curve",
        0x0403 => "Grid scheduling: PF-U curve",
        0x0404 => "Grid scheduling: dry contact",
        0x0405 => "Grid scheduling: Q-P curve",
        0x0500 => "Spot-check ready",
        0x0501 => "Spot-checking",
        0x0600 => "Inspecting",
        0x0700 => "AFCI self check",
        0x0800 => "I-V scanning",
        0x0900 => "DC input detection",
        0x0A00 => "Running: off-grid charging",
        0xA000 => "Standby: no irradiation",
        _ => "Unknown",
    }
}

fn format_battery_running_status(code: i64) -> &'static str {
    match code {
        0 => "Offline",
        1 => "Standby",
        2 => "Running",
        3 => "Fault",
        4 => "Sleep mode",
        _ => "Unknown",
    }
}

fn format_battery_working_mode(code: i64) -> &'static str {
    match code {
        0 => "Adaptive",
        1 => "Fixed charge/discharge",
        2 => "Maximise self consumption",
        3 => "Time of use (LG)",
        4 => "Fully fed to grid",
        5 => "Time of use (LUNA2000)",
        _ => "Unknown",
    }
}

fn format_meter_status(code: i64) -> &'static str {
    match code {
        0 => "Offline",
        1 => "Normal",
        _ => "Unknown",
    }
}

fn format_meter_type(code: i64) -> &'static str {
    match code {
        0 => "Single phase",
        1 => "Three phase",
        _ => "Unknown",
    }
}
