pub mod influxdb;
pub mod modbus;
