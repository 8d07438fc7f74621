pub mod client;
pub mod crc;
pub mod protocol;
pub mod reader;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{ModbusClientTrait, RtuTransport, SerialSettings};
pub use crc::crc16_modbus;
pub use protocol::{DeviceAddress, FunctionCode, ModbusRequest, PointType};
pub use reader::{ErrorOutcome, ModbusReader, ReadResult};
