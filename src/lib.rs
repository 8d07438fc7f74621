//! Modbus RTU poller
//!
//! Reads coils, discrete inputs, input registers or holding registers from a
//! single Modbus RTU slave on a 9600 8N1 serial line, and either prints the
//! values once or streams them every poll interval to a TCP peer.

pub mod cli;
pub mod config;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use modbus::{DeviceAddress, ModbusClientTrait, ModbusReader, PointType, ReadResult, RtuTransport};
pub use output::{encode, DataFormatter, DataSender, TcpSender};
pub use services::{PollLoop, PollState};
pub use utils::error::ModbusError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
