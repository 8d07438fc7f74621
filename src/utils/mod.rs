pub mod error;

pub use error::{ErrorKind, ExceptionCode, ModbusError};
