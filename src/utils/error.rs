use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Cannot access {path}: {reason}")]
    LinkError { path: String, reason: String },

    #[error("Invalid slave ID {0}")]
    InvalidSlave(i64),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid Modbus point type {0}")]
    InvalidPointType(i64),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("CRC checksum mismatch (received 0x{received:04x}, calculated 0x{calculated:04x})")]
    CrcError { received: u16, calculated: u16 },

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("Slave exception on function 0x{function:02x}: {exception}")]
    Exception { function: u8, exception: ExceptionCode },

    #[error("Connection timed out")]
    Timeout,

    #[error("Serial link lost: {0}")]
    LinkLost(String),

    #[error("Send error: {0}")]
    SendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification carried into [`crate::modbus::ErrorOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Link,
    InvalidSlave,
    Connect,
    InvalidPointType,
    Read,
    Send,
    Config,
}

impl ModbusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModbusError::LinkError { .. } | ModbusError::LinkLost(_) => ErrorKind::Link,
            ModbusError::InvalidSlave(_) => ErrorKind::InvalidSlave,
            ModbusError::ConnectionError(_) => ErrorKind::Connect,
            ModbusError::InvalidPointType(_) => ErrorKind::InvalidPointType,
            ModbusError::CommunicationError(_)
            | ModbusError::CrcError { .. }
            | ModbusError::InvalidResponse(_)
            | ModbusError::Exception { .. }
            | ModbusError::Timeout => ErrorKind::Read,
            ModbusError::SendError(_) => ErrorKind::Send,
            ModbusError::ConfigError(_)
            | ModbusError::SerializationError(_) => ErrorKind::Config,
        }
    }

    /// Whether the poll loop may carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Read | ErrorKind::Send)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Link => "link",
            ErrorKind::InvalidSlave => "invalid_slave",
            ErrorKind::Connect => "connect",
            ErrorKind::InvalidPointType => "invalid_point_type",
            ErrorKind::Read => "read",
            ErrorKind::Send => "send",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Modbus exception codes a slave may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailed,
    Unknown(u8),
}

impl From<u8> for ExceptionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ExceptionCode::IllegalFunction,
            0x02 => ExceptionCode::IllegalDataAddress,
            0x03 => ExceptionCode::IllegalDataValue,
            0x04 => ExceptionCode::SlaveDeviceFailure,
            0x05 => ExceptionCode::Acknowledge,
            0x06 => ExceptionCode::SlaveDeviceBusy,
            0x08 => ExceptionCode::MemoryParityError,
            0x0A => ExceptionCode::GatewayPathUnavailable,
            0x0B => ExceptionCode::GatewayTargetFailed,
            other => ExceptionCode::Unknown(other),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => f.write_str("Illegal function"),
            ExceptionCode::IllegalDataAddress => f.write_str("Illegal data address"),
            ExceptionCode::IllegalDataValue => f.write_str("Illegal data value"),
            ExceptionCode::SlaveDeviceFailure => f.write_str("Slave device or server failure"),
            ExceptionCode::Acknowledge => f.write_str("Acknowledge"),
            ExceptionCode::SlaveDeviceBusy => f.write_str("Slave device or server is busy"),
            ExceptionCode::MemoryParityError => f.write_str("Memory parity error"),
            ExceptionCode::GatewayPathUnavailable => f.write_str("Gateway path unavailable"),
            ExceptionCode::GatewayTargetFailed => f.write_str("Target device failed to respond"),
            ExceptionCode::Unknown(code) => write!(f, "Unknown exception 0x{:02x}", code),
        }
    }
}

impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        ModbusError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for ModbusError {
    fn from(err: toml::de::Error) -> Self {
        ModbusError::ConfigError(format!("TOML error: {}", err))
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ModbusError::Timeout
    }
}
