use async_trait::async_trait;
use log::{debug, error, info, warn};
use serialport::{ClearBuffer, SerialPort};
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::time::Duration;

use super::protocol::{
    unpack_bits, unpack_registers, validate_slave_id, FunctionCode, ModbusRequest,
};
use crate::utils::error::ModbusError;

pub const BAUD_RATE: u32 = 9600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Read side of a Modbus master bound to one slave.
#[async_trait]
pub trait ModbusClientTrait: Send {
    async fn read_coils(&mut self, start_addr: u16, count: u16) -> Result<Vec<bool>, ModbusError>;

    async fn read_discrete_inputs(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<bool>, ModbusError>;

    async fn read_input_registers(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError>;

    async fn read_holding_registers(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError>;

    /// Releases the underlying handle. Calling it again is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Byte stream an RTU transport runs over.
pub trait LineIo: Read + Write + Send {
    /// Drops whatever is waiting in the receive buffer.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LineIo for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub timeout: Duration,
}

impl SerialSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Opens the device node read/write and releases it again, so a missing
/// device or a permission problem is reported before any protocol setup.
/// The tty never becomes the controlling terminal of the process.
pub fn check_serial_port(path: &str) -> Result<(), ModbusError> {
    info!("🔍 Checking serial port: {}", path);
    let mut options = OpenOptions::new();
    options.read(true).write(true);
    #[cfg(unix)]
    options.custom_flags(libc::O_NOCTTY);

    options
        .open(path)
        .map(drop)
        .map_err(|e| {
            error!("❌ Cannot access {}: {}", path, e);
            ModbusError::LinkError {
                path: path.to_string(),
                reason: e.to_string(),
            }
        })
}

/// Modbus RTU master over a serial line, 9600 baud 8N1.
pub struct RtuTransport<L: LineIo = Box<dyn SerialPort>> {
    settings: SerialSettings,
    slave_id: Option<u8>,
    line: Option<L>,
}

impl<L: LineIo> RtuTransport<L> {
    /// Verifies the device node is accessible. The line itself is opened by
    /// `connect`.
    pub fn open(settings: SerialSettings) -> Result<Self, ModbusError> {
        check_serial_port(&settings.path)?;
        Ok(Self {
            settings,
            slave_id: None,
            line: None,
        })
    }

    /// Wraps an already open line, e.g. a simulated slave.
    pub fn with_line(settings: SerialSettings, slave_id: i64, line: L) -> Result<Self, ModbusError> {
        let slave_id = validate_slave_id(slave_id)?;
        Ok(Self {
            settings,
            slave_id: Some(slave_id),
            line: Some(line),
        })
    }

    pub fn bind_slave(&mut self, slave_id: i64) -> Result<(), ModbusError> {
        let slave_id = validate_slave_id(slave_id).map_err(|e| {
            error!("❌ Invalid slave ID {}", slave_id);
            e
        })?;
        self.slave_id = Some(slave_id);
        Ok(())
    }

    pub fn slave_id(&self) -> Option<u8> {
        self.slave_id
    }

    #[cfg(test)]
    pub(crate) fn line_mut(&mut self) -> Option<&mut L> {
        self.line.as_mut()
    }

    fn transact(
        &mut self,
        function: FunctionCode,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u8>, ModbusError> {
        let slave_id = self
            .slave_id
            .ok_or_else(|| ModbusError::ConfigError("no slave bound to the transport".into()))?;
        let line = self
            .line
            .as_mut()
            .ok_or_else(|| ModbusError::LinkLost(format!("{} is not open", self.settings.path)))?;

        let request = ModbusRequest {
            slave_id,
            function,
            start_address: start_addr,
            quantity: count,
        };
        let frame = request.to_frame();
        debug!("📤 [{:02x}] TX {}", slave_id, hex::encode(&frame));

        let result = exchange(line, &request, &frame);
        if result.is_err() {
            if let Err(e) = line.discard_input() {
                warn!("⚠️ Failed to flush serial input: {}", e);
            }
        }
        result
    }
}

impl RtuTransport<Box<dyn SerialPort>> {
    pub fn connect(&mut self) -> Result<(), ModbusError> {
        let path = &self.settings.path;
        info!("🔌 Connecting to Modbus RTU port: {}", path);
        info!("⚙️  Configuration: {} baud, no parity, 8 data bits, 1 stop bit", BAUD_RATE);

        let mut port = serialport::new(path, BAUD_RATE)
            .timeout(self.settings.timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                error!("❌ Modbus connection failed on {}: {}", path, e);
                ModbusError::ConnectionError(format!("Failed to open port {}: {}", path, e))
            })?;

        if let Err(e) = port.clear(ClearBuffer::All) {
            warn!("⚠️ Could not clear stale serial buffers: {}", e);
        }

        self.line = Some(port);
        info!("✅ Modbus RTU connection established");
        Ok(())
    }

    /// Check, bind and connect in one go.
    pub fn establish(settings: SerialSettings, slave_id: i64) -> Result<Self, ModbusError> {
        let mut transport = Self::open(settings)?;
        transport.bind_slave(slave_id)?;
        transport.connect()?;
        Ok(transport)
    }
}

impl<L: LineIo> Drop for RtuTransport<L> {
    fn drop(&mut self) {
        self.close();
    }
}

fn exchange<L: LineIo>(
    line: &mut L,
    request: &ModbusRequest,
    frame: &[u8],
) -> Result<Vec<u8>, ModbusError> {
    line.write_all(frame).map_err(|e| io_failure("Write failed", e))?;
    line.flush().map_err(|e| io_failure("Flush failed", e))?;

    // slave, function, byte count or exception code
    let mut adu = vec![0u8; 3];
    line.read_exact(&mut adu)
        .map_err(|e| io_failure("Read failed", e))?;

    // never trust the announced byte count for how much to read
    let header_len = adu.len();
    let total = if adu[1] & 0x80 != 0 {
        header_len + 2
    } else {
        request.expected_response_len()
    };
    adu.resize(total, 0);
    line.read_exact(&mut adu[header_len..])
        .map_err(|e| io_failure("Read failed", e))?;

    debug!("📥 [{:02x}] RX {}", request.slave_id, hex::encode(&adu));

    request.parse_response(&adu).map(<[u8]>::to_vec)
}

fn io_failure(context: &str, err: io::Error) -> ModbusError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ModbusError::Timeout,
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied => {
            ModbusError::LinkLost(format!("{}: {}", context, err))
        }
        // EIO, ENXIO, ENODEV: the tty vanished (USB adapter unplugged)
        _ if matches!(err.raw_os_error(), Some(5) | Some(6) | Some(19)) => {
            ModbusError::LinkLost(format!("{}: {}", context, err))
        }
        _ => ModbusError::CommunicationError(format!("{}: {}", context, err)),
    }
}

#[async_trait]
impl<L: LineIo> ModbusClientTrait for RtuTransport<L> {
    async fn read_coils(&mut self, start_addr: u16, count: u16) -> Result<Vec<bool>, ModbusError> {
        let data = self.transact(FunctionCode::ReadCoils, start_addr, count)?;
        Ok(unpack_bits(&data, count))
    }

    async fn read_discrete_inputs(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<bool>, ModbusError> {
        let data = self.transact(FunctionCode::ReadDiscreteInputs, start_addr, count)?;
        Ok(unpack_bits(&data, count))
    }

    async fn read_input_registers(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let data = self.transact(FunctionCode::ReadInputRegisters, start_addr, count)?;
        Ok(unpack_registers(&data))
    }

    async fn read_holding_registers(
        &mut self,
        start_addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, ModbusError> {
        let data = self.transact(FunctionCode::ReadHoldingRegisters, start_addr, count)?;
        Ok(unpack_registers(&data))
    }

    fn close(&mut self) {
        if self.line.take().is_some() {
            info!("✅ Serial port {} closed", self.settings.path);
        }
    }

    fn is_open(&self) -> bool {
        self.line.is_some()
    }
}
