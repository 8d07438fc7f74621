//! Modbus RTU application data units for the four read functions.

use std::fmt;

use super::crc::{append_crc, verify_crc};
use crate::utils::error::{ExceptionCode, ModbusError};

pub const MIN_SLAVE_ID: i64 = 1;
pub const MAX_SLAVE_ID: i64 = 247;
pub const MAX_BIT_QUANTITY: u16 = 2000;
pub const MAX_REGISTER_QUANTITY: u16 = 125;

const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadDiscreteInputs = 0x02,
    ReadHoldingRegisters = 0x03,
    ReadInputRegisters = 0x04,
}

impl FunctionCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn reads_bits(self) -> bool {
        matches!(self, FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs)
    }

    /// Data byte count a well-formed response carries for `quantity` points.
    pub fn response_byte_count(self, quantity: u16) -> usize {
        if self.reads_bits() {
            (quantity as usize).div_ceil(8)
        } else {
            quantity as usize * 2
        }
    }
}

/// Point-type code given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PointType {
    Coil,
    InputStatus,
    InputRegister,
    HoldingRegister,
}

impl PointType {
    pub fn from_code(code: i64) -> Result<Self, ModbusError> {
        match code {
            1 => Ok(PointType::Coil),
            2 => Ok(PointType::InputStatus),
            3 => Ok(PointType::InputRegister),
            4 => Ok(PointType::HoldingRegister),
            other => Err(ModbusError::InvalidPointType(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PointType::Coil => 1,
            PointType::InputStatus => 2,
            PointType::InputRegister => 3,
            PointType::HoldingRegister => 4,
        }
    }

    pub fn function_code(self) -> FunctionCode {
        match self {
            PointType::Coil => FunctionCode::ReadCoils,
            PointType::InputStatus => FunctionCode::ReadDiscreteInputs,
            PointType::InputRegister => FunctionCode::ReadInputRegisters,
            PointType::HoldingRegister => FunctionCode::ReadHoldingRegisters,
        }
    }

    pub fn max_quantity(self) -> u16 {
        if self.function_code().reads_bits() {
            MAX_BIT_QUANTITY
        } else {
            MAX_REGISTER_QUANTITY
        }
    }

    /// Plural noun used in log lines, e.g. "Reading 4 coils".
    pub fn label(self) -> &'static str {
        match self {
            PointType::Coil => "coils",
            PointType::InputStatus => "input bits",
            PointType::InputRegister => "input registers",
            PointType::HoldingRegister => "holding registers",
        }
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PointType::Coil => "COIL STATUS",
            PointType::InputStatus => "INPUT STATUS",
            PointType::InputRegister => "INPUT REGISTER",
            PointType::HoldingRegister => "HOLDING REGISTER",
        };
        write!(f, "{:02}: {}", self.code(), name)
    }
}

pub fn validate_slave_id(slave_id: i64) -> Result<u8, ModbusError> {
    if (MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&slave_id) {
        Ok(slave_id as u8)
    } else {
        Err(ModbusError::InvalidSlave(slave_id))
    }
}

/// What to read, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddress {
    pub slave_id: u8,
    pub start_address: u16,
    pub quantity: u16,
    pub point_type: PointType,
}

impl DeviceAddress {
    /// Validates the raw command-line integers.
    pub fn new(
        slave_id: i64,
        start_address: i64,
        quantity: i64,
        point_type: i64,
    ) -> Result<Self, ModbusError> {
        let point_type = PointType::from_code(point_type)?;
        let slave_id = validate_slave_id(slave_id)?;

        let start_address = u16::try_from(start_address).map_err(|_| {
            ModbusError::ConfigError(format!(
                "start address {} outside 0..=65535",
                start_address
            ))
        })?;

        let max = point_type.max_quantity();
        if quantity < 1 || quantity > max as i64 {
            return Err(ModbusError::ConfigError(format!(
                "quantity {} outside 1..={} for {}",
                quantity,
                max,
                point_type.label()
            )));
        }
        let quantity = quantity as u16;

        if start_address as u32 + quantity as u32 > 0x1_0000 {
            return Err(ModbusError::ConfigError(format!(
                "reading {} points from address {} runs past 65535",
                quantity, start_address
            )));
        }

        Ok(Self {
            slave_id,
            start_address,
            quantity,
            point_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub slave_id: u8,
    pub function: FunctionCode,
    pub start_address: u16,
    pub quantity: u16,
}

impl ModbusRequest {
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(8);
        frame.push(self.slave_id);
        frame.push(self.function.code());
        frame.extend_from_slice(&self.start_address.to_be_bytes());
        frame.extend_from_slice(&self.quantity.to_be_bytes());
        append_crc(&mut frame);
        frame
    }

    /// Full ADU length of a normal response, CRC included.
    pub fn expected_response_len(&self) -> usize {
        3 + self.function.response_byte_count(self.quantity) + 2
    }

    /// Validates a complete response ADU and returns its data bytes.
    pub fn parse_response<'a>(&self, adu: &'a [u8]) -> Result<&'a [u8], ModbusError> {
        if adu.len() < 5 {
            return Err(ModbusError::InvalidResponse(format!(
                "response too short ({} bytes)",
                adu.len()
            )));
        }

        verify_crc(adu)
            .map_err(|(received, calculated)| ModbusError::CrcError { received, calculated })?;

        if adu[0] != self.slave_id {
            return Err(ModbusError::InvalidResponse(format!(
                "reply from slave {} while talking to slave {}",
                adu[0], self.slave_id
            )));
        }

        let function = self.function.code();
        if adu[1] == function | EXCEPTION_FLAG {
            return Err(ModbusError::Exception {
                function,
                exception: ExceptionCode::from(adu[2]),
            });
        }
        if adu[1] != function {
            return Err(ModbusError::InvalidResponse(format!(
                "unexpected function code 0x{:02x}",
                adu[1]
            )));
        }

        let expected = self.function.response_byte_count(self.quantity);
        let byte_count = adu[2] as usize;
        if byte_count != expected || adu.len() != 3 + byte_count + 2 {
            return Err(ModbusError::InvalidResponse(format!(
                "byte count {} does not match {} expected for {} points",
                byte_count, expected, self.quantity
            )));
        }

        Ok(&adu[3..3 + byte_count])
    }
}

/// Unpacks `quantity` bits, least significant bit of each byte first.
pub fn unpack_bits(data: &[u8], quantity: u16) -> Vec<bool> {
    (0..quantity as usize)
        .map(|i| data.get(i / 8).is_some_and(|byte| (byte >> (i % 8)) & 1 == 1))
        .collect()
}

pub fn unpack_registers(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(quantity: u16) -> ModbusRequest {
        ModbusRequest {
            slave_id: 1,
            function: FunctionCode::ReadHoldingRegisters,
            start_address: 0,
            quantity,
        }
    }

    #[test]
    fn request_frame_layout() {
        let frame = holding(10).to_frame();
        assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]);
    }

    #[test]
    fn point_type_dispatch_table() {
        assert_eq!(PointType::from_code(1).unwrap().function_code(), FunctionCode::ReadCoils);
        assert_eq!(
            PointType::from_code(2).unwrap().function_code(),
            FunctionCode::ReadDiscreteInputs
        );
        assert_eq!(
            PointType::from_code(3).unwrap().function_code(),
            FunctionCode::ReadInputRegisters
        );
        assert_eq!(
            PointType::from_code(4).unwrap().function_code(),
            FunctionCode::ReadHoldingRegisters
        );
        for bad in [0, 5, -1, 99] {
            assert!(matches!(
                PointType::from_code(bad),
                Err(ModbusError::InvalidPointType(code)) if code == bad
            ));
        }
    }

    #[test]
    fn slave_id_boundaries() {
        assert!(matches!(validate_slave_id(0), Err(ModbusError::InvalidSlave(0))));
        assert!(matches!(validate_slave_id(248), Err(ModbusError::InvalidSlave(248))));
        assert_eq!(validate_slave_id(1).unwrap(), 1);
        assert_eq!(validate_slave_id(247).unwrap(), 247);
    }

    #[test]
    fn device_address_quantity_limits() {
        assert!(DeviceAddress::new(1, 0, 2000, 1).is_ok());
        assert!(DeviceAddress::new(1, 0, 2001, 2).is_err());
        assert!(DeviceAddress::new(1, 0, 125, 4).is_ok());
        assert!(DeviceAddress::new(1, 0, 126, 3).is_err());
        assert!(DeviceAddress::new(1, 0, 0, 3).is_err());
        assert!(DeviceAddress::new(1, 65535, 2, 3).is_err());
        assert!(DeviceAddress::new(1, -1, 1, 3).is_err());
        assert!(matches!(
            DeviceAddress::new(1, 0, 1, 9),
            Err(ModbusError::InvalidPointType(9))
        ));
    }

    #[test]
    fn parse_register_response() {
        let request = holding(2);
        let mut adu = vec![0x01, 0x03, 0x04, 0x00, 0x03, 0x01, 0x00];
        append_crc(&mut adu);
        let data = request.parse_response(&adu).unwrap();
        assert_eq!(unpack_registers(data), vec![3, 256]);
        assert_eq!(request.expected_response_len(), adu.len());
    }

    #[test]
    fn parse_exception_response() {
        let request = holding(2);
        let mut adu = vec![0x01, 0x83, 0x02];
        append_crc(&mut adu);
        match request.parse_response(&adu) {
            Err(ModbusError::Exception { function, exception }) => {
                assert_eq!(function, 0x03);
                assert_eq!(exception, ExceptionCode::IllegalDataAddress);
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }

    #[test]
    fn parse_rejects_wrong_slave_and_bad_crc() {
        let request = holding(1);
        let mut adu = vec![0x02, 0x03, 0x02, 0x00, 0x07];
        append_crc(&mut adu);
        assert!(matches!(
            request.parse_response(&adu),
            Err(ModbusError::InvalidResponse(_))
        ));

        let mut adu = vec![0x01, 0x03, 0x02, 0x00, 0x07];
        append_crc(&mut adu);
        adu[4] = 0x08;
        assert!(matches!(request.parse_response(&adu), Err(ModbusError::CrcError { .. })));
    }

    #[test]
    fn bits_unpack_lsb_first() {
        let bits = unpack_bits(&[0b0000_0101, 0b0000_0001], 10);
        assert_eq!(
            bits,
            vec![true, false, true, false, false, false, false, false, true, false]
        );
        assert_eq!(FunctionCode::ReadCoils.response_byte_count(10), 2);
        assert_eq!(FunctionCode::ReadInputRegisters.response_byte_count(10), 20);
    }
}
