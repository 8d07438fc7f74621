use log::info;

use super::client::ModbusClientTrait;
use super::protocol::{DeviceAddress, PointType};
use crate::utils::error::{ErrorKind, ModbusError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one poll. Bits are carried as 0/1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Success(Vec<u16>),
    Error(ErrorOutcome),
}

impl ReadResult {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ReadResult::Error(ErrorOutcome {
            kind,
            message: message.into(),
        })
    }

    pub fn from_error(err: &ModbusError) -> Self {
        Self::error(err.kind(), err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReadResult::Success(_))
    }
}

impl From<Result<Vec<u16>, ModbusError>> for ReadResult {
    fn from(result: Result<Vec<u16>, ModbusError>) -> Self {
        match result {
            Ok(values) => ReadResult::Success(values),
            Err(e) => ReadResult::from_error(&e),
        }
    }
}

/// Point-type dispatch over a [`ModbusClientTrait`].
pub struct ModbusReader;

impl ModbusReader {
    /// Reads by raw point-type code. Unknown codes fail before touching the
    /// transport.
    pub async fn read<C>(
        client: &mut C,
        start_addr: u16,
        quantity: u16,
        point_type: i64,
    ) -> Result<Vec<u16>, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
    {
        let point_type = PointType::from_code(point_type)?;
        Self::read_points(client, start_addr, quantity, point_type).await
    }

    pub async fn read_address<C>(client: &mut C, address: &DeviceAddress) -> Result<Vec<u16>, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
    {
        Self::read_points(client, address.start_address, address.quantity, address.point_type).await
    }

    pub async fn read_points<C>(
        client: &mut C,
        start_addr: u16,
        quantity: u16,
        point_type: PointType,
    ) -> Result<Vec<u16>, ModbusError>
    where
        C: ModbusClientTrait + ?Sized,
    {
        info!("📊 Reading {} {} from address {}...", quantity, point_type.label(), start_addr);

        let values: Vec<u16> = match point_type {
            PointType::Coil => bits_to_values(client.read_coils(start_addr, quantity).await?),
            PointType::InputStatus => {
                bits_to_values(client.read_discrete_inputs(start_addr, quantity).await?)
            }
            PointType::InputRegister => client.read_input_registers(start_addr, quantity).await?,
            PointType::HoldingRegister => {
                client.read_holding_registers(start_addr, quantity).await?
            }
        };

        if values.len() != quantity as usize {
            return Err(ModbusError::InvalidResponse(format!(
                "expected {} values, got {}",
                quantity,
                values.len()
            )));
        }
        Ok(values)
    }
}

fn bits_to_values(bits: Vec<bool>) -> Vec<u16> {
    bits.into_iter().map(u16::from).collect()
}
