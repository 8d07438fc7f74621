/// CRC-16/MODBUS over `data`. Appended to a frame low byte first.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    let poly: u16 = 0xA001;

    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Appends the CRC of `frame` to it, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_modbus(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Checks the trailing two CRC bytes of a complete ADU.
/// Returns `(received, calculated)` on mismatch.
pub fn verify_crc(adu: &[u8]) -> Result<(), (u16, u16)> {
    if adu.len() < 3 {
        return Err((0, 0));
    }
    let data_len = adu.len() - 2;
    let received = u16::from_le_bytes([adu[data_len], adu[data_len + 1]]);
    let calculated = crc16_modbus(&adu[..data_len]);
    if received == calculated {
        Ok(())
    } else {
        Err((received, calculated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_modbus() {
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]), 0xCDC5);
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0xF4, 0x00, 0x16]), 0xF685);
    }

    #[test]
    fn test_append_and_verify() {
        let mut frame = vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        append_crc(&mut frame);
        assert_eq!(&frame[6..], &[0xC5, 0xCD]);
        assert!(verify_crc(&frame).is_ok());

        frame[2] ^= 0xFF;
        assert!(verify_crc(&frame).is_err());
    }
}
