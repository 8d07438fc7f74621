//! In-memory RTU slave used by the unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use super::client::LineIo;
use super::crc::{append_crc, verify_crc};

pub(crate) struct SimulatedSlave {
    pub slave_id: u8,
    pub coils: Vec<bool>,
    pub discrete: Vec<bool>,
    pub input: Vec<u16>,
    pub holding: Vec<u16>,
    pub exception: Option<u8>,
    pub corrupt_crc: bool,
    pub silent: bool,
    pub reply_as: Option<u8>,
    pub byte_count: Option<u8>,
    pub discards: usize,
    rx: Vec<u8>,
    tx: VecDeque<u8>,
}

impl SimulatedSlave {
    pub fn new(slave_id: u8) -> Self {
        Self {
            slave_id,
            coils: Vec::new(),
            discrete: Vec::new(),
            input: Vec::new(),
            holding: Vec::new(),
            exception: None,
            corrupt_crc: false,
            silent: false,
            reply_as: None,
            byte_count: None,
            discards: 0,
            rx: Vec::new(),
            tx: VecDeque::new(),
        }
    }

    fn respond(&mut self, request: &[u8]) {
        if self.silent || verify_crc(request).is_err() || request[0] != self.slave_id {
            return;
        }

        let function = request[1];
        let start = u16::from_be_bytes([request[2], request[3]]) as usize;
        let count = u16::from_be_bytes([request[4], request[5]]) as usize;
        let unit = self.reply_as.unwrap_or(self.slave_id);

        let mut adu = vec![unit];
        if let Some(code) = self.exception {
            adu.extend_from_slice(&[function | 0x80, code]);
        } else {
            adu.push(function);
            match function {
                0x01 | 0x02 => {
                    let table = if function == 0x01 { &self.coils } else { &self.discrete };
                    let mut packed = vec![0u8; count.div_ceil(8)];
                    for i in 0..count {
                        if table.get(start + i).copied().unwrap_or(false) {
                            packed[i / 8] |= 1 << (i % 8);
                        }
                    }
                    adu.push(self.byte_count.unwrap_or(packed.len() as u8));
                    adu.extend_from_slice(&packed);
                }
                _ => {
                    let table = if function == 0x04 { &self.input } else { &self.holding };
                    adu.push(self.byte_count.unwrap_or((count * 2) as u8));
                    for i in 0..count {
                        let value = table.get(start + i).copied().unwrap_or(0);
                        adu.extend_from_slice(&value.to_be_bytes());
                    }
                }
            }
        }
        append_crc(&mut adu);
        if self.corrupt_crc {
            if let Some(last) = adu.last_mut() {
                *last ^= 0xFF;
            }
        }
        self.tx.extend(adu);
    }
}

impl Write for SimulatedSlave {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rx.extend_from_slice(buf);
        while self.rx.len() >= 8 {
            let request: Vec<u8> = self.rx.drain(..8).collect();
            self.respond(&request);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedSlave {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.tx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
        }
        let n = buf.len().min(self.tx.len());
        for (slot, byte) in buf.iter_mut().zip(self.tx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl LineIo for SimulatedSlave {
    fn discard_input(&mut self) -> io::Result<()> {
        self.discards += 1;
        self.tx.clear();
        Ok(())
    }
}
