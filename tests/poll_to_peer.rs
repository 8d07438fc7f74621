use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;
use std::time::Duration;

use modscan::modbus::client::LineIo;
use modscan::modbus::crc::append_crc;
use modscan::modbus::SerialSettings;
use modscan::services::Termination;
use modscan::{DeviceAddress, PollLoop, RtuTransport, TcpSender};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// Holding-register slave that goes quiet for the requests listed in `mute`.
struct Slave {
    id: u8,
    registers: Vec<u16>,
    mute: Vec<usize>,
    seen: usize,
    tx: VecDeque<u8>,
}

impl Write for Slave {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.seen += 1;
        if self.mute.contains(&self.seen) {
            return Ok(buf.len());
        }
        let start = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let count = u16::from_be_bytes([buf[4], buf[5]]) as usize;
        let mut adu = vec![self.id, buf[1], (count * 2) as u8];
        for value in &self.registers[start..start + count] {
            adu.extend_from_slice(&value.to_be_bytes());
        }
        append_crc(&mut adu);
        self.tx.extend(adu);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for Slave {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.tx.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(self.tx.len());
        for (slot, byte) in buf.iter_mut().zip(self.tx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl LineIo for Slave {}

#[tokio::test]
async fn streams_values_and_errors_to_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let slave = Slave {
        id: 5,
        registers: vec![3, 7, 255, 0],
        mute: vec![2],
        seen: 0,
        tx: VecDeque::new(),
    };
    let transport = RtuTransport::with_line(SerialSettings::new("/dev/sim"), 5, slave).unwrap();
    let address = DeviceAddress::new(5, 0, 3, 4).unwrap();

    let connect = TcpSender::connect(Ipv4Addr::LOCALHOST, port, Duration::from_secs(2));
    let (poll, accepted) = tokio::join!(
        PollLoop::init(transport, address, Duration::from_millis(10), connect),
        listener.accept()
    );
    let mut poll = poll.unwrap();
    let (mut peer, _) = accepted.unwrap();

    for _ in 0..3 {
        poll.tick().await.unwrap();
    }
    let stats = poll.stats();
    assert_eq!(stats.successful_reads, 2);
    assert_eq!(stats.failed_reads, 1);
    poll.terminate().await;

    let mut received = String::new();
    peer.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "3 7 255 Error:Connection timed out3 7 255 ");
}

#[tokio::test]
async fn run_until_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let slave = Slave {
        id: 1,
        registers: vec![42],
        mute: vec![],
        seen: 0,
        tx: VecDeque::new(),
    };
    let transport = RtuTransport::with_line(SerialSettings::new("/dev/sim"), 1, slave).unwrap();
    let address = DeviceAddress::new(1, 0, 1, 4).unwrap();

    let connect = TcpSender::connect(Ipv4Addr::LOCALHOST, port, Duration::from_secs(2));
    let (poll, accepted) = tokio::join!(
        PollLoop::init(transport, address, Duration::from_millis(10), connect),
        listener.accept()
    );
    let (mut peer, _) = accepted.unwrap();

    let summary = poll
        .unwrap()
        .run_until(tokio::time::sleep(Duration::from_millis(35)))
        .await;
    assert_eq!(summary.reason, Termination::Shutdown);
    assert!(summary.stats.ticks >= 1);

    let mut received = String::new();
    peer.read_to_string(&mut received).await.unwrap();
    assert_eq!(received, "42 ".repeat(summary.stats.ticks as usize));
}
