use log::info;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::utils::error::ModbusError;

/// Reads the peer IPv4 address from a one-line file.
pub fn read_peer_address<P: AsRef<Path>>(path: P) -> Result<Ipv4Addr, ModbusError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ModbusError::ConfigError(format!("cannot read peer address from {}: {}", path.display(), e))
    })?;
    let addr = parse_peer_address(&content)?;
    info!("📡 Peer address {} (from {})", addr, path.display());
    Ok(addr)
}

pub fn parse_peer_address(content: &str) -> Result<Ipv4Addr, ModbusError> {
    let line = content.lines().next().unwrap_or("").trim();
    line.parse::<Ipv4Addr>()
        .map_err(|e| ModbusError::ConfigError(format!("invalid peer address {:?}: {}", line, e)))
}
