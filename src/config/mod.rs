pub mod peer;
pub mod settings;

pub use peer::{parse_peer_address, read_peer_address};
pub use settings::{Config, ParityConfig, DEFAULT_PEER_FILE, DEFAULT_PEER_PORT, DEFAULT_SERIAL_PORT};
