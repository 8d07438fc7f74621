pub mod commands;

pub use commands::{build_cli, device_address_from_matches, handle_command};
