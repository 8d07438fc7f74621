pub mod formatters;
pub mod senders;

pub use formatters::{encode, formatter_for, ConsoleFormatter, DataFormatter, JsonFormatter, WireFormatter};
pub use senders::{ConsoleSender, DataSender, TcpSender};
