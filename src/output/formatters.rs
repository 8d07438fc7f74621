use chrono::Utc;

use crate::modbus::{DeviceAddress, ReadResult};

/// Legacy wire text: every value followed by one space, or `Error:<message>`.
pub fn encode(result: &ReadResult) -> String {
    match result {
        ReadResult::Success(values) => values.iter().map(|v| format!("{} ", v)).collect(),
        ReadResult::Error(outcome) => format!("Error:{}", outcome.message),
    }
}

pub trait DataFormatter: Send + Sync {
    fn format(&self, address: &DeviceAddress, result: &ReadResult) -> String;
    fn name(&self) -> &str;
}

pub struct WireFormatter;

impl DataFormatter for WireFormatter {
    fn format(&self, _address: &DeviceAddress, result: &ReadResult) -> String {
        encode(result)
    }

    fn name(&self) -> &str {
        "wire"
    }
}

pub struct ConsoleFormatter;

impl DataFormatter for ConsoleFormatter {
    fn format(&self, _address: &DeviceAddress, result: &ReadResult) -> String {
        match result {
            ReadResult::Success(values) => format!(
                "Read {} points successfully:\nResult: {}",
                values.len(),
                encode(result)
            ),
            ReadResult::Error(outcome) => format!("Error: Failed to read: {}", outcome.message),
        }
    }

    fn name(&self) -> &str {
        "text"
    }
}

pub struct JsonFormatter;

impl DataFormatter for JsonFormatter {
    fn format(&self, address: &DeviceAddress, result: &ReadResult) -> String {
        let mut json = serde_json::json!({
            "slave_id": address.slave_id,
            "point_type": address.point_type,
            "start_address": address.start_address,
            "quantity": address.quantity,
            "timestamp": Utc::now().to_rfc3339(),
        });

        match result {
            ReadResult::Success(values) => {
                json["status"] = "ok".into();
                json["values"] = serde_json::json!(values);
            }
            ReadResult::Error(outcome) => {
                json["status"] = "error".into();
                json["error_kind"] = outcome.kind.to_string().into();
                json["error"] = outcome.message.clone().into();
            }
        }

        serde_json::to_string_pretty(&json).unwrap_or_default()
    }

    fn name(&self) -> &str {
        "json"
    }
}

pub fn formatter_for(name: &str) -> Option<Box<dyn DataFormatter>> {
    match name {
        "text" => Some(Box::new(ConsoleFormatter)),
        "json" => Some(Box::new(JsonFormatter)),
        "wire" => Some(Box::new(WireFormatter)),
        _ => None,
    }
}
