//! Response bodies for the REST surface.
//!
//! Success: `{commandId, status:"SUCCESS", timestamp, data}`.
//! Rejection and decode errors: `{"error": "..."}` with a 4xx status.

use serde::Serialize;
use serde_json::{Value, json};

use crate::app::commands::Accepted;
use crate::app::events::{DeviceStatus, PumpSnapshot};
use crate::error::Rejection;

use super::request::RequestError;

pub const SERIAL_NUMBER: &str = "ESP32-PUMP-001";
pub const HARDWARE_VERSION: &str = "v1.0-WormDrive";
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A finished HTTP answer: status code plus JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn json(status: u16, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(_) => Self {
                status: 500,
                body: String::from(r#"{"error":"encoding failed"}"#),
            },
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Success<'a> {
    command_id: &'a str,
    status: &'static str,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Wrap an accepted command. `timestamp` is wall-clock epoch ms (0 before
/// time sync); a bolus also reports it as `startTime`.
pub fn accepted(command_id: &str, timestamp: u64, accepted: &Accepted) -> ApiResponse {
    let data = match accepted {
        Accepted::Ack {} => None,
        Accepted::Bolus { units_delivered } => Some(json!({
            "unitsDelivered": units_delivered,
            "startTime": timestamp,
        })),
        other => serde_json::to_value(other).ok(),
    };
    ApiResponse::json(
        200,
        &Success {
            command_id,
            status: "SUCCESS",
            timestamp,
            data,
        },
    )
}

pub fn rejected(rejection: Rejection) -> ApiResponse {
    ApiResponse::error(rejection.http_status(), &rejection.to_string())
}

pub fn bad_request(err: RequestError) -> ApiResponse {
    ApiResponse::error(400, &err.to_string())
}

pub fn not_found() -> ApiResponse {
    ApiResponse::error(404, "not found")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceInfo {
    serial_number: &'static str,
    firmware_version: &'static str,
    hardware_version: &'static str,
    device_status: DeviceStatus,
    battery_percentage: u8,
    reservoir_volume: f32,
    activation_stage: u8,
    communication_status: &'static str,
}

/// `GET /api/device/info`
pub fn device_info(snap: &PumpSnapshot) -> ApiResponse {
    ApiResponse::json(
        200,
        &DeviceInfo {
            serial_number: SERIAL_NUMBER,
            firmware_version: FIRMWARE_VERSION,
            hardware_version: HARDWARE_VERSION,
            device_status: snap.status,
            battery_percentage: 100,
            reservoir_volume: snap.remaining,
            activation_stage: 5,
            communication_status: "CONNECTED",
        },
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceStatusDoc {
    device_status: DeviceStatus,
    battery_percentage: u8,
    reservoir_volume: f32,
    connection_state: &'static str,
    timestamp: u64,
}

/// `GET /api/device/status`
pub fn device_status(snap: &PumpSnapshot, timestamp: u64) -> ApiResponse {
    ApiResponse::json(
        200,
        &DeviceStatusDoc {
            device_status: snap.status,
            battery_percentage: 100,
            reservoir_volume: snap.remaining,
            connection_state: "AUTHENTICATED_AND_READY",
            timestamp,
        },
    )
}
