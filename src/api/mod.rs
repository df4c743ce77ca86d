//! REST command surface.
//!
//! The HTTP server itself lives in the binary; this module turns a
//! `(method, path, body)` triple into an [`AppService`] call and a JSON
//! answer, so the whole surface runs in host tests.
//!
//! | Route                           | Command              |
//! |---------------------------------|----------------------|
//! | `POST /api/command/bolus`       | `{units}`            |
//! | `POST /api/command/temp-basal`  | `{rate, durationMinutes}` |
//! | `POST /api/command/basal`       | `{rate}`             |
//! | `POST /api/command/suspend`     |                      |
//! | `POST /api/command/resume`      |                      |
//! | `POST /api/command/stop`        |                      |
//! | `POST /api/command/beep`        |                      |
//! | `POST /api/command/reset`       |                      |
//! | `GET  /api/device/info`         |                      |
//! | `GET  /api/device/status`       |                      |
//!
//! The binary also serves [`DASHBOARD_HTML`] at `GET /` and the
//! [`feed`] as server-sent events at `GET /events`.

pub mod channels;
pub mod feed;
pub mod request;
pub mod response;

use log::debug;

use crate::app::ports::{ActuatorPort, BuzzerPort, EventSink, StoragePort};
use crate::app::service::AppService;

use request::{Method, Route, decode_command};
use response::ApiResponse;

/// Single-page dashboard. Reads `update` events from `/events` and posts
/// to the bolus and reset commands.
pub const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Clock readings handed to a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestClock {
    /// Monotonic ms, drives the scheduler.
    pub now_ms: u64,
    /// Wall-clock epoch ms for response timestamps (0 before time sync).
    pub epoch_ms: u64,
}

/// Route one request into the service and build its answer.
#[allow(clippy::too_many_arguments)]
pub fn handle_request(
    app: &mut AppService,
    method: Method,
    path: &str,
    body: &[u8],
    clock: RequestClock,
    hw: &mut (impl ActuatorPort + BuzzerPort),
    store: &mut impl StoragePort,
    sink: &mut impl EventSink,
) -> ApiResponse {
    let Some(route) = Route::parse(method, path) else {
        debug!("API: no route for {:?} {}", method, path);
        return response::not_found();
    };

    match route {
        Route::DeviceInfo => response::device_info(&app.snapshot()),
        Route::DeviceStatus => response::device_status(&app.snapshot(), clock.epoch_ms),
        Route::Command(cmd_route) => {
            let (id, cmd) = match decode_command(cmd_route, body) {
                Ok(decoded) => decoded,
                Err(e) => return response::bad_request(e),
            };
            match app.handle_command(cmd, clock.now_ms, hw, store, sink) {
                Ok(accepted) => response::accepted(&id, clock.epoch_ms, &accepted),
                Err(rejection) => response::rejected(rejection),
            }
        }
    }
}
