//! REST inter-task communication channels.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge the HTTP server
//! task with the synchronous control loop. The control loop is the only
//! place dosing state is touched; HTTP handlers hand it a request and
//! wait for the answer carrying their ticket.
//!
//! ```text
//! ┌──────────────┐ InboundRequest  ┌──────────────┐
//! │  HTTP Task   │───────────────▶│ Control Loop  │
//! │  (httpd)     │◀───────────────│ (sync)        │
//! └──────────────┘ OutboundResponse└──────────────┘
//! ```
//!
//! Tickets only ever increase, and httpd runs one handler at a time, so
//! an answer queued under a ticket older than the one being waited for
//! belongs to a handler that already timed out.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::Vec;
use log::{debug, warn};

use super::request::Method;
use super::response::ApiResponse;

/// Largest request body accepted from the HTTP task.
pub const MAX_BODY: usize = 512;

pub type Path = heapless::String<64>;

/// Inbound request from an HTTP handler, delivered to the control loop.
#[derive(Debug)]
pub struct InboundRequest {
    /// Correlates the response with the waiting handler.
    pub ticket: u32,
    pub method: Method,
    pub path: Path,
    pub body: Vec<u8, MAX_BODY>,
}

/// Outbound response from the control loop, delivered to the HTTP task.
pub struct OutboundResponse {
    pub ticket: u32,
    pub response: ApiResponse,
}

/// Channel depth for inbound requests.
const REQ_DEPTH: usize = 8;

/// Channel depth for outbound responses.
const RESP_DEPTH: usize = 8;

pub type RequestChannel<const N: usize> = Channel<CriticalSectionRawMutex, InboundRequest, N>;
pub type ResponseChannel<const N: usize> = Channel<CriticalSectionRawMutex, OutboundResponse, N>;

/// Inbound request channel: HTTP task → control loop.
pub static REQUEST_CHANNEL: RequestChannel<REQ_DEPTH> = Channel::new();

/// Outbound response channel: control loop → HTTP task.
pub static RESPONSE_CHANNEL: ResponseChannel<RESP_DEPTH> = Channel::new();

/// Drain queued requests through `handle` and post each answer.
///
/// Called once per control tick. Returns the number of requests served.
/// If the response channel is full the oldest queued answer is evicted;
/// its handler has already given up.
pub fn serve_pending<const N: usize, const M: usize>(
    requests: &RequestChannel<N>,
    responses: &ResponseChannel<M>,
    mut handle: impl FnMut(&InboundRequest) -> ApiResponse,
) -> usize {
    let mut served = 0;
    while let Ok(req) = requests.try_receive() {
        let response = handle(&req);
        let mut msg = OutboundResponse {
            ticket: req.ticket,
            response,
        };
        while let Err(TrySendError::Full(back)) = responses.try_send(msg) {
            match responses.try_receive() {
                Ok(stale) => warn!("API: evicting unclaimed answer for ticket {}", stale.ticket),
                Err(_) => {
                    warn!("API: response queue stuck, dropping answer for ticket {}", back.ticket);
                    break;
                }
            }
            msg = back;
        }
        served += 1;
    }
    served
}

/// Take the response for `ticket` if it has arrived.
///
/// Answers for older tickets are discarded. Newer ones are put back.
pub fn take_response<const M: usize>(
    responses: &ResponseChannel<M>,
    ticket: u32,
) -> Option<ApiResponse> {
    let mut found = None;
    for _ in 0..M {
        let Ok(msg) = responses.try_receive() else {
            break;
        };
        if msg.ticket == ticket && found.is_none() {
            found = Some(msg.response);
        } else if msg.ticket < ticket {
            debug!("API: discarding stale answer for ticket {}", msg.ticket);
        } else if responses.try_send(msg).is_err() {
            warn!("API: response queue full while requeueing");
        }
    }
    found
}
