//! Live update adapter.
//!
//! Serializes every snapshot into the `update` payload and publishes it
//! on the live update feed for the event-stream readers. The feed keeps
//! only the newest few updates, since a dashboard only needs the latest
//! state.

use log::warn;

use crate::api::feed::UpdateFeed;
use crate::app::events::{AppEvent, PumpSnapshot};
use crate::app::ports::EventSink;

/// Render the `update` payload, or `None` if it does not fit.
pub fn update_payload(s: &PumpSnapshot) -> Option<heapless::String<256>> {
    let json = match serde_json::to_string(s) {
        Ok(json) => json,
        Err(e) => {
            warn!("live: snapshot encoding failed ({})", e);
            return None;
        }
    };
    match heapless::String::try_from(json.as_str()) {
        Ok(out) => Some(out),
        Err(()) => {
            warn!("live: {}-byte payload exceeds the update buffer", json.len());
            None
        }
    }
}

/// Publishes snapshots on a live update feed.
pub struct LiveUpdateSink<'a, const N: usize> {
    feed: &'a UpdateFeed<N>,
}

impl<'a, const N: usize> LiveUpdateSink<'a, N> {
    pub fn new(feed: &'a UpdateFeed<N>) -> Self {
        Self { feed }
    }
}

impl<const N: usize> EventSink for LiveUpdateSink<'_, N> {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::Snapshot(s) | AppEvent::Started(s) = event {
            if let Some(json) = update_payload(s) {
                self.feed.publish(json);
            }
        }
    }
}
