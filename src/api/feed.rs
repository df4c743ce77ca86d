//! Live update feed for `/events` readers.
//!
//! The control loop publishes each serialized snapshot under an
//! increasing id. Readers never consume from the feed: every reader asks
//! for the updates newer than the last id it saw, so any number of
//! dashboards receive the same stream. Only the newest `N` updates are
//! kept.
//!
//! httpd cannot hold a response open while the control loop runs, so a
//! reader gets one batch of server-sent events per request and reconnects
//! after the `retry` delay. The browser echoes the last `id:` it saw in a
//! `Last-Event-ID` header, which is the reader's cursor.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::{Deque, Vec};

/// Serialized snapshot for the live update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdate {
    pub id: u32,
    pub json: heapless::String<256>,
}

/// Reconnect delay sent to every reader.
pub const RETRY_MS: u32 = 500;

/// Sent once to a reader that connects without a cursor.
pub const GREETING: &str = "hello!";

/// Updates kept for readers that fall behind.
const FEED_DEPTH: usize = 4;

/// Live snapshot feed: control loop → event-stream readers.
pub static UPDATE_FEED: UpdateFeed<FEED_DEPTH> = UpdateFeed::new();

struct FeedState<const N: usize> {
    next_id: u32,
    recent: Deque<LiveUpdate, N>,
}

pub struct UpdateFeed<const N: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<FeedState<N>>>,
}

impl<const N: usize> Default for UpdateFeed<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> UpdateFeed<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(FeedState {
                next_id: 1,
                recent: Deque::new(),
            })),
        }
    }

    /// Append an update, evicting the oldest when full. Returns its id.
    pub fn publish(&self, json: heapless::String<256>) -> u32 {
        self.state.lock(|cell| {
            let mut st = cell.borrow_mut();
            let id = st.next_id;
            st.next_id = st.next_id.checked_add(1).unwrap_or(1);
            if st.recent.is_full() {
                st.recent.pop_front();
            }
            // Cannot fail: a slot was just freed.
            let _ = st.recent.push_back(LiveUpdate { id, json });
            id
        })
    }

    /// Updates a reader has not seen yet, oldest first.
    ///
    /// A reader without a cursor, or with a cursor from before a reboot
    /// (ahead of anything published), gets only the latest update.
    pub fn since(&self, last_seen: Option<u32>) -> Vec<LiveUpdate, N> {
        self.state.lock(|cell| {
            let st = cell.borrow();
            let newest = st.recent.back().map_or(0, |u| u.id);
            let mut out = Vec::new();
            match last_seen {
                Some(seen) if seen <= newest => {
                    for u in st.recent.iter().filter(|u| u.id > seen) {
                        let _ = out.push(u.clone());
                    }
                }
                _ => {
                    if let Some(u) = st.recent.back() {
                        let _ = out.push(u.clone());
                    }
                }
            }
            out
        })
    }
}

/// Build one `text/event-stream` batch for a reader.
///
/// `last_event_id` is the raw `Last-Event-ID` header. A reader without a
/// valid one is greeted first; if nothing has been published yet it is
/// handed cursor 0 so the greeting is not repeated on reconnect.
pub fn render_events<const N: usize>(feed: &UpdateFeed<N>, last_event_id: Option<&str>) -> String {
    let cursor = last_event_id.and_then(|v| v.trim().parse::<u32>().ok());
    let updates = feed.since(cursor);

    let mut out = format!("retry: {RETRY_MS}\n\n");
    if cursor.is_none() {
        out.push_str("data: ");
        out.push_str(GREETING);
        out.push_str("\n\n");
        if updates.is_empty() {
            out.push_str("id: 0\n\n");
        }
    }
    for u in &updates {
        out.push_str(&format!("id: {}\nevent: update\ndata: {}\n\n", u.id, u.json));
    }
    out
}
