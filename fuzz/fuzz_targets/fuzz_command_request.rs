//! Fuzz target: REST request decoding
//!
//! Splits the input into a path and a body, routes it, and decodes the
//! body as a command. Neither step may panic, and a decoded command id
//! never exceeds its fixed capacity.
//!
//! cargo fuzz run fuzz_command_request

#![no_main]

use dosepump::api::request::{COMMAND_ID_LEN, CommandRoute, Method, Route, decode_command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.iter().position(|b| *b == b'\n').unwrap_or(data.len());
    let (head, body) = data.split_at(split);

    if let Ok(path) = core::str::from_utf8(head) {
        let _ = Route::parse(Method::Get, path);
        let _ = Route::parse(Method::Post, path);
    }

    // Every command route must survive any body.
    for route in CommandRoute::ALL {
        if let Ok((id, _cmd)) = decode_command(route, body) {
            assert!(id.len() <= COMMAND_ID_LEN);
        }
    }
});
