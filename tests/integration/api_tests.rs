//! REST surface: routing, status codes, and JSON shapes.

use dosepump::adapters::live_sink::{LiveUpdateSink, update_payload};
use dosepump::api::channels::{InboundRequest, RequestChannel, ResponseChannel, serve_pending, take_response};
use dosepump::api::feed::{UpdateFeed, render_events};
use dosepump::api::request::Method;
use dosepump::app::commands::AppCommand;
use dosepump::api::{RequestClock, handle_request};
use embassy_sync::channel::Channel;
use serde_json::Value;

use crate::mock_hw::{Bench, HwCall};

const EPOCH: u64 = 1_760_000_000_000;

fn call(b: &mut Bench, method: Method, path: &str, body: &str) -> (u16, Value) {
    let clock = RequestClock {
        now_ms: b.now,
        epoch_ms: EPOCH,
    };
    let resp = handle_request(
        &mut b.app,
        method,
        path,
        body.as_bytes(),
        clock,
        &mut b.hw,
        &mut b.nvs,
        &mut b.sink,
    );
    let json = serde_json::from_str(&resp.body).expect("response is JSON");
    (resp.status, json)
}

fn post(b: &mut Bench, path: &str, body: &str) -> (u16, Value) {
    call(b, Method::Post, path, body)
}

#[test]
fn bolus_success_envelope() {
    let mut b = Bench::new();
    let (status, v) = post(
        &mut b,
        "/api/command/bolus",
        r#"{"commandId":"cmd-42","units":1.5}"#,
    );
    assert_eq!(status, 200);
    assert_eq!(v["commandId"], "cmd-42");
    assert_eq!(v["status"], "SUCCESS");
    assert_eq!(v["timestamp"], EPOCH);
    assert_eq!(v["data"]["unitsDelivered"], 1.5);
    assert_eq!(v["data"]["startTime"], EPOCH);
}

#[test]
fn busy_and_suspended_map_to_conflict() {
    let mut b = Bench::new();
    post(&mut b, "/api/command/bolus", r#"{"units":2}"#);
    let (status, v) = post(&mut b, "/api/command/bolus", r#"{"units":1}"#);
    assert_eq!(status, 409);
    assert_eq!(v["error"], "Device busy or suspended");

    let (status, v) = post(&mut b, "/api/command/suspend", "");
    assert_eq!(status, 200);
    assert_eq!(v["data"]["deviceStatus"], "SUSPENDED");

    let (status, v) = post(&mut b, "/api/command/bolus", r#"{"units":1}"#);
    assert_eq!(status, 409);
    assert!(v["error"].as_str().unwrap().contains("suspended"));
}

#[test]
fn bad_bodies_are_400() {
    let mut b = Bench::new();
    let (status, v) = post(&mut b, "/api/command/bolus", "{units:");
    assert_eq!(status, 400);
    assert!(v["error"].is_string());

    let (status, v) = post(&mut b, "/api/command/bolus", "{}");
    assert_eq!(status, 400);
    assert_eq!(v["error"], "missing field 'units'");

    let (status, _) = post(&mut b, "/api/command/bolus", r#"{"units":-2}"#);
    assert_eq!(status, 400);
    assert!(b.hw.calls.is_empty());
}

#[test]
fn unknown_routes_are_404() {
    let mut b = Bench::new();
    assert_eq!(post(&mut b, "/api/command/prime", "").0, 404);
    assert_eq!(call(&mut b, Method::Get, "/api/command/stop", "").0, 404);
    assert_eq!(post(&mut b, "/api/device/info", "").0, 404);
}

#[test]
fn beep_has_no_data_and_sounds_the_buzzer() {
    let mut b = Bench::new();
    let (status, v) = post(&mut b, "/api/command/beep", r#"{"commandId":"b"}"#);
    assert_eq!(status, 200);
    assert!(v.get("data").is_none());
    assert_eq!(
        b.hw.calls,
        vec![HwCall::Tone {
            freq_hz: 2000,
            duration_ms: 300
        }]
    );
}

#[test]
fn temp_basal_and_reset_echo_their_parameters() {
    let mut b = Bench::new();
    let (_, v) = post(
        &mut b,
        "/api/command/temp-basal",
        r#"{"rate":0.8,"durationMinutes":30}"#,
    );
    assert_eq!(v["data"]["durationMinutes"], 30);
    assert!((v["data"]["rate"].as_f64().unwrap() - 0.8).abs() < 1e-6);

    let (_, v) = post(&mut b, "/api/command/reset", "");
    assert_eq!(v["data"]["deviceStatus"], "PRIMING");
    assert_eq!(v["data"]["estimatedRewindDurationMs"], 0);
    assert_eq!(v["commandId"], "");
}

#[test]
fn device_documents_reflect_live_state() {
    let mut b = Bench::new();
    let (status, info) = call(&mut b, Method::Get, "/api/device/info", "");
    assert_eq!(status, 200);
    assert_eq!(info["serialNumber"], "ESP32-PUMP-001");
    assert_eq!(info["hardwareVersion"], "v1.0-WormDrive");
    assert_eq!(info["deviceStatus"], "IDLE");
    assert_eq!(info["reservoirVolume"], 315.0);

    post(&mut b, "/api/command/basal", r#"{"rate":1.0}"#);
    let (_, st) = call(&mut b, Method::Get, "/api/device/status", "");
    assert_eq!(st["deviceStatus"], "DELIVERING_BASAL");
    assert_eq!(st["connectionState"], "AUTHENTICATED_AND_READY");
    assert_eq!(st["timestamp"], EPOCH);
}

#[test]
fn queued_requests_are_answered_by_ticket() {
    let requests: RequestChannel<4> = Channel::new();
    let responses: ResponseChannel<4> = Channel::new();
    let mut b = Bench::new();

    for (ticket, path) in [(1, "/api/command/beep"), (2, "/api/device/status")] {
        let mut p = dosepump::api::channels::Path::new();
        p.push_str(path).unwrap();
        let method = if ticket == 1 { Method::Post } else { Method::Get };
        requests
            .try_send(InboundRequest {
                ticket,
                method,
                path: p,
                body: heapless::Vec::new(),
            })
            .unwrap();
    }

    let clock = RequestClock {
        now_ms: 0,
        epoch_ms: EPOCH,
    };
    let served = serve_pending(&requests, &responses, |req| {
        handle_request(
            &mut b.app,
            req.method,
            &req.path,
            &req.body,
            clock,
            &mut b.hw,
            &mut b.nvs,
            &mut b.sink,
        )
    });
    assert_eq!(served, 2);

    let first = take_response(&responses, 1).unwrap();
    assert_eq!(first.status, 200);
    let second = take_response(&responses, 2).unwrap();
    assert!(second.body.contains("deviceStatus"));
    assert!(take_response(&responses, 1).is_none());
}

#[test]
fn dashboard_reads_the_live_update_payload() {
    let page = dosepump::api::DASHBOARD_HTML;
    assert!(page.contains("new EventSource('/events')"));
    assert!(page.contains("addEventListener('update'"));
    assert!(page.contains("'/api/command/bolus'"));
    assert!(page.contains("'/api/command/reset'"));

    let b = Bench::new();
    let json = update_payload(&b.app.snapshot()).unwrap();
    let v: Value = serde_json::from_str(&json).unwrap();
    for key in [
        "remaining", "capacity", "delivered", "basal", "pending", "rewinding", "suspended",
        "empty", "pumping",
    ] {
        assert!(page.contains(&format!("d.{key}")), "page reads {key}");
        assert!(v.get(key).is_some(), "payload carries {key}");
    }
}

#[test]
fn two_dashboards_both_receive_each_update() {
    let feed: UpdateFeed<4> = UpdateFeed::new();
    let mut b = Bench::new();
    let mut live = LiveUpdateSink::new(&feed);

    let first = render_events(&feed, None);
    assert!(first.contains("data: hello!"));

    b.app
        .handle_command(
            AppCommand::Bolus { units: 1.0 },
            0,
            &mut b.hw,
            &mut b.nvs,
            &mut live,
        )
        .unwrap();

    let a = render_events(&feed, Some("0"));
    let c = render_events(&feed, Some("0"));
    assert_eq!(a, c);
    assert!(a.contains("event: update"));
    assert!(a.contains("\"pumping\":true"));
    assert!(!a.contains("hello!"));
}
