//! DosePump Firmware — Main Entry Point
//!
//! Hexagonal architecture: one synchronous control loop owns all dosing
//! state; the HTTP server talks to it only through bounded channels.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  PumpHardware      LogEventSink   NvsAdapter    Esp32Time      │
//! │  (Actuator+Buzzer) LiveUpdateSink (Config+NVS)  (uptime/epoch) │
//! │  PrimeButton       DisplaySink    EspHttpServer (REST + SSE)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  DoseScheduler · Reservoir · keep-alive                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use log::{debug, error, info, warn};

use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::ledc::config::TimerConfig;
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::FromValueType;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration as WifiConfig, EspWifi};

use dosepump::adapters::display::DisplaySink;
use dosepump::adapters::hardware::PumpHardware;
use dosepump::adapters::live_sink::LiveUpdateSink;
use dosepump::adapters::log_sink::LogEventSink;
use dosepump::adapters::nvs::NvsAdapter;
use dosepump::adapters::time::Esp32TimeAdapter;
use dosepump::api::channels::{
    InboundRequest, MAX_BODY, Path, REQUEST_CHANNEL, RESPONSE_CHANNEL, serve_pending,
    take_response,
};
use dosepump::api::feed::{UPDATE_FEED, render_events};
use dosepump::api::request::Method;
use dosepump::api::{self, RequestClock};
use dosepump::app::commands::AppCommand;
use dosepump::app::ports::ConfigPort;
use dosepump::app::service::AppService;
use dosepump::config::PumpConfig;
use dosepump::drivers::button::PrimeButton;
use dosepump::drivers::buzzer::{Buzzer, ToneFrequency};
use dosepump::drivers::servo::ServoDriver;
use dosepump::drivers::watchdog::Watchdog;
use dosepump::error::{ActuatorError, Error as FirmwareError};
use dosepump::pins;

/// How long an HTTP handler waits for the control loop.
const RESPONSE_TIMEOUT_MS: u32 = 2_000;
const RESPONSE_POLL_MS: u32 = 5;

static NEXT_TICKET: AtomicU32 = AtomicU32::new(1);

// `Peripherals` pins are typed fields, so the drivers below name them
// directly. Keep these in step with `pins`.
const _: () = assert!(pins::SERVO_GPIO == 18);
const _: () = assert!(pins::BUZZER_GPIO == 25);
const _: () = assert!(pins::BUTTON_GPIO == 4);

// ── Buzzer frequency via the LEDC timer ───────────────────────

/// Retunes LEDC timer 1, which only the buzzer channel uses.
struct LedcTimer1;

impl ToneFrequency for LedcTimer1 {
    fn set_frequency(&mut self, hz: u32) -> Result<(), ActuatorError> {
        use esp_idf_svc::sys::*;
        // SAFETY: timer 1 is owned by the buzzer LEDC channel for the
        // lifetime of the program; only the control loop retunes it.
        let ret = unsafe {
            ledc_set_freq(
                ledc_mode_t_LEDC_LOW_SPEED_MODE,
                ledc_timer_t_LEDC_TIMER_1,
                hz,
            )
        };
        if ret == ESP_OK {
            Ok(())
        } else {
            Err(ActuatorError::PwmWriteFailed)
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  DosePump v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let watchdog = Watchdog::default();
    let clock = Esp32TimeAdapter::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| {
        error!("NVS init failed ({}), halting", e);
        FirmwareError::Config(e)
    })?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            PumpConfig::default()
        }
    };

    // ── 3. Actuators ──────────────────────────────────────────
    info!(
        "Pins: servo={} button={} buzzer={} oled=0x{:02X}@{}/{}",
        pins::SERVO_GPIO,
        pins::BUTTON_GPIO,
        pins::BUZZER_GPIO,
        pins::OLED_I2C_ADDR,
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO
    );

    let servo_timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(50.Hz().into())
            .resolution(Resolution::Bits14),
    )?;
    // pins::SERVO_GPIO
    let servo_pwm = LedcDriver::new(peripherals.ledc.channel0, &servo_timer, peripherals.pins.gpio18)?;
    let servo = ServoDriver::new(servo_pwm).map_err(FirmwareError::from)?;

    let buzzer_timer = LedcTimerDriver::new(
        peripherals.ledc.timer1,
        &TimerConfig::default()
            .frequency(2.kHz().into())
            .resolution(Resolution::Bits10),
    )?;
    // pins::BUZZER_GPIO
    let buzzer_pwm = LedcDriver::new(peripherals.ledc.channel1, &buzzer_timer, peripherals.pins.gpio25)?;
    let buzzer = Buzzer::new(buzzer_pwm, LedcTimer1);

    let mut hw = PumpHardware::new(servo, buzzer, Ets);

    // pins::BUTTON_GPIO
    let mut button_pin = PinDriver::input(peripherals.pins.gpio4)?;
    button_pin.set_pull(Pull::Up)?;
    let mut button = PrimeButton::new(button_pin, config.prime_lockout_ms);

    // ── 4. Network: Wi-Fi STA, SNTP, HTTP ─────────────────────
    let mut wifi = BlockingWifi::wrap(EspWifi::new(peripherals.modem, sysloop.clone(), None)?, sysloop)?;
    let wifi_up = connect_wifi(&mut wifi);
    let _sntp = if wifi_up { Some(EspSntp::new_default()?) } else { None };
    let _server = start_http_server()?;

    // ── 5. Construct app service ──────────────────────────────
    let tick_period_ms = config.tick_period_ms;
    let mut app = AppService::new(config);
    let mut sinks = (
        LogEventSink::new(),
        (LiveUpdateSink::new(&UPDATE_FEED), DisplaySink::new()),
    );
    app.start(&nvs, &mut sinks);

    info!("System ready. Entering control loop ({} ms tick).", tick_period_ms);

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now = clock.uptime_ms();
        watchdog.feed();
        hw.poll(now);

        if button.poll(now) {
            match app.handle_command(AppCommand::PrimeEdge, now, &mut hw, &mut nvs, &mut sinks) {
                Ok(_) => info!("Prime button: pulse"),
                Err(r) => info!("Prime button ignored: {}", r),
            }
        }

        let request_clock = RequestClock {
            now_ms: now,
            epoch_ms: clock.epoch_ms().unwrap_or(0),
        };
        serve_pending(&REQUEST_CHANNEL, &RESPONSE_CHANNEL, |req| {
            api::handle_request(
                &mut app,
                req.method,
                &req.path,
                &req.body,
                request_clock,
                &mut hw,
                &mut nvs,
                &mut sinks,
            )
        });

        app.tick(now, &mut hw, &mut nvs, &mut sinks);

        let display = &mut (sinks.1).1;
        display.set_rssi(if wifi_up { station_rssi() } else { None });
        if let Some(page) = display.take_changed() {
            debug!(
                "OLED | {} | {} | {} | {}",
                page.status, page.remaining, page.basal, page.footer
            );
        }

        FreeRtos::delay_ms(tick_period_ms);
    }
}

// ── Wi-Fi ─────────────────────────────────────────────────────

/// Join the build-time configured network. Returns `false` (and the pump
/// keeps dosing offline) when no SSID is configured or the join fails.
fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> bool {
    let ssid = option_env!("PUMP_WIFI_SSID").unwrap_or("");
    let password = option_env!("PUMP_WIFI_PASS").unwrap_or("");
    if ssid.is_empty() {
        warn!("WiFi: no SSID configured, REST API unreachable");
        return false;
    }

    let (Ok(ssid_h), Ok(pass_h)) = (ssid.try_into(), password.try_into()) else {
        warn!("WiFi: SSID or password too long");
        return false;
    };
    let cfg = WifiConfig::Client(ClientConfiguration {
        ssid: ssid_h,
        password: pass_h,
        ..Default::default()
    });

    let result = wifi
        .set_configuration(&cfg)
        .and_then(|()| wifi.start())
        .and_then(|()| wifi.connect())
        .and_then(|()| wifi.wait_netif_up());
    match result {
        Ok(()) => {
            if let Ok(ip) = wifi.wifi().sta_netif().get_ip_info() {
                info!("WiFi: connected, IP {}", ip.ip);
            }
            true
        }
        Err(e) => {
            warn!("WiFi: connect failed ({}), running offline", e);
            false
        }
    }
}

fn station_rssi() -> Option<i8> {
    use esp_idf_svc::sys::*;
    // SAFETY: plain out-parameter query on the running station interface.
    let mut info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
    let ret = unsafe { esp_wifi_sta_get_ap_info(&mut info) };
    (ret == ESP_OK).then_some(info.rssi)
}

// ── HTTP server ───────────────────────────────────────────────

fn start_http_server() -> Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfig::default())?;

    for route in dosepump::api::request::CommandRoute::ALL {
        server.fn_handler(route.path(), HttpMethod::Post, |req| forward(req, Method::Post))?;
    }
    for path in ["/api/device/info", "/api/device/status"] {
        server.fn_handler(path, HttpMethod::Get, |req| forward(req, Method::Get))?;
    }
    server.fn_handler("/", HttpMethod::Get, |req| {
        let mut resp = req.into_response(200, None, &[("Content-Type", "text/html")])?;
        resp.write_all(api::DASHBOARD_HTML.as_bytes())?;
        Ok::<(), anyhow::Error>(())
    })?;
    server.fn_handler("/events", HttpMethod::Get, stream_updates)?;

    info!("HTTP: server listening");
    Ok(server)
}

/// Queue a request for the control loop and wait for its answer.
fn forward(mut req: Request<&mut EspHttpConnection>, method: Method) -> Result<()> {
    let mut path = Path::new();
    if path.push_str(req.uri()).is_err() {
        return reply(req, 414, r#"{"error":"URI too long"}"#);
    }

    let mut body = heapless::Vec::<u8, MAX_BODY>::new();
    let mut chunk = [0u8; 128];
    loop {
        let n = req.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        if body.extend_from_slice(&chunk[..n]).is_err() {
            return reply(req, 413, r#"{"error":"body too large"}"#);
        }
    }

    let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
    let inbound = InboundRequest {
        ticket,
        method,
        path,
        body,
    };
    if REQUEST_CHANNEL.try_send(inbound).is_err() {
        return reply(req, 503, r#"{"error":"busy, retry"}"#);
    }

    let mut waited = 0;
    while waited < RESPONSE_TIMEOUT_MS {
        if let Some(resp) = take_response(&RESPONSE_CHANNEL, ticket) {
            return reply(req, resp.status, &resp.body);
        }
        FreeRtos::delay_ms(RESPONSE_POLL_MS);
        waited += RESPONSE_POLL_MS;
    }
    warn!("HTTP: ticket {} timed out", ticket);
    reply(req, 504, r#"{"error":"control loop timeout"}"#)
}

fn reply(req: Request<&mut EspHttpConnection>, status: u16, body: &str) -> Result<()> {
    let mut resp = req.into_response(status, None, &[("Content-Type", "application/json")])?;
    resp.write_all(body.as_bytes())?;
    Ok(())
}

/// Server-sent events: one batch of the updates this reader has not seen,
/// then close with a short retry hint so the browser reconnects for the
/// next batch. Every reader tracks its own cursor, so all dashboards get
/// every update.
fn stream_updates(req: Request<&mut EspHttpConnection>) -> Result<()> {
    let body = render_events(&UPDATE_FEED, req.header("Last-Event-ID"));
    let mut resp = req.into_response(
        200,
        None,
        &[("Content-Type", "text/event-stream"), ("Cache-Control", "no-cache")],
    )?;
    resp.write_all(body.as_bytes())?;
    Ok(())
}
