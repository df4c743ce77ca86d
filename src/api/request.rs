//! Request decoding: route matching and JSON body parsing.
//!
//! Bodies are small JSON objects; every field is optional at the wire
//! level and checked per route here. Range checks (positive volume,
//! non-negative duration) belong to the scheduler, not to this layer.

use core::fmt;

use serde::Deserialize;

use crate::app::commands::AppCommand;

/// Longest `commandId` echoed back; longer ids are truncated.
pub const COMMAND_ID_LEN: usize = 48;

pub type CommandId = heapless::String<COMMAND_ID_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Command routes under `/api/command/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    Bolus,
    TempBasal,
    Basal,
    Suspend,
    Resume,
    Stop,
    Beep,
    Reset,
}

impl CommandRoute {
    pub const ALL: [Self; 8] = [
        Self::Bolus,
        Self::TempBasal,
        Self::Basal,
        Self::Suspend,
        Self::Resume,
        Self::Stop,
        Self::Beep,
        Self::Reset,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            Self::Bolus => "/api/command/bolus",
            Self::TempBasal => "/api/command/temp-basal",
            Self::Basal => "/api/command/basal",
            Self::Suspend => "/api/command/suspend",
            Self::Resume => "/api/command/resume",
            Self::Stop => "/api/command/stop",
            Self::Beep => "/api/command/beep",
            Self::Reset => "/api/command/reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Command(CommandRoute),
    DeviceInfo,
    DeviceStatus,
}

impl Route {
    /// Match a method and path. The query string, if any, is ignored.
    pub fn parse(method: Method, path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        match method {
            Method::Get => match path {
                "/api/device/info" => Some(Self::DeviceInfo),
                "/api/device/status" => Some(Self::DeviceStatus),
                _ => None,
            },
            Method::Post => CommandRoute::ALL
                .into_iter()
                .find(|r| r.path() == path)
                .map(Self::Command),
        }
    }
}

/// Why a request body could not become a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    MalformedJson,
    MissingField(&'static str),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson => write!(f, "malformed JSON body"),
            Self::MissingField(name) => write!(f, "missing field '{name}'"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandBody {
    command_id: Option<String>,
    units: Option<f32>,
    rate: Option<f32>,
    duration_minutes: Option<i64>,
}

/// Decode a command body. An empty body is treated as `{}`.
pub fn decode_command(
    route: CommandRoute,
    body: &[u8],
) -> Result<(CommandId, AppCommand), RequestError> {
    let parsed: CommandBody = if body.iter().all(u8::is_ascii_whitespace) {
        CommandBody::default()
    } else {
        serde_json::from_slice(body).map_err(|_| RequestError::MalformedJson)?
    };

    let id = truncate_id(parsed.command_id.as_deref().unwrap_or(""));
    let cmd = match route {
        CommandRoute::Bolus => AppCommand::Bolus {
            units: parsed.units.ok_or(RequestError::MissingField("units"))?,
        },
        CommandRoute::TempBasal => AppCommand::SetTempBasal {
            rate: parsed.rate.ok_or(RequestError::MissingField("rate"))?,
            duration_minutes: parsed
                .duration_minutes
                .ok_or(RequestError::MissingField("durationMinutes"))?,
        },
        CommandRoute::Basal => AppCommand::SetBasalRate {
            rate: parsed.rate.ok_or(RequestError::MissingField("rate"))?,
        },
        CommandRoute::Suspend => AppCommand::Suspend,
        CommandRoute::Resume => AppCommand::Resume,
        CommandRoute::Stop => AppCommand::Stop,
        CommandRoute::Beep => AppCommand::Beep,
        CommandRoute::Reset => AppCommand::Reset,
    };
    Ok((id, cmd))
}

fn truncate_id(raw: &str) -> CommandId {
    let mut id = CommandId::new();
    for c in raw.chars() {
        if id.push(c).is_err() {
            break;
        }
    }
    id
}
