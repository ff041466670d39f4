//! # Commands Module - Inbound Command Envelopes
//!
//! Inbound commands arrive as JSON on `reader/<id>/cmd/<family>`. The family is
//! parsed once from the topic into [`CommandFamily`]; the payload is parsed into a
//! typed [`Command`] before anything touches reader state, so a malformed payload
//! never mutates anything.
//!
//! ```json
//! {"action": "start"}
//! {"action": "set", "ant1": 20, "ant2": 20, "ant3": 20, "ant4": 20}
//! ```
//!
//! Every command produces exactly one [`Response`]:
//!
//! ```json
//! {"command": "power", "action": "set", "status": "success", "message": "Power set", "ant1": 20, ...}
//! ```
//!
//! Execution lives on [`crate::gateway::Gateway::dispatch`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::CommandError;

pub const POWER_MIN_DBM: i64 = 0;
pub const POWER_MAX_DBM: i64 = 33;

const POWER_FIELDS: [&str; 4] = ["ant1", "ant2", "ant3", "ant4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandFamily {
    Rfid,
    Power,
    /// Legacy alias of `Rfid`.
    Inventory,
}

impl CommandFamily {
    pub const ALL: [CommandFamily; 3] = [
        CommandFamily::Rfid,
        CommandFamily::Power,
        CommandFamily::Inventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandFamily::Rfid => "rfid",
            CommandFamily::Power => "power",
            CommandFamily::Inventory => "inventory",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "rfid" => Some(CommandFamily::Rfid),
            "power" => Some(CommandFamily::Power),
            "inventory" => Some(CommandFamily::Inventory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryAction {
    Start,
    Stop,
    Status,
    /// Current tag snapshot.
    Get,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Set([u8; 4]),
    /// `get` and `query` both send a fresh query to the reader.
    Query,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Inventory(InventoryAction),
    Power(PowerAction),
}

/// A parsed command together with the action name the caller used, which is
/// echoed back in the response (`get` and `query` are both accepted for power).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub action: String,
}

/// Parse a command payload for `family`. On error, the second element is the
/// action name when one could be read, for the error response.
pub fn parse(family: CommandFamily, payload: &[u8]) -> Result<Request, (CommandError, String)> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|_| (CommandError::InvalidPayload, String::new()))?;
    let obj = value
        .as_object()
        .ok_or((CommandError::InvalidPayload, String::new()))?;
    let action = match obj.get("action").and_then(Value::as_str) {
        Some(a) => a.to_string(),
        None => return Err((CommandError::MissingAction, String::new())),
    };
    match parse_action(family, &action, obj) {
        Ok(command) => Ok(Request { command, action }),
        Err(e) => Err((e, action)),
    }
}

fn parse_action(
    family: CommandFamily,
    action: &str,
    obj: &Map<String, Value>,
) -> Result<Command, CommandError> {
    let unknown = || CommandError::UnknownAction {
        family: family.as_str().to_string(),
        action: action.to_string(),
    };
    match family {
        CommandFamily::Rfid | CommandFamily::Inventory => {
            let a = match action {
                "start" => InventoryAction::Start,
                "stop" => InventoryAction::Stop,
                "status" => InventoryAction::Status,
                "get" => InventoryAction::Get,
                _ => return Err(unknown()),
            };
            Ok(Command::Inventory(a))
        }
        CommandFamily::Power => {
            let a = match action {
                "set" => PowerAction::Set(power_levels(obj)?),
                "get" | "query" => PowerAction::Query,
                "status" => PowerAction::Status,
                _ => return Err(unknown()),
            };
            Ok(Command::Power(a))
        }
    }
}

fn power_levels(obj: &Map<String, Value>) -> Result<[u8; 4], CommandError> {
    let mut levels = [0u8; 4];
    for (slot, field) in levels.iter_mut().zip(POWER_FIELDS) {
        let value = obj
            .get(field)
            .and_then(Value::as_i64)
            .ok_or(CommandError::InvalidField(field))?;
        if !(POWER_MIN_DBM..=POWER_MAX_DBM).contains(&value) {
            return Err(CommandError::PowerOutOfRange {
                field,
                value,
                min: POWER_MIN_DBM,
                max: POWER_MAX_DBM,
            });
        }
        *slot = value as u8;
    }
    Ok(levels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub command: String,
    pub action: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    pub fn new(family: CommandFamily, action: &str, status: ResponseStatus) -> Self {
        Self {
            command: family.as_str().to_string(),
            action: action.to_string(),
            status,
            message: None,
            fields: Map::new(),
        }
    }

    pub fn success(family: CommandFamily, action: &str, message: impl Into<String>) -> Self {
        Self::new(family, action, ResponseStatus::Success).with_message(message)
    }

    pub fn info(family: CommandFamily, action: &str) -> Self {
        Self::new(family, action, ResponseStatus::Info)
    }

    pub fn error(family: CommandFamily, action: &str, err: &CommandError) -> Self {
        Self::new(family, action, ResponseStatus::Error).with_message(err.to_string())
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Merge the keys of a serializable object into the response.
    pub fn with_fields<T: Serialize>(mut self, value: &T) -> Self {
        if let Ok(Value::Object(map)) = serde_json::to_value(value) {
            self.fields.extend(map);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_alias_parses_like_rfid() {
        for family in [CommandFamily::Rfid, CommandFamily::Inventory] {
            assert_eq!(
                parse(family, br#"{"action":"start"}"#).unwrap().command,
                Command::Inventory(InventoryAction::Start)
            );
        }
    }

    #[test]
    fn power_set_requires_all_levels_in_range() {
        let cmd = parse(
            CommandFamily::Power,
            br#"{"action":"set","ant1":20,"ant2":21,"ant3":22,"ant4":23}"#,
        )
        .unwrap();
        assert_eq!(cmd.command, Command::Power(PowerAction::Set([20, 21, 22, 23])));

        let (err, action) =
            parse(CommandFamily::Power, br#"{"action":"set","ant1":20}"#).unwrap_err();
        assert_eq!(err, CommandError::InvalidField("ant2"));
        assert_eq!(action, "set");

        let (err, _) = parse(
            CommandFamily::Power,
            br#"{"action":"set","ant1":20,"ant2":40,"ant3":22,"ant4":23}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::PowerOutOfRange { field: "ant2", value: 40, .. }));
    }

    #[test]
    fn power_query_aliases_keep_their_name() {
        for alias in ["get", "query"] {
            let payload = format!(r#"{{"action":"{}"}}"#, alias);
            let request = parse(CommandFamily::Power, payload.as_bytes()).unwrap();
            assert_eq!(request.command, Command::Power(PowerAction::Query));
            assert_eq!(request.action, alias);
        }
    }

    #[test]
    fn malformed_and_unknown() {
        let (err, _) = parse(CommandFamily::Rfid, b"{not json").unwrap_err();
        assert_eq!(err, CommandError::InvalidPayload);
        let (err, _) = parse(CommandFamily::Rfid, b"[1,2]").unwrap_err();
        assert_eq!(err, CommandError::InvalidPayload);
        let (err, _) = parse(CommandFamily::Rfid, br#"{"cmd":"start"}"#).unwrap_err();
        assert_eq!(err, CommandError::MissingAction);
        let (err, action) = parse(CommandFamily::Power, br#"{"action":"boost"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown power action: boost");
        assert_eq!(action, "boost");
    }

    #[test]
    fn response_shape() {
        let r = Response::success(CommandFamily::Power, "set", "Power set").with_field("ant1", 20);
        let v: Value = serde_json::from_slice(&r.to_json()).unwrap();
        assert_eq!(v["command"], "power");
        assert_eq!(v["status"], "success");
        assert_eq!(v["ant1"], 20);

        let r = Response::info(CommandFamily::Rfid, "status");
        let v: Value = serde_json::from_slice(&r.to_json()).unwrap();
        assert!(v.get("message").is_none());
        assert_eq!(v["status"], "info");
    }
}
