//! # Integrator Wire Types
//!
//! Request and response shapes exchanged with the POS-group service.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Integrator Endpoints                               │
//! │                                                                         │
//! │  GET  <base>/server/svr_pos_user.php?act=<action>&...                  │
//! │  ─────────────────────────────────────────────────                     │
//! │  getGroupPos         group_pos, browser, waktu, pc_location, ...       │
//! │  updateLoginProcess  id, status                                        │
//! │  updateBranchId      branch_id, id                                     │
//! │  updatePosToken      token, id, status                                 │
//! │  updateLastDate      id, last_data, last_date                          │
//! │                                                                         │
//! │  POST <base>/server/svr_group_pos.php?act=updatePos                    │
//! │  ──────────────────────────────────────────────────                    │
//! │  body: [ { "status": "...", "data": "...", ... }, ... ]                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Response Normalisation
//! A body that parses as a JSON object is used as-is. Anything else (plain
//! text, HTML error pages, JSON arrays or scalars) becomes
//! `{ "response": "<raw body>" }`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kasir_core::{Fields, SqlValue};

/// Path of the single-request endpoint.
pub const POS_USER_PATH: &str = "server/svr_pos_user.php";

/// Path of the bulk endpoint.
pub const GROUP_POS_PATH: &str = "server/svr_group_pos.php";

// =============================================================================
// Actions
// =============================================================================

/// Value of the `act` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetGroupPos,
    UpdateLoginProcess,
    UpdateBranchId,
    UpdatePosToken,
    UpdateLastDate,
    /// Bulk POST only.
    UpdatePos,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetGroupPos => "getGroupPos",
            Action::UpdateLoginProcess => "updateLoginProcess",
            Action::UpdateBranchId => "updateBranchId",
            Action::UpdatePosToken => "updatePosToken",
            Action::UpdateLastDate => "updateLastDate",
            Action::UpdatePos => "updatePos",
        }
    }

    /// Endpoint path the action is sent to.
    pub fn path(&self) -> &'static str {
        match self {
            Action::UpdatePos => GROUP_POS_PATH,
            _ => POS_USER_PATH,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A normalised service response: always a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PosResponse(Map<String, Value>);

impl PosResponse {
    /// Normalises a raw response body.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_sync::PosResponse;
    ///
    /// let parsed = PosResponse::from_body(r#"{"status":"ok"}"#);
    /// assert_eq!(parsed.get_str("status"), Some("ok"));
    ///
    /// let raw = PosResponse::from_body("Server busy");
    /// assert_eq!(raw.get_str("response"), Some("Server busy"));
    /// ```
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => PosResponse(map),
            _ => {
                let mut map = Map::new();
                map.insert("response".to_string(), Value::String(body.to_string()));
                PosResponse(map)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// True when the body was not a JSON object and was wrapped.
    pub fn is_raw(&self) -> bool {
        self.0.len() == 1 && self.get_str("response").is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Result of a bulk update that reached the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkUpdateOutcome {
    /// Always `true`; failures are reported as `Err` instead.
    pub success: bool,
    /// Raw response body.
    pub response: String,
}

// =============================================================================
// Bulk Items
// =============================================================================

/// One item of a bulk last-date update.
///
/// `status` and `data` are required; any other keys are passed through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosLastDate {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PosLastDate {
    pub fn new(status: impl Into<String>, data: impl Into<String>) -> Self {
        PosLastDate {
            status: status.into(),
            data: data.into(),
            extra: Map::new(),
        }
    }

    /// Adds a pass-through key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Column/value form for the local mirror table.
    ///
    /// `status` and `data` come first, then the extra keys in key order.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new()
            .with("status", self.status.as_str())
            .with("data", self.data.as_str());
        for (key, value) in &self.extra {
            fields.set(key.as_str(), SqlValue::from_json(value));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_paths() {
        assert_eq!(Action::GetGroupPos.path(), POS_USER_PATH);
        assert_eq!(Action::UpdateLastDate.as_str(), "updateLastDate");
        assert_eq!(Action::UpdatePos.path(), GROUP_POS_PATH);
    }

    #[test]
    fn test_response_normalisation() {
        let object = PosResponse::from_body(r#"{"status":"success","rows":2}"#);
        assert_eq!(object.get_str("status"), Some("success"));
        assert_eq!(object.get("rows"), Some(&Value::from(2)));
        assert!(!object.is_raw());

        // Arrays and scalars are valid JSON but not objects.
        for body in ["[1,2]", "42", "\"text\"", "<html>oops</html>", ""] {
            let wrapped = PosResponse::from_body(body);
            assert_eq!(wrapped.get_str("response"), Some(body));
            assert!(wrapped.is_raw());
        }
    }

    #[test]
    fn test_pos_last_date_flattens_extra_keys() {
        let item = PosLastDate::new("1", "2024-01-01").with("id", 7);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, serde_json::json!({"status": "1", "data": "2024-01-01", "id": 7}));

        let parsed: PosLastDate = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_pos_last_date_to_fields() {
        let fields = PosLastDate::new("1", "x").with("id", 7).to_fields();
        assert_eq!(fields.columns(), vec!["status", "data", "id"]);
        assert_eq!(fields.get("id"), Some(&SqlValue::Int(7)));
    }
}
