use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FIELD_WIN_DATE: &str = "date_of_win";
pub const FIELD_AMOUNT: &str = "prize_amount_usd";
pub const FIELD_SUBJECT_NAME: &str = "name";
pub const FIELD_RETAILER: &str = "retailer";
pub const FIELD_RETAILER_LOCATION: &str = "retailer_location";
pub const FIELD_GAME: &str = "game";

/// One win entry as returned by the service.
///
/// The engine treats it as an opaque JSON object; only the identity
/// projection and a handful of read-only accessors look inside.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WinRecord(Map<String, Value>);

impl WinRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accepts only JSON objects; anything else is not a record.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Prize amount as a number; numeric strings such as `"600.00"` are accepted.
    pub fn amount(&self) -> Option<f64> {
        match self.get(FIELD_AMOUNT)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            win_date: self.key_part(FIELD_WIN_DATE),
            amount: self.key_part(FIELD_AMOUNT),
            subject_name: self.key_part(FIELD_SUBJECT_NAME),
            retailer: self.key_part(FIELD_RETAILER),
            retailer_location: self.key_part(FIELD_RETAILER_LOCATION),
        }
    }

    /// JSON text of the field, so `600` and `"600"` stay distinct.
    fn key_part(&self, field: &str) -> Option<String> {
        self.get(field).map(Value::to_string)
    }
}

impl From<Map<String, Value>> for WinRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Logical identity of a record. `None` marks an absent or null field; two
/// absent fields compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub win_date: Option<String>,
    pub amount: Option<String>,
    pub subject_name: Option<String>,
    pub retailer: Option<String>,
    pub retailer_location: Option<String>,
}
