use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation kind that never contributes to sums: a human-readable balance
/// snapshot recorded at a point in time.
pub const KIND_CHECK: &str = "check";
pub const KIND_NORMAL: &str = "normal";

// ---------------------------------------------------------------------------
// Local rows (SQLite shapes; timestamps are epoch ms, `deleted` is 0/1)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Currency {
    pub id: String,
    pub currency_no: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub client_no: i64,
    pub name: String,
    pub contact: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Operation {
    pub id: String,
    pub client_id: String,
    pub operation_no: i64,
    pub kind: String,
    pub value: f64,
    pub currency_id: Option<String>,
    pub time_ms: Option<i64>,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

/// Legacy entity. Schema retained for remotes that still hold balance docs;
/// push mirrors it, nothing else touches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Balance {
    pub id: String,
    pub client_id: String,
    pub balance_no: i64,
    pub value: f64,
    pub currency_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Wire timestamps
// ---------------------------------------------------------------------------

/// A timestamp as a remote document may carry it: epoch ms, an ISO-8601
/// string, or a Firestore-style `{seconds, nanoseconds}` object. Older
/// backends emitted all three across schema revisions; every reader funnels
/// through [`WireTimestamp::to_ms`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    EpochMs(i64),
    Iso(String),
    Seconds {
        seconds: i64,
        #[serde(default, alias = "nanos")]
        nanoseconds: u32,
    },
}

impl WireTimestamp {
    /// Normalize to epoch ms. Unparseable ISO strings yield `None` so the
    /// caller can substitute "now" rather than persist garbage.
    pub fn to_ms(&self) -> Option<i64> {
        match self {
            WireTimestamp::EpochMs(ms) => Some(*ms),
            WireTimestamp::Iso(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.timestamp_millis()),
            WireTimestamp::Seconds {
                seconds,
                nanoseconds,
            } => Some(seconds * 1000 + i64::from(*nanoseconds) / 1_000_000),
        }
    }
}

/// `createdAt`/`updatedAt` may be absent entirely; never null locally.
pub fn normalize_ts(ts: Option<&WireTimestamp>, now: i64) -> i64 {
    ts.and_then(WireTimestamp::to_ms).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Wire documents (legacy Firestore field spellings, everything optional)
// ---------------------------------------------------------------------------
//
// Remote shapes drifted across app revisions, so each doc type is a loose
// record with explicit optionals plus one pure `normalize` step into the
// concrete local row. Tri-state `deleted` (true / false / absent) collapses
// to a bool here; absent means active.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrencyDoc {
    #[serde(default)]
    pub currency_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<WireTimestamp>,
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<WireTimestamp>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

impl CurrencyDoc {
    pub fn normalize(self, id: &str, now: i64) -> Currency {
        Currency {
            id: id.to_string(),
            currency_no: self.currency_id.unwrap_or(0),
            name: self.name.unwrap_or_default(),
            created_at: normalize_ts(self.created_at.as_ref(), now),
            updated_at: normalize_ts(self.updated_at.as_ref(), now),
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientDoc {
    #[serde(default, rename = "Clients_id")]
    pub clients_id: Option<i64>,
    #[serde(default, rename = "Clients_name")]
    pub clients_name: Option<String>,
    #[serde(default, rename = "Clients_contact")]
    pub clients_contact: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<WireTimestamp>,
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<WireTimestamp>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

impl ClientDoc {
    pub fn normalize(self, id: &str, now: i64) -> Client {
        Client {
            id: id.to_string(),
            client_no: self.clients_id.unwrap_or(0),
            name: self.clients_name.unwrap_or_default(),
            contact: self.clients_contact.unwrap_or_default(),
            created_at: normalize_ts(self.created_at.as_ref(), now),
            updated_at: normalize_ts(self.updated_at.as_ref(), now),
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationDoc {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub operation_id: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    /// Currency doc id as a plain string (or null) on the wire.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub time: Option<WireTimestamp>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<WireTimestamp>,
    #[serde(default, rename = "updatedAt")]
    pub updated_at: Option<WireTimestamp>,
    #[serde(default)]
    pub deleted: Option<bool>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

impl OperationDoc {
    /// `currency_id` is the already-resolved local currency id (None when
    /// the referenced currency does not exist locally).
    pub fn normalize(self, id: &str, currency_id: Option<String>, now: i64) -> Operation {
        Operation {
            id: id.to_string(),
            client_id: self.client_id.unwrap_or_default(),
            operation_no: self.operation_id.unwrap_or(0),
            kind: self.kind.unwrap_or_else(|| KIND_NORMAL.to_string()),
            value: self.value.unwrap_or(0.0),
            currency_id,
            time_ms: self.time.as_ref().and_then(WireTimestamp::to_ms),
            description: self.desc,
            created_at: normalize_ts(self.created_at.as_ref(), now),
            updated_at: normalize_ts(self.updated_at.as_ref(), now),
            deleted: self.deleted.unwrap_or(false),
        }
    }
}

/// Parse a raw remote document body into a typed doc. Unknown fields are
/// ignored; missing ones fall back to the defaults above.
pub fn parse_doc<T: serde::de::DeserializeOwned>(fields: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(fields.clone())
}
