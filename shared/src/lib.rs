use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ===== ERRORS =====

/// Raised when a value that must be a keyed record is something else.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("{found} is not a record")]
    NotARecord { found: String },
    #[error("record has no numeric `id`: {found}")]
    MissingId { found: String },
    #[error("record has no `{field}` field")]
    MissingField { field: String },
}

// ===== MESSAGE TYPES =====

/// Socket envelope, serialized as `{"type": <kind>, ...payload}`.
///
/// The payload is opaque to the session layer. A `type` key inside the
/// payload is dropped so the envelope discriminator always wins.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SocketMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl SocketMessage {
    pub fn new(kind: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        payload.remove("type");
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Envelope with no payload fields.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Map::new())
    }

    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_wire(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl TryFrom<Value> for SocketMessage {
    type Error = ShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err(ShapeError::NotARecord {
                found: value.to_string(),
            });
        };
        match map.remove("type") {
            Some(Value::String(kind)) => Ok(Self::new(kind, map)),
            _ => Err(ShapeError::MissingField {
                field: "type".to_string(),
            }),
        }
    }
}

/// Client -> server spider commands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UpMsg {
    Run {
        #[serde(rename = "spiderId")]
        spider_id: u64,
    },
    Stop {
        #[serde(rename = "spiderId")]
        spider_id: u64,
    },
}

impl UpMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            UpMsg::Run { .. } => "run",
            UpMsg::Stop { .. } => "stop",
        }
    }

    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        match self {
            UpMsg::Run { spider_id } | UpMsg::Stop { spider_id } => {
                payload.insert("spiderId".to_string(), Value::from(*spider_id));
            }
        }
        payload
    }

    pub fn to_envelope(&self) -> SocketMessage {
        SocketMessage::new(self.kind(), self.payload())
    }
}

/// Run-status pushes for the spider detail view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DownMsg {
    RunStarted {
        #[serde(rename = "spiderId")]
        spider_id: u64,
    },
    RunProgress {
        #[serde(rename = "spiderId")]
        spider_id: u64,
        #[serde(rename = "pagesCrawled")]
        pages_crawled: u64,
    },
    RunFinished {
        #[serde(rename = "spiderId")]
        spider_id: u64,
        #[serde(rename = "itemsScraped")]
        items_scraped: u64,
    },
    RunFailed {
        #[serde(rename = "spiderId")]
        spider_id: u64,
        error: String,
    },
}

impl DownMsg {
    pub fn spider_id(&self) -> u64 {
        match self {
            DownMsg::RunStarted { spider_id }
            | DownMsg::RunProgress { spider_id, .. }
            | DownMsg::RunFinished { spider_id, .. }
            | DownMsg::RunFailed { spider_id, .. } => *spider_id,
        }
    }

    /// True while the pushed status means the spider is still crawling.
    pub fn is_running(&self) -> bool {
        matches!(self, DownMsg::RunStarted { .. } | DownMsg::RunProgress { .. })
    }
}

// ===== RECORD TYPES =====

/// Anything carrying a numeric identity.
pub trait Identified {
    fn id(&self) -> u64;
}

/// Keyed record as returned by the CRUD backend: a mandatory numeric `id`
/// plus arbitrary fields, serialized flat.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "Value")]
pub struct Record {
    pub id: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field lookup that treats `id` like any other field.
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == "id" {
            Some(Value::from(self.id))
        } else {
            self.fields.get(name).cloned()
        }
    }
}

impl Identified for Record {
    fn id(&self) -> u64 {
        self.id
    }
}

impl TryFrom<Value> for Record {
    type Error = ShapeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err(ShapeError::NotARecord {
                found: value.to_string(),
            });
        };
        let Some(id) = map.get("id").and_then(Value::as_u64) else {
            return Err(ShapeError::MissingId {
                found: Value::Object(map).to_string(),
            });
        };
        map.remove("id");
        Ok(Self { id, fields: map })
    }
}

/// One row of the spider detail proxy editor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Proxy {
    pub id: u64,
    pub netloc: Option<String>,
    pub address: Option<String>,
}

impl Proxy {
    pub fn empty(id: u64) -> Self {
        Self {
            id,
            netloc: None,
            address: None,
        }
    }
}

impl Identified for Proxy {
    fn id(&self) -> u64 {
        self.id
    }
}

// ===== CONFIG TYPES =====

pub const DEFAULT_HOST_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_PAGE_SCHEME: &str = "http";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ToolkitConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub socket: SocketSection,
}

impl ToolkitConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// The version field lets a loader detect configs written by a newer format
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSection {
    pub version: String,
}

impl AppSection {
    /// Current configuration format version
    pub const CURRENT_VERSION: &'static str = "1.0.0";

    pub fn is_supported_version(&self) -> bool {
        self.version == Self::CURRENT_VERSION
    }
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
        }
    }
}

/// Where the socket endpoint lives. `page_scheme` is the scheme the admin
/// page itself was served with; it picks `ws://` or `wss://`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SocketSection {
    pub host: String,
    pub page_scheme: String,
}

impl Default for SocketSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST_ADDRESS.to_string(),
            page_scheme: DEFAULT_PAGE_SCHEME.to_string(),
        }
    }
}
