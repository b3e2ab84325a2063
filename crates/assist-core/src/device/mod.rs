//! Device Integration
//!
//! Interfaces to the home's device-state universe and its execution
//! backend. The mediator only reads state through [`DeviceSource`] and only
//! causes side effects through [`DeviceController`].

mod memory;

pub use memory::MemoryHome;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Categories whose devices are offered to the model as controllable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Light,
    Switch,
    Climate,
    Cover,
    Fan,
    MediaPlayer,
    Lock,
    Vacuum,
    Scene,
}

impl DeviceCategory {
    pub const ALL: [Self; 9] = [
        Self::Light,
        Self::Switch,
        Self::Climate,
        Self::Cover,
        Self::Fan,
        Self::MediaPlayer,
        Self::Lock,
        Self::Vacuum,
        Self::Scene,
    ];

    /// Parse a domain name; `None` means the domain is not controllable
    pub fn from_domain(domain: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == domain)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Climate => "climate",
            Self::Cover => "cover",
            Self::Fan => "fan",
            Self::MediaPlayer => "media_player",
            Self::Lock => "lock",
            Self::Vacuum => "vacuum",
            Self::Scene => "scene",
        }
    }
}

/// Raw state of one device as reported by the host
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceState {
    /// Entity identifier, e.g. `light.living_room`
    pub entity_id: String,

    /// Device domain, e.g. `light`
    pub domain: String,

    /// Current state label, e.g. `on`, `heat`, `open`
    pub state: String,

    /// Free-form attributes (`friendly_name`, `brightness`, ...)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl DeviceState {
    /// Build a state whose domain is the entity ID prefix
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let domain = entity_id
            .split_once('.')
            .map(|(domain, _)| domain.to_string())
            .unwrap_or_default();
        Self {
            entity_id,
            domain,
            state: state.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// `friendly_name` attribute, or the entity ID when absent
    pub fn display_name(&self) -> &str {
        self.attributes
            .get("friendly_name")
            .and_then(Value::as_str)
            .unwrap_or(&self.entity_id)
    }
}

/// Read side of the device universe
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Enumerate every known device, in the host's order
    async fn enumerate(&self) -> Result<Vec<DeviceState>>;
}

/// Execution backend for device actions
///
/// `invoke` must resolve only once the device acknowledged the action or
/// the backend gave up.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn invoke(
        &self,
        domain: &str,
        service: &str,
        target_id: &str,
        params: Map<String, Value>,
    ) -> Result<()>;
}
