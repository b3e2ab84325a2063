//! Device Context
//!
//! Builds the per-turn snapshot of controllable devices that is embedded in
//! the system prompt. Only allow-listed categories are included, attributes
//! are normalized per category, and the list is capped in enumeration order
//! (there is no prioritization of nearby or important devices).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::{DeviceCategory, DeviceSource, DeviceState};
use crate::error::Result;

/// Maximum devices included in one snapshot
pub const MAX_ENTITIES_CONTEXT: usize = 50;

/// Snapshot projection of one controllable device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceContextEntry {
    pub entity_id: String,
    pub state: String,
    pub name: String,

    /// Light brightness as a 0–100 percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_temp: Option<f64>,

    /// Cover position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl DeviceContextEntry {
    /// Project one device; `None` if its category is not controllable
    pub fn from_state(device: &DeviceState) -> Option<Self> {
        let category = DeviceCategory::from_domain(&device.domain)?;

        let mut entry = Self {
            entity_id: device.entity_id.clone(),
            state: device.state.clone(),
            name: device.display_name().to_string(),
            brightness: None,
            current_temp: None,
            target_temp: None,
            position: None,
        };

        let attr = |key: &str| device.attributes.get(key).and_then(Value::as_f64);

        match category {
            DeviceCategory::Light => {
                entry.brightness = attr("brightness")
                    .filter(|b| *b > 0.0)
                    .map(brightness_percent);
            }
            DeviceCategory::Climate => {
                entry.current_temp = attr("current_temperature");
                entry.target_temp = attr("temperature");
            }
            DeviceCategory::Cover => {
                entry.position = device
                    .attributes
                    .get("current_position")
                    .and_then(Value::as_i64);
            }
            _ => {}
        }

        Some(entry)
    }
}

/// Convert a 0–255 brightness to a rounded 0–100 percentage
///
/// Out-of-range input clamps; NaN maps to 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn brightness_percent(raw: f64) -> u8 {
    let pct = (raw.clamp(0.0, 255.0) / 255.0 * 100.0).round();
    pct as u8
}

/// Builds device snapshots from a [`DeviceSource`]
pub struct ContextBuilder {
    source: Arc<dyn DeviceSource>,
    max_entities: usize,
}

impl ContextBuilder {
    pub fn new(source: Arc<dyn DeviceSource>) -> Self {
        Self {
            source,
            max_entities: MAX_ENTITIES_CONTEXT,
        }
    }

    #[must_use]
    pub fn with_max_entities(mut self, max: usize) -> Self {
        self.max_entities = max;
        self
    }

    /// Snapshot the controllable devices, at most `max_entities` of them
    pub async fn build(&self) -> Result<Vec<DeviceContextEntry>> {
        let devices = self.source.enumerate().await?;

        let entries: Vec<_> = devices
            .iter()
            .filter_map(DeviceContextEntry::from_state)
            .take(self.max_entities)
            .collect();

        tracing::debug!(
            total = devices.len(),
            included = entries.len(),
            "Built device context"
        );

        Ok(entries)
    }
}
