//! In-Memory Home
//!
//! A device universe held in memory. Implements both collaborator traits so
//! tests and the demo server can run turns end to end without a real home.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{DeviceController, DeviceSource, DeviceState};
use crate::error::{AgentError, Result};

/// One recorded `invoke` call
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub domain: String,
    pub service: String,
    pub target_id: String,
    pub params: Map<String, Value>,
}

/// In-memory device universe with simple service semantics
#[derive(Default)]
pub struct MemoryHome {
    devices: RwLock<Vec<DeviceState>>,
    invocations: RwLock<Vec<Invocation>>,
    latency: Option<Duration>,
}

impl MemoryHome {
    pub fn new(devices: Vec<DeviceState>) -> Self {
        Self {
            devices: RwLock::new(devices),
            ..Default::default()
        }
    }

    /// Delay every `invoke` (for exercising action timeouts)
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// A small furnished home for demos
    pub fn demo() -> Self {
        Self::new(vec![
            DeviceState::new("light.living_room", "on")
                .with_attribute("friendly_name", "Living Room Light")
                .with_attribute("brightness", 128),
            DeviceState::new("light.kitchen", "off")
                .with_attribute("friendly_name", "Kitchen Light"),
            DeviceState::new("switch.coffee_maker", "off")
                .with_attribute("friendly_name", "Coffee Maker"),
            DeviceState::new("climate.hallway", "heat")
                .with_attribute("friendly_name", "Hallway Thermostat")
                .with_attribute("current_temperature", 19.5)
                .with_attribute("temperature", 21.0),
            DeviceState::new("cover.bedroom_blinds", "open")
                .with_attribute("friendly_name", "Bedroom Blinds")
                .with_attribute("current_position", 100),
            DeviceState::new("lock.front_door", "locked")
                .with_attribute("friendly_name", "Front Door"),
            DeviceState::new("media_player.living_room_tv", "paused")
                .with_attribute("friendly_name", "Living Room TV"),
            DeviceState::new("sensor.outdoor_temperature", "7.5")
                .with_attribute("friendly_name", "Outdoor Temperature"),
        ])
    }

    pub fn insert(&self, device: DeviceState) {
        self.devices.write().push(device);
    }

    /// Current state of one device
    pub fn get(&self, entity_id: &str) -> Option<DeviceState> {
        self.devices
            .read()
            .iter()
            .find(|d| d.entity_id == entity_id)
            .cloned()
    }

    /// Every `invoke` call seen so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.read().clone()
    }

    fn apply(device: &mut DeviceState, service: &str, params: &Map<String, Value>) -> Result<()> {
        match service {
            "turn_on" => {
                device.state = "on".into();
                if let Some(pct) = params.get("brightness_pct").and_then(Value::as_f64) {
                    let raw = (pct.clamp(0.0, 100.0) * 255.0 / 100.0).round();
                    device.attributes.insert("brightness".into(), Value::from(raw as u64));
                } else if let Some(raw) = params.get("brightness") {
                    device.attributes.insert("brightness".into(), raw.clone());
                }
            }
            "turn_off" => device.state = "off".into(),
            "toggle" => {
                device.state = if device.state == "on" { "off" } else { "on" }.into();
            }
            "set_temperature" => {
                let target = params.get("temperature").cloned().ok_or_else(|| {
                    AgentError::ActionExecution("set_temperature requires 'temperature'".into())
                })?;
                device.attributes.insert("temperature".into(), target);
            }
            "set_hvac_mode" => {
                let mode = params.get("hvac_mode").and_then(Value::as_str).ok_or_else(|| {
                    AgentError::ActionExecution("set_hvac_mode requires 'hvac_mode'".into())
                })?;
                device.state = mode.to_string();
            }
            "open_cover" => {
                device.state = "open".into();
                device.attributes.insert("current_position".into(), Value::from(100));
            }
            "close_cover" => {
                device.state = "closed".into();
                device.attributes.insert("current_position".into(), Value::from(0));
            }
            "lock" => device.state = "locked".into(),
            "unlock" => device.state = "unlocked".into(),
            "media_play" | "play_media" => device.state = "playing".into(),
            "media_pause" | "pause" => device.state = "paused".into(),
            "start" => device.state = "cleaning".into(),
            "return_to_base" => device.state = "returning".into(),
            other => {
                return Err(AgentError::ActionExecution(format!(
                    "service {}.{other} is not supported",
                    device.domain
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSource for MemoryHome {
    async fn enumerate(&self) -> Result<Vec<DeviceState>> {
        Ok(self.devices.read().clone())
    }
}

#[async_trait]
impl DeviceController for MemoryHome {
    async fn invoke(
        &self,
        domain: &str,
        service: &str,
        target_id: &str,
        params: Map<String, Value>,
    ) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.invocations.write().push(Invocation {
            domain: domain.to_string(),
            service: service.to_string(),
            target_id: target_id.to_string(),
            params: params.clone(),
        });

        let mut devices = self.devices.write();
        let device = devices
            .iter_mut()
            .find(|d| d.entity_id == target_id)
            .ok_or_else(|| AgentError::ActionExecution(format!("entity {target_id} not found")))?;

        if device.domain != domain {
            return Err(AgentError::ActionExecution(format!(
                "entity {target_id} does not belong to domain {domain}"
            )));
        }

        Self::apply(device, service, &params)
    }
}
