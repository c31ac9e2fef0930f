//! Detector registry
//!
//! Owns the detectors keyed by id and remembers registration order.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::detector::Detector;
use crate::models::types::DetectorInfo;

/// Registry entry as seen by callers
#[derive(Clone)]
pub struct DetectorDescriptor {
    pub id: String,
    pub detector: Arc<dyn Detector>,
    pub enabled: bool,
}

impl DetectorDescriptor {
    pub fn info(&self) -> DetectorInfo {
        self.detector.info()
    }
}

impl std::fmt::Debug for DetectorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorDescriptor")
            .field("id", &self.id)
            .field("name", &self.detector.name())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Registry that owns the detectors, keyed by id, in registration order.
pub struct DetectorRegistry {
    entries: Vec<(String, Arc<dyn Detector>)>,
    index: HashMap<String, usize>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a detector. Last write wins; a replaced id keeps its
    /// original position.
    pub fn register(&mut self, id: impl Into<String>, detector: Arc<dyn Detector>) {
        let id = id.into();
        info!("📌 Registered detector: {} - {}", id, detector.name());
        match self.index.get(&id) {
            Some(&slot) => self.entries[slot].1 = detector,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, detector));
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Detector>> {
        self.index
            .get(id)
            .map(|&slot| Arc::clone(&self.entries[slot].1))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All entries in registration order
    pub fn list_all(&self) -> Vec<DetectorDescriptor> {
        self.entries
            .iter()
            .map(|(id, detector)| DetectorDescriptor {
                id: id.clone(),
                detector: Arc::clone(detector),
                enabled: detector.is_enabled(),
            })
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Ids of enabled detectors, in registration order
    pub fn active_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, detector)| detector.is_enabled())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Enable a detector by id. Returns false for unknown ids.
    pub fn enable(&self, id: &str) -> bool {
        match self.get(id) {
            Some(detector) => {
                detector.enable();
                true
            }
            None => {
                warn!("Could not find detector '{}'", id);
                false
            }
        }
    }

    /// Disable a detector by id. Returns false for unknown ids.
    pub fn disable(&self, id: &str) -> bool {
        match self.get(id) {
            Some(detector) => {
                detector.disable();
                true
            }
            None => {
                warn!("Could not find detector '{}'", id);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
