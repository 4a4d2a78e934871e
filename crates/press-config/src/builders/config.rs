//! Builder for test and development configurations.

use crate::{Config, StorageConfig, WorkflowConfig};
use press_types::{EmptyChecklistPolicy, DEFAULT_PRIORITY};
use std::collections::HashMap;

/// Builds a valid [`Config`] with in-memory storage unless told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	workflow_id: String,
	default_priority: u32,
	empty_checklist: EmptyChecklistPolicy,
	conflict_retries: u32,
	storage_primary: String,
	storage_section: toml::Value,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			workflow_id: "test-plant".to_string(),
			default_priority: DEFAULT_PRIORITY,
			empty_checklist: EmptyChecklistPolicy::default(),
			conflict_retries: 3,
			storage_primary: "memory".to_string(),
			storage_section: toml::Value::Table(toml::map::Map::new()),
		}
	}

	pub fn workflow_id(mut self, id: impl Into<String>) -> Self {
		self.workflow_id = id.into();
		self
	}

	pub fn default_priority(mut self, priority: u32) -> Self {
		self.default_priority = priority;
		self
	}

	pub fn empty_checklist(mut self, policy: EmptyChecklistPolicy) -> Self {
		self.empty_checklist = policy;
		self
	}

	pub fn conflict_retries(mut self, retries: u32) -> Self {
		self.conflict_retries = retries;
		self
	}

	/// Uses the file backend rooted at `path`.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut section = toml::map::Map::new();
		section.insert("storage_path".to_string(), toml::Value::String(path.into()));
		self.storage_primary = "file".to_string();
		self.storage_section = toml::Value::Table(section);
		self
	}

	pub fn build(self) -> Config {
		let mut implementations = HashMap::new();
		implementations.insert(self.storage_primary.clone(), self.storage_section);

		Config {
			workflow: WorkflowConfig {
				id: self.workflow_id,
				default_priority: self.default_priority,
				empty_checklist: self.empty_checklist,
				conflict_retries: self.conflict_retries,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations,
			},
		}
	}
}
