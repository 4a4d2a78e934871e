//! Builder for constructing a workflow engine from configuration.
//!
//! Storage backends are supplied as a map from implementation name to
//! factory function, so the binary decides which backends exist and the
//! configuration decides which one is used.

use crate::clock::{Clock, SystemClock};
use crate::engine::{WorkflowEngine, WorkflowSettings};
use press_config::Config;
use press_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder.
pub struct WorkflowFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

pub struct WorkflowBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl WorkflowBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock, e.g. with a `FixedClock` in tests.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// Builds the engine on the configured primary storage backend.
	///
	/// Only the primary backend is constructed. Its section is validated
	/// against the backend's schema before use.
	pub fn build<SF>(self, factories: WorkflowFactories<SF>) -> Result<WorkflowEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let section = self.config.primary_storage().ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' not found in storage implementations",
				primary
			))
		})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::MissingComponent(format!("storage implementation '{}'", primary))
		})?;

		let backend = factory(section).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary, e
			))
		})?;
		backend.config_schema().validate(section).map_err(|e| {
			BuilderError::Config(format!("Invalid storage configuration for '{}': {}", primary, e))
		})?;
		tracing::info!(component = "storage", implementation = %primary, "Loaded");

		let settings = WorkflowSettings::from(&self.config.workflow);
		tracing::info!(
			workflow = %self.config.workflow.id,
			default_priority = settings.default_priority,
			empty_checklist = %settings.empty_checklist,
			conflict_retries = settings.conflict_retries,
			"Workflow engine ready"
		);

		Ok(WorkflowEngine::new(
			Arc::new(StorageService::new(backend)),
			self.clock,
			settings,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use press_config::ConfigBuilder;
	use press_storage::implementations::memory;

	fn memory_factories() -> WorkflowFactories<press_storage::StorageFactory> {
		let mut storage_factories = HashMap::new();
		storage_factories.insert("memory".to_string(), memory::create_storage as press_storage::StorageFactory);
		WorkflowFactories { storage_factories }
	}

	#[test]
	fn test_builds_with_memory_storage() {
		let config = ConfigBuilder::new().conflict_retries(7).build();
		let engine = WorkflowBuilder::new(config).build(memory_factories()).unwrap();
		assert_eq!(engine.settings().conflict_retries, 7);
	}

	#[test]
	fn test_missing_factory_reported() {
		let config = ConfigBuilder::new().file_storage("/tmp/unused").build();
		let result = WorkflowBuilder::new(config).build(memory_factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}
}
