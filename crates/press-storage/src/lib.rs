//! Storage module for the press workflow.
//!
//! This module provides the persistence collaborator used by the workflow
//! core. Backends implement a small byte-level interface with one atomic,
//! conditional batch commit; [`StorageService`] layers typed access, predicate
//! queries and the [`UnitOfWork`] on top of it.
//!
//! Optimistic concurrency works by recording, for every row an operation read
//! while deciding what to do, the exact bytes it saw. The backend applies the
//! batch only if every such row is still byte-for-byte unchanged (or still
//! absent), otherwise the whole batch is rejected with
//! [`StorageError::Conflict`].

use async_trait::async_trait;
use press_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// A commit precondition failed because a competing writer changed the row.
	#[error("Conflicting write on key '{0}'")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A condition that must hold for a batch to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
	pub key: String,
	/// Bytes the key must currently hold, or `None` if it must not exist.
	pub expected: Option<Vec<u8>>,
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOperation {
	Put { key: String, value: Vec<u8> },
	Delete { key: String },
}

impl WriteOperation {
	pub fn key(&self) -> &str {
		match self {
			WriteOperation::Put { key, .. } | WriteOperation::Delete { key } => key,
		}
	}
}

/// A set of preconditions and writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
	pub preconditions: Vec<Precondition>,
	pub operations: Vec<WriteOperation>,
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the workflow. Keys have the form `namespace:id`.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes unconditionally.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists every key starting with `prefix`, sorted ascending.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Atomically checks every precondition and applies every operation.
	///
	/// Returns the number of rows written or deleted. If any precondition does
	/// not hold, nothing is written and [`StorageError::Conflict`] names the
	/// first offending key.
	async fn commit(&self, batch: WriteBatch) -> Result<usize, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Builds the backend key for a row.
pub fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// A value read together with the exact bytes it was decoded from.
///
/// Passing it to [`UnitOfWork::expect_unchanged`] makes the commit fail if
/// the row changed after it was read.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
	pub value: T,
	key: String,
	raw: Vec<u8>,
}

impl<T> Tracked<T> {
	pub fn into_inner(self) -> T {
		self.value
	}
}

/// Accumulates the preconditions and writes of one operation.
#[derive(Debug, Default)]
pub struct UnitOfWork {
	batch: WriteBatch,
}

impl UnitOfWork {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requires the tracked row to be unchanged at commit time.
	pub fn expect_unchanged<T>(&mut self, tracked: &Tracked<T>) {
		self.batch.preconditions.push(Precondition {
			key: tracked.key.clone(),
			expected: Some(tracked.raw.clone()),
		});
	}

	/// Requires the row to still be absent at commit time.
	pub fn expect_absent(&mut self, namespace: &str, id: &str) {
		self.batch.preconditions.push(Precondition {
			key: storage_key(namespace, id),
			expected: None,
		});
	}

	/// Stages a serialized write.
	pub fn put<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let value =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.batch.operations.push(WriteOperation::Put {
			key: storage_key(namespace, id),
			value,
		});
		Ok(())
	}

	/// Stages a deletion.
	pub fn delete(&mut self, namespace: &str, id: &str) {
		self.batch.operations.push(WriteOperation::Delete {
			key: storage_key(namespace, id),
		});
	}

	pub fn is_empty(&self) -> bool {
		self.batch.operations.is_empty()
	}

	pub fn into_batch(self) -> WriteBatch {
		self.batch
	}
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic JSON serialization.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value unconditionally.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&storage_key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		self.retrieve_tracked(namespace, id)
			.await
			.map(Tracked::into_inner)
	}

	/// Retrieves a value and remembers the bytes it was read from.
	pub async fn retrieve_tracked<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Tracked<T>, StorageError> {
		let key = storage_key(namespace, id);
		let raw = self.backend.get_bytes(&key).await?;
		let value =
			serde_json::from_slice(&raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Tracked { value, key, raw })
	}

	/// Returns every row of a namespace matching the predicate, tracked.
	///
	/// Rows are returned in key order. Rows deleted between listing and
	/// reading are skipped.
	pub async fn find_tracked<T, F>(
		&self,
		namespace: &str,
		predicate: F,
	) -> Result<Vec<Tracked<T>>, StorageError>
	where
		T: DeserializeOwned,
		F: Fn(&T) -> bool,
	{
		self.find_tracked_with_prefix(&storage_key(namespace, ""), predicate)
			.await
	}

	/// Like [`find_tracked`](Self::find_tracked) but restricted to keys with
	/// the given full prefix.
	pub async fn find_tracked_with_prefix<T, F>(
		&self,
		prefix: &str,
		predicate: F,
	) -> Result<Vec<Tracked<T>>, StorageError>
	where
		T: DeserializeOwned,
		F: Fn(&T) -> bool,
	{
		let keys = self.backend.list_keys(prefix).await?;
		let mut rows = Vec::with_capacity(keys.len());
		for key in keys {
			let raw = match self.backend.get_bytes(&key).await {
				Ok(raw) => raw,
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			};
			let value: T = serde_json::from_slice(&raw)
				.map_err(|e| StorageError::Serialization(format!("{}: {}", key, e)))?;
			if predicate(&value) {
				rows.push(Tracked { value, key, raw });
			}
		}
		Ok(rows)
	}

	/// Returns every row of a namespace matching the predicate.
	pub async fn find<T, F>(&self, namespace: &str, predicate: F) -> Result<Vec<T>, StorageError>
	where
		T: DeserializeOwned,
		F: Fn(&T) -> bool,
	{
		Ok(self
			.find_tracked(namespace, predicate)
			.await?
			.into_iter()
			.map(Tracked::into_inner)
			.collect())
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&storage_key(namespace, id)).await
	}

	/// Updates an existing value in storage.
	///
	/// Returns an error if the key doesn't exist, making it semantically different
	/// from store() which will create or overwrite.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		if !self.exists(namespace, id).await? {
			return Err(StorageError::NotFound);
		}
		self.store(namespace, id, data).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	/// Reserves `count` consecutive ids from a persisted counter.
	///
	/// The counter update and its precondition are staged in `uow`, so two
	/// operations reserving from the same counter concurrently cannot both
	/// commit. Reserve from a given counter at most once per unit of work.
	pub async fn reserve_ids(
		&self,
		uow: &mut UnitOfWork,
		namespace: &str,
		counter: &str,
		count: u64,
	) -> Result<RangeInclusive<u64>, StorageError> {
		let last = match self.retrieve_tracked::<u64>(namespace, counter).await {
			Ok(tracked) => {
				uow.expect_unchanged(&tracked);
				tracked.value
			},
			Err(StorageError::NotFound) => {
				uow.expect_absent(namespace, counter);
				0
			},
			Err(e) => return Err(e),
		};
		let end = last + count;
		uow.put(namespace, counter, &end)?;
		Ok(last + 1..=end)
	}

	/// Commits a unit of work atomically.
	///
	/// Returns the number of rows affected.
	pub async fn commit(&self, uow: UnitOfWork) -> Result<usize, StorageError> {
		let batch = uow.into_batch();
		let preconditions = batch.preconditions.len();
		let rows = self.backend.commit(batch).await?;
		tracing::debug!(rows, preconditions, "Committed unit of work");
		Ok(rows)
	}
}
