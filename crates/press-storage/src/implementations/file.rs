//! File-based storage backend for the press workflow.
//!
//! Each row lives in its own file at `<storage_path>/<namespace>/<id>.bin`,
//! with the namespace and id percent-encoded so every key maps to exactly one
//! file name and back. Commits are serialized within the process by a mutex
//! and across processes by an exclusive `fs2` lock on `<storage_path>/.lock`.
//!
//! A commit first writes its operations to `<storage_path>/.journal`, then
//! applies them and removes the journal. A journal found on startup belongs to
//! a commit that passed its preconditions but was interrupted, and is replayed
//! before the backend is handed out.

use crate::{StorageError, StorageInterface, WriteBatch, WriteOperation};
use async_trait::async_trait;
use fs2::FileExt;
use press_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::fs::{self as stdfs, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const LOCK_FILE: &str = ".lock";
const JOURNAL_FILE: &str = ".journal";
const EXTENSION: &str = "bin";

/// Fixed-size file header.
///
/// Binary layout (16 bytes total):
/// - [0-3]: Magic bytes "PRSS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-15]: Reserved
struct FileHeader;

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"PRSS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn encode(payload: &[u8]) -> Vec<u8> {
		let mut data = Vec::with_capacity(Self::SIZE + payload.len());
		data.extend_from_slice(Self::MAGIC);
		data.extend_from_slice(&Self::VERSION.to_le_bytes());
		data.extend_from_slice(&[0u8; 10]);
		data.extend_from_slice(payload);
		data
	}

	/// Strips and checks the header, returning the payload.
	fn decode(data: &[u8]) -> Result<&[u8], StorageError> {
		if data.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &data[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}
		let version = u16::from_le_bytes([data[4], data[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		Ok(&data[Self::SIZE..])
	}
}

fn is_plain(byte: u8) -> bool {
	byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.')
}

/// Percent-encodes a key component into a file name.
fn encode_component(raw: &str) -> String {
	let mut encoded = String::with_capacity(raw.len());
	for byte in raw.bytes() {
		if is_plain(byte) {
			encoded.push(byte as char);
		} else {
			encoded.push_str(&format!("%{:02X}", byte));
		}
	}
	encoded
}

fn decode_component(encoded: &str) -> Option<String> {
	let bytes = encoded.as_bytes();
	let mut decoded = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			let hex = encoded.get(i + 1..i + 3)?;
			decoded.push(u8::from_str_radix(hex, 16).ok()?);
			i += 3;
		} else {
			decoded.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(decoded).ok()
}

fn backend_error(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Resolves `namespace:id` to its file path.
fn file_path(base: &Path, key: &str) -> Result<PathBuf, StorageError> {
	let (namespace, id) = key
		.split_once(':')
		.ok_or_else(|| StorageError::Backend(format!("Key '{}' has no namespace", key)))?;
	Ok(base
		.join(encode_component(namespace))
		.join(format!("{}.{}", encode_component(id), EXTENSION)))
}

fn read_payload(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
	match stdfs::read(path) {
		Ok(data) => Ok(Some(FileHeader::decode(&data)?.to_vec())),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
		Err(e) => Err(backend_error(e)),
	}
}

/// Writes a file by writing a sibling temp file and renaming it into place.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		stdfs::create_dir_all(parent).map_err(backend_error)?;
	}
	let temp_path = path.with_extension("tmp");
	let mut file = File::create(&temp_path).map_err(backend_error)?;
	file.write_all(contents).map_err(backend_error)?;
	file.sync_all().map_err(backend_error)?;
	stdfs::rename(&temp_path, path).map_err(backend_error)
}

fn remove_if_present(path: &Path) -> Result<(), StorageError> {
	match stdfs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(backend_error(e)),
	}
}

fn apply(base: &Path, operations: &[WriteOperation]) -> Result<(), StorageError> {
	for operation in operations {
		let path = file_path(base, operation.key())?;
		match operation {
			WriteOperation::Put { value, .. } => write_atomic(&path, &FileHeader::encode(value))?,
			WriteOperation::Delete { .. } => remove_if_present(&path)?,
		}
	}
	Ok(())
}

/// Holds the cross-process lock until dropped.
struct DirectoryLock(File);

impl DirectoryLock {
	fn acquire(base: &Path) -> Result<Self, StorageError> {
		stdfs::create_dir_all(base).map_err(backend_error)?;
		let file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(base.join(LOCK_FILE))
			.map_err(backend_error)?;
		file.lock_exclusive().map_err(backend_error)?;
		Ok(Self(file))
	}
}

impl Drop for DirectoryLock {
	fn drop(&mut self) {
		if let Err(e) = FileExt::unlock(&self.0) {
			tracing::warn!("Failed to release storage lock: {}", e);
		}
	}
}

/// Replays an interrupted commit, if any. Caller holds the directory lock.
fn replay_journal(base: &Path) -> Result<bool, StorageError> {
	let journal = base.join(JOURNAL_FILE);
	let Some(payload) = read_payload(&journal)? else {
		return Ok(false);
	};
	let operations: Vec<WriteOperation> = serde_json::from_slice(&payload)
		.map_err(|e| StorageError::Serialization(format!("journal: {}", e)))?;
	apply(base, &operations)?;
	remove_if_present(&journal)?;
	tracing::warn!(
		operations = operations.len(),
		"Replayed interrupted storage commit"
	);
	Ok(true)
}

fn commit_blocking(base: &Path, batch: WriteBatch) -> Result<usize, StorageError> {
	let _lock = DirectoryLock::acquire(base)?;
	replay_journal(base)?;

	for precondition in &batch.preconditions {
		let current = read_payload(&file_path(base, &precondition.key)?)?;
		if current != precondition.expected {
			return Err(StorageError::Conflict(precondition.key.clone()));
		}
	}

	if batch.operations.is_empty() {
		return Ok(0);
	}

	let journal = base.join(JOURNAL_FILE);
	let entries = serde_json::to_vec(&batch.operations)
		.map_err(|e| StorageError::Serialization(e.to_string()))?;
	write_atomic(&journal, &FileHeader::encode(&entries))?;
	apply(base, &batch.operations)?;
	remove_if_present(&journal)?;

	Ok(batch.operations.len())
}

/// File-based storage implementation.
pub struct FileStorage {
	base_path: PathBuf,
	/// Serializes blocking commits issued by this process.
	commit_lock: Mutex<()>,
}

impl FileStorage {
	/// Opens a store rooted at `base_path`, replaying any interrupted commit.
	pub fn open(base_path: PathBuf) -> Result<Self, StorageError> {
		{
			let _lock = DirectoryLock::acquire(&base_path)?;
			replay_journal(&base_path)?;
		}
		Ok(Self {
			base_path,
			commit_lock: Mutex::new(()),
		})
	}

	async fn run_locked<T, F>(&self, work: F) -> Result<T, StorageError>
	where
		T: Send + 'static,
		F: FnOnce(&Path) -> Result<T, StorageError> + Send + 'static,
	{
		let _guard = self.commit_lock.lock().await;
		let base = self.base_path.clone();
		tokio::task::spawn_blocking(move || work(&base))
			.await
			.map_err(|e| StorageError::Backend(format!("Storage task failed: {}", e)))?
	}

	async fn list_namespace(
		&self,
		namespace_dir: &Path,
		namespace: &str,
		prefix: &str,
		keys: &mut Vec<String>,
	) -> Result<(), StorageError> {
		let mut entries = match fs::read_dir(namespace_dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(backend_error(e)),
		};

		while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
			let path = entry.path();
			if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
				continue;
			}
			let Some(id) = path
				.file_stem()
				.and_then(|stem| stem.to_str())
				.and_then(decode_component)
			else {
				tracing::debug!("Skipping unrecognized file {:?}", path);
				continue;
			};
			let key = format!("{}:{}", namespace, id);
			if key.starts_with(prefix) {
				keys.push(key);
			}
		}
		Ok(())
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = file_path(&self.base_path, key)?;
		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
			Err(e) => return Err(backend_error(e)),
		};
		Ok(FileHeader::decode(&data)?.to_vec())
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let operation = WriteOperation::Put {
			key: key.to_string(),
			value,
		};
		self.commit(WriteBatch {
			preconditions: vec![],
			operations: vec![operation],
		})
		.await
		.map(|_| ())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let operation = WriteOperation::Delete {
			key: key.to_string(),
		};
		self.commit(WriteBatch {
			preconditions: vec![],
			operations: vec![operation],
		})
		.await
		.map(|_| ())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = file_path(&self.base_path, key)?;
		fs::try_exists(&path).await.map_err(backend_error)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut keys = Vec::new();
		match prefix.split_once(':') {
			Some((namespace, _)) => {
				let dir = self.base_path.join(encode_component(namespace));
				self.list_namespace(&dir, namespace, prefix, &mut keys)
					.await?;
			},
			None => {
				let mut entries = match fs::read_dir(&self.base_path).await {
					Ok(entries) => entries,
					Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
					Err(e) => return Err(backend_error(e)),
				};
				while let Some(entry) = entries.next_entry().await.map_err(backend_error)? {
					if !entry.file_type().await.map_err(backend_error)?.is_dir() {
						continue;
					}
					let name = entry.file_name();
					let Some(namespace) = name.to_str().and_then(decode_component) else {
						continue;
					};
					self.list_namespace(&entry.path(), &namespace, prefix, &mut keys)
						.await?;
				}
			},
		}
		keys.sort();
		Ok(keys)
	}

	async fn commit(&self, batch: WriteBatch) -> Result<usize, StorageError> {
		self.run_locked(move |base| commit_blocking(base, batch))
			.await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if !path.trim().is_empty() => Ok(()),
						_ => Err("storage_path cannot be empty".to_string()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/press")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/press");

	Ok(Box::new(FileStorage::open(PathBuf::from(storage_path))?))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl press_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
