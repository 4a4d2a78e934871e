//! Append-only audit timeline.
//!
//! Entries are keyed `timeline:<order id>:<sequence>` with the sequence
//! zero-padded, so a prefix listing returns an order's history in causal
//! order. The sequence of an entry is the order version produced by the
//! operation that wrote it.

use crate::WorkflowError;
use chrono::{DateTime, Utc};
use press_storage::{StorageService, UnitOfWork};
use press_types::{Actor, Order, StorageTable, TimelineAction, TimelineEntry};
use std::sync::Arc;

fn entry_id(order_id: u64, sequence: u64) -> String {
	format!("{}:{:010}", order_id, sequence)
}

pub struct AuditTimeline {
	storage: Arc<StorageService>,
}

impl AuditTimeline {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Stages the entry recording `action` on `order`.
	///
	/// `order` must already carry the state after the action. The write is
	/// guarded by a must-not-exist precondition on the entry key, so an entry
	/// is never overwritten.
	pub fn append(
		&self,
		uow: &mut UnitOfWork,
		order: &Order,
		action: TimelineAction,
		notes: Option<String>,
		actor: &Actor,
		at: DateTime<Utc>,
	) -> Result<TimelineEntry, WorkflowError> {
		let entry = TimelineEntry::new(
			order.id,
			order.version,
			order.stage,
			order.status,
			action,
			notes,
			at,
			actor,
		);
		let id = entry_id(entry.order_id, entry.sequence);
		uow.expect_absent(StorageTable::Timeline.as_str(), &id);
		uow.put(StorageTable::Timeline.as_str(), &id, &entry)?;
		Ok(entry)
	}

	/// Returns the order's entries, newest first.
	pub async fn list_for_order(&self, order_id: u64) -> Result<Vec<TimelineEntry>, WorkflowError> {
		let prefix = format!("{}:{}:", StorageTable::Timeline.as_str(), order_id);
		let mut entries: Vec<TimelineEntry> = self
			.storage
			.find_tracked_with_prefix(&prefix, |_: &TimelineEntry| true)
			.await?
			.into_iter()
			.map(|tracked| tracked.into_inner())
			.collect();
		entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
		Ok(entries)
	}

	pub async fn latest_for_order(
		&self,
		order_id: u64,
	) -> Result<Option<TimelineEntry>, WorkflowError> {
		Ok(self.list_for_order(order_id).await?.into_iter().next())
	}
}
