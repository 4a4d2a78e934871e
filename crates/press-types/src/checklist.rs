//! Manufacturing checklist types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CatalogRef;

/// One manufacturing operation that must be finished before printing.
///
/// Completion is monotonic: once `is_completed` is true no public operation
/// sets it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturingItem {
	pub id: u64,
	/// Order this item belongs to.
	pub order_id: u64,
	/// The manufacturing addition (operation type) this item tracks.
	pub addition: CatalogRef,
	pub is_completed: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<DateTime<Utc>>,
	/// Actor id of the operator who completed the item.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_by: Option<String>,
	/// 1-based position in the submitted checklist.
	pub display_order: u32,
}

impl ManufacturingItem {
	/// Creates a pending item.
	pub fn pending(id: u64, order_id: u64, addition: CatalogRef, display_order: u32) -> Self {
		Self {
			id,
			order_id,
			addition,
			is_completed: false,
			completed_at: None,
			completed_by: None,
			display_order,
		}
	}
}

/// Answer to "are all items completed?" for an order with no checklist items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyChecklistPolicy {
	/// An empty checklist counts as complete.
	#[default]
	Allow,
	/// An order must have at least one completed item to leave manufacturing.
	Block,
}

impl EmptyChecklistPolicy {
	pub fn allows_empty(self) -> bool {
		matches!(self, EmptyChecklistPolicy::Allow)
	}
}

impl std::fmt::Display for EmptyChecklistPolicy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			EmptyChecklistPolicy::Allow => write!(f, "allow"),
			EmptyChecklistPolicy::Block => write!(f, "block"),
		}
	}
}
