//! Audit timeline types.
//!
//! Timeline entries are append-only. Each successful workflow operation writes
//! exactly one entry per order it mutates, and the entry sequence number equals
//! the order version the operation produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Actor, Stage, Status};

/// What happened to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimelineAction {
	Created,
	IntakeUpdated,
	MovedToReview,
	ReviewUpdated,
	MovedToManufacturing,
	ChecklistItemCompleted,
	MovedToPrinting,
	PrintingStarted,
	PrintingCompleted,
	Cancelled,
	StatusChanged,
	StageChanged,
	PriorityChanged,
	QueueReordered,
	Deleted,
}

impl TimelineAction {
	/// Short human-readable label.
	pub fn label(&self) -> &'static str {
		match self {
			TimelineAction::Created => "Order created",
			TimelineAction::IntakeUpdated => "Intake updated",
			TimelineAction::MovedToReview => "Moved to review",
			TimelineAction::ReviewUpdated => "Review updated",
			TimelineAction::MovedToManufacturing => "Moved to manufacturing",
			TimelineAction::ChecklistItemCompleted => "Manufacturing item completed",
			TimelineAction::MovedToPrinting => "Moved to printing",
			TimelineAction::PrintingStarted => "Printing started",
			TimelineAction::PrintingCompleted => "Printing completed",
			TimelineAction::Cancelled => "Order cancelled",
			TimelineAction::StatusChanged => "Status changed",
			TimelineAction::StageChanged => "Stage changed",
			TimelineAction::PriorityChanged => "Priority changed",
			TimelineAction::QueueReordered => "Print queue reordered",
			TimelineAction::Deleted => "Order deleted",
		}
	}
}

impl fmt::Display for TimelineAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// One immutable record in an order's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
	pub order_id: u64,
	/// 1-based position in the order's history.
	pub sequence: u64,
	/// Stage snapshot taken after the action.
	pub stage: Stage,
	/// Status snapshot taken after the action.
	pub status: Status,
	pub action: TimelineAction,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	pub action_at: DateTime<Utc>,
	pub actor_id: String,
	pub actor_name: String,
}

impl TimelineEntry {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		order_id: u64,
		sequence: u64,
		stage: Stage,
		status: Status,
		action: TimelineAction,
		notes: Option<String>,
		action_at: DateTime<Utc>,
		actor: &Actor,
	) -> Self {
		Self {
			order_id,
			sequence,
			stage,
			status,
			action,
			notes,
			action_at,
			actor_id: actor.id.clone(),
			actor_name: actor.name.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_entry_copies_actor_fields() {
		let actor = Actor::new("op-2", "Mira");
		let entry = TimelineEntry::new(
			7,
			1,
			Stage::Order,
			Status::Pending,
			TimelineAction::Created,
			None,
			Utc::now(),
			&actor,
		);
		assert_eq!(entry.actor_id, "op-2");
		assert_eq!(entry.actor_name, "Mira");
		assert_eq!(entry.action.to_string(), "Order created");
	}
}
