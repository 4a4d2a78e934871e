//! Print queue scheduler.
//!
//! The queue is a projection over active orders in the printing stage,
//! recomputed on every read. It is ordered by priority (lower first), then
//! expected delivery date (earlier first), then order id.

use crate::state::OrderStateMachine;
use crate::WorkflowError;
use press_storage::UnitOfWork;
use press_types::{Actor, Order, PrintQueueEntry, Stage, StorageTable, TimelineAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Checks a requested priority and narrows it to the stored type.
pub(crate) fn validate_priority(priority: i64) -> Result<u32, String> {
	if priority < 1 {
		return Err(format!("Priority must be at least 1 (got {})", priority));
	}
	u32::try_from(priority).map_err(|_| format!("Priority {} is too large", priority))
}

/// Outcome of a bulk reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderReport {
	/// Orders whose priority was written, in id order.
	pub updated: Vec<u64>,
	/// Requested ids that do not name an active order.
	pub skipped: Vec<u64>,
}

pub struct PrintQueue {
	state_machine: Arc<OrderStateMachine>,
}

impl PrintQueue {
	pub fn new(state_machine: Arc<OrderStateMachine>) -> Self {
		Self { state_machine }
	}

	/// Sorts orders into queue order.
	pub fn sort(orders: &mut [Order]) {
		orders.sort_by(|a, b| {
			a.priority
				.cmp(&b.priority)
				.then(a.expected_delivery_date.cmp(&b.expected_delivery_date))
				.then(a.id.cmp(&b.id))
		});
	}

	pub async fn get_queue(&self) -> Result<Vec<PrintQueueEntry>, WorkflowError> {
		let mut orders = self
			.state_machine
			.storage()
			.find(StorageTable::Orders.as_str(), |order: &Order| {
				order.is_active() && order.stage == Stage::Printing
			})
			.await?;
		Self::sort(&mut orders);

		Ok(orders
			.iter()
			.enumerate()
			.map(|(index, order)| PrintQueueEntry::from_order(index + 1, order))
			.collect())
	}

	#[instrument(skip_all, fields(order_id = order_id, priority = priority))]
	pub async fn set_priority(
		&self,
		order_id: u64,
		priority: i64,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let priority = validate_priority(priority).map_err(WorkflowError::guard)?;
		let tracked = self.state_machine.load(order_id).await?;
		let previous = tracked.value.priority;

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::PriorityChanged,
			Some(format!("Priority changed: {} → {}", previous, priority)),
			|order, _| order.priority = priority,
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(from = previous, to = priority, "Priority changed");
		Ok(order)
	}

	/// Applies many priority changes as one atomic unit.
	///
	/// Any priority below 1 rejects the whole batch. Ids that do not name an
	/// active order are skipped and reported. Every updated order gets its own
	/// timeline entry.
	#[instrument(skip_all, fields(requested = priorities.len()))]
	pub async fn reorder(
		&self,
		priorities: &BTreeMap<u64, i64>,
		actor: &Actor,
	) -> Result<ReorderReport, WorkflowError> {
		let mut validated = BTreeMap::new();
		let mut violations = Vec::new();
		for (&order_id, &priority) in priorities {
			match validate_priority(priority) {
				Ok(priority) => {
					validated.insert(order_id, priority);
				},
				Err(message) => violations.push(format!("Order {}: {}", order_id, message)),
			}
		}
		if !violations.is_empty() {
			return Err(WorkflowError::GuardViolation(violations));
		}

		let mut report = ReorderReport::default();
		let mut uow = UnitOfWork::new();
		for (order_id, priority) in validated {
			let tracked = match self.state_machine.load(order_id).await {
				Ok(tracked) => tracked,
				Err(WorkflowError::NotFound { .. }) => {
					report.skipped.push(order_id);
					continue;
				},
				Err(e) => return Err(e),
			};
			let previous = tracked.value.priority;
			self.state_machine.record(
				&mut uow,
				&tracked,
				actor,
				TimelineAction::QueueReordered,
				Some(format!("Priority changed: {} → {}", previous, priority)),
				|order, _| order.priority = priority,
			)?;
			report.updated.push(order_id);
		}

		if !uow.is_empty() {
			self.state_machine.commit(uow).await?;
		}

		tracing::info!(
			updated = report.updated.len(),
			skipped = report.skipped.len(),
			"Print queue reordered"
		);
		Ok(report)
	}
}
