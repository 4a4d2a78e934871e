//! The workflow engine facade.
//!
//! [`WorkflowEngine`] owns every component and is the only entry point
//! callers need. Each mutating operation runs inside a retry loop: when a
//! competing writer changed a row the operation depended on, the operation is
//! run again from scratch (re-read, re-check guards) up to the configured
//! number of times.

use crate::checklist::ChecklistGate;
use crate::clock::Clock;
use crate::handlers::{
	AdminHandler, IntakeHandler, ManufacturingHandler, NewOrder, PrintingHandler, ReviewHandler,
	ReviewSubmission,
};
use crate::queue::{PrintQueue, ReorderReport};
use crate::state::OrderStateMachine;
use crate::timeline::AuditTimeline;
use crate::WorkflowError;
use chrono::NaiveDate;
use press_config::WorkflowConfig;
use press_storage::StorageService;
use press_types::{
	Actor, EmptyChecklistPolicy, IntakeDetails, ManufacturingItem, Order, PrintQueueEntry, Stage,
	Status, StorageTable, TimelineEntry, DEFAULT_PRIORITY,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Rules the engine applies, taken from `[workflow]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
	pub default_priority: u32,
	pub empty_checklist: EmptyChecklistPolicy,
	pub conflict_retries: u32,
}

impl Default for WorkflowSettings {
	fn default() -> Self {
		Self {
			default_priority: DEFAULT_PRIORITY,
			empty_checklist: EmptyChecklistPolicy::default(),
			conflict_retries: 3,
		}
	}
}

impl From<&WorkflowConfig> for WorkflowSettings {
	fn from(config: &WorkflowConfig) -> Self {
		Self {
			default_priority: config.default_priority,
			empty_checklist: config.empty_checklist,
			conflict_retries: config.conflict_retries,
		}
	}
}

pub struct WorkflowEngine {
	settings: WorkflowSettings,
	state_machine: Arc<OrderStateMachine>,
	checklist: Arc<ChecklistGate>,
	intake: IntakeHandler,
	review: ReviewHandler,
	manufacturing: ManufacturingHandler,
	printing: PrintingHandler,
	admin: AdminHandler,
	queue: PrintQueue,
}

impl WorkflowEngine {
	pub fn new(
		storage: Arc<StorageService>,
		clock: Arc<dyn Clock>,
		settings: WorkflowSettings,
	) -> Self {
		let timeline = Arc::new(AuditTimeline::new(storage.clone()));
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone(), clock, timeline));
		let checklist = Arc::new(ChecklistGate::new(storage, settings.empty_checklist));

		Self {
			settings,
			intake: IntakeHandler::new(state_machine.clone(), settings.default_priority),
			review: ReviewHandler::new(state_machine.clone(), checklist.clone()),
			manufacturing: ManufacturingHandler::new(state_machine.clone(), checklist.clone()),
			printing: PrintingHandler::new(state_machine.clone()),
			admin: AdminHandler::new(state_machine.clone()),
			queue: PrintQueue::new(state_machine.clone()),
			state_machine,
			checklist,
		}
	}

	pub fn settings(&self) -> &WorkflowSettings {
		&self.settings
	}

	/// Runs one operation, re-running it after concurrency conflicts.
	async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, WorkflowError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, WorkflowError>>,
	{
		let mut retries = 0;
		loop {
			match attempt().await {
				Err(e) if e.is_retryable() && retries < self.settings.conflict_retries => {
					retries += 1;
					tracing::warn!(operation, retries, error = %e, "Retrying after conflict");
					tokio::task::yield_now().await;
				},
				Err(e) => {
					if e.is_guard_violation() {
						tracing::warn!(operation, error = %e, "Operation rejected");
					} else {
						tracing::error!(operation, error = %e, "Operation failed");
					}
					return Err(e);
				},
				Ok(value) => return Ok(value),
			}
		}
	}

	// Lifecycle

	pub async fn create_order(&self, input: &NewOrder, actor: &Actor) -> Result<Order, WorkflowError> {
		self.with_retries("create_order", || self.intake.create(input, actor))
			.await
	}

	pub async fn update_intake(
		&self,
		order_id: u64,
		intake: &IntakeDetails,
		expected_delivery_date: Option<NaiveDate>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("update_intake", || {
			self.intake
				.update_intake(order_id, intake, expected_delivery_date, actor)
		})
		.await
	}

	pub async fn move_to_review(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("move_to_review", || {
			self.review.move_to_review(order_id, notes.clone(), actor)
		})
		.await
	}

	pub async fn update_review(
		&self,
		order_id: u64,
		submission: &ReviewSubmission,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("update_review", || {
			self.review.update_review(order_id, submission, actor)
		})
		.await
	}

	pub async fn move_to_manufacturing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("move_to_manufacturing", || {
			self.review
				.move_to_manufacturing(order_id, notes.clone(), actor)
		})
		.await
	}

	pub async fn complete_checklist_item(
		&self,
		order_id: u64,
		item_id: u64,
		actor: &Actor,
	) -> Result<ManufacturingItem, WorkflowError> {
		self.with_retries("complete_checklist_item", || {
			self.manufacturing
				.complete_checklist_item(order_id, item_id, actor)
		})
		.await
		.map(|(_, item)| item)
	}

	pub async fn move_to_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("move_to_printing", || {
			self.manufacturing
				.move_to_printing(order_id, notes.clone(), actor)
		})
		.await
	}

	pub async fn start_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("start_printing", || {
			self.printing.start_printing(order_id, notes.clone(), actor)
		})
		.await
	}

	pub async fn complete_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("complete_printing", || {
			self.printing
				.complete_printing(order_id, notes.clone(), actor)
		})
		.await
	}

	// Administration

	pub async fn cancel_order(
		&self,
		order_id: u64,
		reason: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("cancel_order", || {
			self.admin.cancel(order_id, reason.clone(), actor)
		})
		.await
	}

	pub async fn change_status(
		&self,
		order_id: u64,
		status: Status,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("change_status", || {
			self.admin
				.change_status(order_id, status, notes.clone(), actor)
		})
		.await
	}

	pub async fn change_stage(
		&self,
		order_id: u64,
		stage: Stage,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("change_stage", || {
			self.admin.change_stage(order_id, stage, notes.clone(), actor)
		})
		.await
	}

	pub async fn delete_order(
		&self,
		order_id: u64,
		reason: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("delete_order", || {
			self.intake.delete(order_id, reason.clone(), actor)
		})
		.await
	}

	// Print queue

	pub async fn print_queue(&self) -> Result<Vec<PrintQueueEntry>, WorkflowError> {
		self.queue.get_queue().await
	}

	pub async fn set_priority(
		&self,
		order_id: u64,
		priority: i64,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		self.with_retries("set_priority", || {
			self.queue.set_priority(order_id, priority, actor)
		})
		.await
	}

	/// Bulk priority update. Later entries for the same id win.
	pub async fn reorder_queue<I>(&self, priorities: I, actor: &Actor) -> Result<ReorderReport, WorkflowError>
	where
		I: IntoIterator<Item = (u64, i64)>,
	{
		let priorities: BTreeMap<u64, i64> = priorities.into_iter().collect();
		self.with_retries("reorder_queue", || self.queue.reorder(&priorities, actor))
			.await
	}

	// Queries

	pub async fn get_order(&self, order_id: u64) -> Result<Order, WorkflowError> {
		self.state_machine.get_order(order_id).await
	}

	pub async fn find_by_order_number(&self, order_number: &str) -> Result<Order, WorkflowError> {
		self.intake.find_by_order_number(order_number).await
	}

	/// Active orders, optionally restricted to one stage, in id order.
	pub async fn list_orders(&self, stage: Option<Stage>) -> Result<Vec<Order>, WorkflowError> {
		let mut orders = self
			.state_machine
			.storage()
			.find(StorageTable::Orders.as_str(), |order: &Order| {
				order.is_active() && stage.is_none_or(|stage| order.stage == stage)
			})
			.await?;
		orders.sort_by_key(|order| order.id);
		Ok(orders)
	}

	pub async fn checklist(&self, order_id: u64) -> Result<Vec<ManufacturingItem>, WorkflowError> {
		self.state_machine.load(order_id).await?;
		self.checklist.items(order_id).await
	}

	pub async fn checklist_completed(&self, order_id: u64) -> Result<bool, WorkflowError> {
		self.state_machine.load(order_id).await?;
		self.checklist.all_completed(order_id).await
	}

	pub async fn completion_percentage(&self, order_id: u64) -> Result<Decimal, WorkflowError> {
		self.state_machine.load(order_id).await?;
		self.checklist.completion_percentage(order_id).await
	}

	/// The order's history, newest first.
	pub async fn timeline(&self, order_id: u64) -> Result<Vec<TimelineEntry>, WorkflowError> {
		self.state_machine.load(order_id).await?;
		self.state_machine.timeline().list_for_order(order_id).await
	}

	pub async fn latest_timeline_entry(
		&self,
		order_id: u64,
	) -> Result<Option<TimelineEntry>, WorkflowError> {
		self.state_machine.load(order_id).await?;
		self.state_machine.timeline().latest_for_order(order_id).await
	}
}
