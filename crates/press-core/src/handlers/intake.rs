//! Intake handler: order creation, intake edits and soft deletion.

use crate::state::OrderStateMachine;
use crate::WorkflowError;
use chrono::NaiveDate;
use press_storage::{StorageError, Tracked, UnitOfWork};
use press_types::{
	Actor, IntakeDetails, ManufacturingDetails, Order, PrintingDetails, RecordState, Stage,
	StorageTable, TimelineAction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

const ORDER_SEQUENCE: &str = "orders";

/// Input for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
	pub order_number: String,
	/// Defaults to the configured default priority.
	#[serde(default)]
	pub priority: Option<i64>,
	pub expected_delivery_date: NaiveDate,
	pub intake: IntakeDetails,
}

fn intake_violations(intake: &IntakeDetails) -> Vec<String> {
	let mut violations = Vec::new();
	if intake.quantity == 0 {
		violations.push("Quantity must be greater than zero".to_string());
	}
	violations
}

pub struct IntakeHandler {
	state_machine: Arc<OrderStateMachine>,
	default_priority: u32,
}

impl IntakeHandler {
	pub fn new(state_machine: Arc<OrderStateMachine>, default_priority: u32) -> Self {
		Self {
			state_machine,
			default_priority,
		}
	}

	async fn order_number_taken(&self, order_number: &str) -> Result<bool, WorkflowError> {
		Ok(self
			.state_machine
			.storage()
			.exists(StorageTable::OrderNumbers.as_str(), order_number)
			.await?)
	}

	/// Resolves an order number to the active order carrying it.
	pub async fn find_by_order_number(&self, order_number: &str) -> Result<Order, WorkflowError> {
		let id: u64 = match self
			.state_machine
			.storage()
			.retrieve(StorageTable::OrderNumbers.as_str(), order_number)
			.await
		{
			Ok(id) => id,
			Err(StorageError::NotFound) => return Err(WorkflowError::order_not_found(order_number)),
			Err(e) => return Err(e.into()),
		};
		self.state_machine.get_order(id).await
	}

	/// Registers a new order in `Stage::Order` / `Status::Pending`.
	#[instrument(skip_all, fields(order_number = %input.order_number))]
	pub async fn create(&self, input: &NewOrder, actor: &Actor) -> Result<Order, WorkflowError> {
		let order_number = input.order_number.trim();
		let priority = input
			.priority
			.unwrap_or_else(|| i64::from(self.default_priority));

		let mut violations = Vec::new();
		if order_number.is_empty() {
			violations.push("Order number is required".to_string());
		} else if self.order_number_taken(order_number).await? {
			violations.push(format!("Order number {} already exists", order_number));
		}
		violations.extend(intake_violations(&input.intake));
		let priority = match crate::queue::validate_priority(priority) {
			Ok(priority) => priority,
			Err(message) => {
				violations.push(message);
				0
			},
		};
		if !violations.is_empty() {
			return Err(WorkflowError::GuardViolation(violations));
		}

		let mut uow = UnitOfWork::new();
		let id = *self
			.state_machine
			.storage()
			.reserve_ids(&mut uow, StorageTable::Sequences.as_str(), ORDER_SEQUENCE, 1)
			.await?
			.start();

		let now = self.state_machine.now();
		let stage = Stage::Order;
		let order = Order {
			id,
			order_number: order_number.to_string(),
			stage,
			status: stage.canonical_status(),
			priority,
			expected_delivery_date: input.expected_delivery_date,
			actual_delivery_date: None,
			intake: input.intake.clone(),
			review: None,
			manufacturing: ManufacturingDetails::default(),
			printing: PrintingDetails::default(),
			record_state: RecordState::Active,
			created_at: now,
			created_by: actor.id.clone(),
			last_modified_at: None,
			last_modified_by: None,
			version: 1,
		};

		self.state_machine
			.record_new(&mut uow, &order, actor, input.intake.notes.clone())?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_id = order.id, "Order created");
		Ok(order)
	}

	/// Replaces the intake fields while the order is still in intake.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn update_intake(
		&self,
		order_id: u64,
		intake: &IntakeDetails,
		expected_delivery_date: Option<NaiveDate>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_stage(&tracked.value, Stage::Order, "update the intake of")?;

		let violations = intake_violations(intake);
		if !violations.is_empty() {
			return Err(WorkflowError::GuardViolation(violations));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::IntakeUpdated,
			intake.notes.clone(),
			|order, _| {
				order.intake = intake.clone();
				if let Some(date) = expected_delivery_date {
					order.expected_delivery_date = date;
				}
			},
		)?;
		self.state_machine.commit(uow).await?;
		Ok(order)
	}

	/// Soft-deletes an order. The order number stays reserved.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn delete(
		&self,
		order_id: u64,
		reason: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked: Tracked<Order> = self.state_machine.load(order_id).await?;

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::Deleted,
			reason,
			|order, now| {
				order.record_state = RecordState::Deleted {
					at: now,
					by: actor.id.clone(),
				};
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_id, "Order deleted");
		Ok(order)
	}
}
