//! Manufacturing handler: checklist completion and the printing gate.

use crate::checklist::ChecklistGate;
use crate::state::OrderStateMachine;
use crate::WorkflowError;
use press_storage::UnitOfWork;
use press_types::{Actor, ManufacturingItem, Order, Stage, TimelineAction};
use std::sync::Arc;
use tracing::instrument;

pub struct ManufacturingHandler {
	state_machine: Arc<OrderStateMachine>,
	checklist: Arc<ChecklistGate>,
}

impl ManufacturingHandler {
	pub fn new(state_machine: Arc<OrderStateMachine>, checklist: Arc<ChecklistGate>) -> Self {
		Self {
			state_machine,
			checklist,
		}
	}

	/// Marks one checklist item of the order as completed.
	#[instrument(skip_all, fields(order_id = order_id, item_id = item_id))]
	pub async fn complete_checklist_item(
		&self,
		order_id: u64,
		item_id: u64,
		actor: &Actor,
	) -> Result<(Order, ManufacturingItem), WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_stage(
			&tracked.value,
			Stage::Manufacturing,
			"complete checklist items of",
		)?;

		let mut uow = UnitOfWork::new();
		let item = self
			.checklist
			.complete_item(&mut uow, order_id, item_id, actor, self.state_machine.now())
			.await?;

		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::ChecklistItemCompleted,
			Some(format!("{} completed", item.addition.name)),
			|_, _| {},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(addition = %item.addition.name, "Checklist item completed");
		Ok((order, item))
	}

	/// Moves the order to printing once every checklist item is done.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn move_to_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_transition(&tracked.value, Stage::Printing)?;

		let items = self.checklist.items(order_id).await?;
		if !ChecklistGate::is_complete(&items, self.checklist.empty_policy()) {
			let pending = ChecklistGate::incomplete(&items);
			let message = if items.is_empty() {
				format!(
					"Cannot move order {} to printing: it has no manufacturing items",
					tracked.value.order_number
				)
			} else {
				format!(
					"Cannot move order {} to printing: {} of {} manufacturing items are incomplete ({})",
					tracked.value.order_number,
					pending.len(),
					items.len(),
					pending.join(", ")
				)
			};
			tracing::warn!(incomplete = pending.len(), "Printing gate closed");
			return Err(WorkflowError::guard(message));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::MovedToPrinting,
			notes.clone(),
			|order, now| {
				order.stage = Stage::Printing;
				order.status = Stage::Printing.canonical_status();
				order.manufacturing.ended_at = Some(now);
				if notes.is_some() {
					order.manufacturing.notes = notes.clone();
				}
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, "Moved to printing");
		Ok(order)
	}
}
