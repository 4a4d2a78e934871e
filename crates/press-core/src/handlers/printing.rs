//! Printing handler.

use crate::state::OrderStateMachine;
use crate::WorkflowError;
use press_storage::UnitOfWork;
use press_types::{Actor, Order, Stage, TimelineAction};
use std::sync::Arc;
use tracing::instrument;

pub struct PrintingHandler {
	state_machine: Arc<OrderStateMachine>,
}

impl PrintingHandler {
	pub fn new(state_machine: Arc<OrderStateMachine>) -> Self {
		Self { state_machine }
	}

	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn start_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_stage(&tracked.value, Stage::Printing, "start printing")?;
		if tracked.value.printing.started_at.is_some() {
			return Err(WorkflowError::AlreadyInState(format!(
				"Printing of order {} has already started",
				tracked.value.order_number
			)));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::PrintingStarted,
			notes.clone(),
			|order, now| {
				order.printing.started_at = Some(now);
				if notes.is_some() {
					order.printing.notes = notes.clone();
				}
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, "Printing started");
		Ok(order)
	}

	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn complete_printing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_transition(&tracked.value, Stage::Completed)?;
		if tracked.value.printing.started_at.is_none() {
			return Err(WorkflowError::guard(format!(
				"Cannot complete printing of order {}: printing has not started",
				tracked.value.order_number
			)));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::PrintingCompleted,
			notes.clone(),
			|order, now| {
				order.stage = Stage::Completed;
				order.status = Stage::Completed.canonical_status();
				order.printing.ended_at = Some(now);
				order.printing.printed_by = Some(actor.id.clone());
				if notes.is_some() {
					order.printing.notes = notes.clone();
				}
				order.actual_delivery_date = Some(now);
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, "Printing completed");
		Ok(order)
	}
}
