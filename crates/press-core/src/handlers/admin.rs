//! Administrative operations: cancellation and status/stage overrides.
//!
//! Overrides bypass the forward transition table but still write a timeline
//! entry describing the old and new values.

use crate::state::OrderStateMachine;
use crate::WorkflowError;
use press_storage::UnitOfWork;
use press_types::{Actor, Order, Stage, Status, TimelineAction};
use std::sync::Arc;
use tracing::instrument;

fn describe_change(from: impl std::fmt::Display, to: impl std::fmt::Display, notes: Option<String>) -> String {
	match notes {
		Some(notes) if !notes.trim().is_empty() => format!("{} → {}: {}", from, to, notes),
		_ => format!("{} → {}", from, to),
	}
}

pub struct AdminHandler {
	state_machine: Arc<OrderStateMachine>,
}

impl AdminHandler {
	pub fn new(state_machine: Arc<OrderStateMachine>) -> Self {
		Self { state_machine }
	}

	/// Cancels an order without moving its stage.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn cancel(
		&self,
		order_id: u64,
		reason: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		let current = &tracked.value;
		if current.status == Status::Cancelled {
			return Err(WorkflowError::AlreadyInState(format!(
				"Order {} is already cancelled",
				current.order_number
			)));
		}
		if current.stage == Stage::Completed || current.status.is_terminal() {
			return Err(WorkflowError::guard(format!(
				"Cannot cancel order {}: the order is completed",
				current.order_number
			)));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::Cancelled,
			reason,
			|order, _| order.status = Status::Cancelled,
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, stage = %order.stage, "Order cancelled");
		Ok(order)
	}

	/// Sets the status directly. The stage is left alone.
	#[instrument(skip_all, fields(order_id = order_id, status = %status))]
	pub async fn change_status(
		&self,
		order_id: u64,
		status: Status,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		let previous = tracked.value.status;
		if previous == status {
			return Err(WorkflowError::AlreadyInState(format!(
				"Order {} already has status {}",
				tracked.value.order_number, status
			)));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::StatusChanged,
			Some(describe_change(previous, status, notes)),
			|order, _| order.status = status,
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(from = %previous, to = %status, "Status changed");
		Ok(order)
	}

	/// Sets the stage directly, together with that stage's canonical status.
	#[instrument(skip_all, fields(order_id = order_id, stage = %stage))]
	pub async fn change_stage(
		&self,
		order_id: u64,
		stage: Stage,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		let previous = tracked.value.stage;
		if previous == stage && tracked.value.status == stage.canonical_status() {
			return Err(WorkflowError::AlreadyInState(format!(
				"Order {} is already in the {} stage",
				tracked.value.order_number, stage
			)));
		}

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::StageChanged,
			Some(describe_change(previous, stage, notes)),
			|order, _| {
				order.stage = stage;
				order.status = stage.canonical_status();
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(from = %previous, to = %stage, "Stage changed");
		Ok(order)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_describe_change() {
		assert_eq!(
			describe_change(Status::Pending, Status::OnHold, None),
			"Pending → OnHold"
		);
		assert_eq!(
			describe_change(Stage::Printing, Stage::Review, Some("reprint".into())),
			"Printing → Review: reprint"
		);
	}
}
