//! Review handler: entering review, submitting the review payload and
//! releasing the order to manufacturing.

use crate::checklist::ChecklistGate;
use crate::state::OrderStateMachine;
use crate::WorkflowError;
use press_storage::UnitOfWork;
use press_types::{
	Actor, CatalogRef, Order, ReviewDetails, ReviewSelections, Stage, TimelineAction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Review payload submitted by the reviewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSubmission {
	#[serde(flatten)]
	pub selections: ReviewSelections,
	/// Manufacturing additions, in checklist order.
	#[serde(default)]
	pub additions: Vec<CatalogRef>,
	#[serde(default)]
	pub notes: Option<String>,
}

pub struct ReviewHandler {
	state_machine: Arc<OrderStateMachine>,
	checklist: Arc<ChecklistGate>,
}

impl ReviewHandler {
	pub fn new(state_machine: Arc<OrderStateMachine>, checklist: Arc<ChecklistGate>) -> Self {
		Self {
			state_machine,
			checklist,
		}
	}

	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn move_to_review(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_transition(&tracked.value, Stage::Review)?;

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::MovedToReview,
			notes,
			|order, _| {
				order.stage = Stage::Review;
				order.status = Stage::Review.canonical_status();
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, "Moved to review");
		Ok(order)
	}

	/// Stores the review payload and rebuilds the manufacturing checklist.
	///
	/// May be submitted any number of times while the order is in review;
	/// each submission replaces the previous one.
	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn update_review(
		&self,
		order_id: u64,
		submission: &ReviewSubmission,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_stage(&tracked.value, Stage::Review, "update the review of")?;

		let mut uow = UnitOfWork::new();
		let items = self
			.checklist
			.replace_items(&mut uow, order_id, &submission.additions)
			.await?;
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::ReviewUpdated,
			submission.notes.clone(),
			|order, now| {
				order.review = Some(ReviewDetails {
					selections: submission.selections.clone(),
					reviewed_by: actor.id.clone(),
					reviewed_at: now,
					notes: submission.notes.clone(),
				});
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(items = items.len(), "Review updated");
		Ok(order)
	}

	#[instrument(skip_all, fields(order_id = order_id))]
	pub async fn move_to_manufacturing(
		&self,
		order_id: u64,
		notes: Option<String>,
		actor: &Actor,
	) -> Result<Order, WorkflowError> {
		let tracked = self.state_machine.load(order_id).await?;
		OrderStateMachine::ensure_transition(&tracked.value, Stage::Manufacturing)?;

		let mut uow = UnitOfWork::new();
		let order = self.state_machine.record(
			&mut uow,
			&tracked,
			actor,
			TimelineAction::MovedToManufacturing,
			notes,
			|order, now| {
				order.stage = Stage::Manufacturing;
				order.status = Stage::Manufacturing.canonical_status();
				order.manufacturing.started_at = Some(now);
			},
		)?;
		self.state_machine.commit(uow).await?;

		tracing::info!(order_number = %order.order_number, "Moved to manufacturing");
		Ok(order)
	}
}
