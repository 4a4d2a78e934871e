//! Order state machine implementation.
//!
//! Orders move forward through `Order -> Review -> Manufacturing -> Printing
//! -> Completed`. Forward moves are checked against a static transition table;
//! administrative overrides bypass it. Every mutation goes through
//! [`OrderStateMachine::record`], which stamps the audit columns, advances
//! the version and stages the matching timeline entry in the same unit of
//! work.

use crate::clock::Clock;
use crate::timeline::AuditTimeline;
use crate::WorkflowError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use press_storage::{StorageError, StorageService, Tracked, UnitOfWork};
use press_types::{Actor, Order, Stage, StorageTable, TimelineAction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Loads, guards and persists orders.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	clock: Arc<dyn Clock>,
	timeline: Arc<AuditTimeline>,
}

impl OrderStateMachine {
	pub fn new(
		storage: Arc<StorageService>,
		clock: Arc<dyn Clock>,
		timeline: Arc<AuditTimeline>,
	) -> Self {
		Self {
			storage,
			clock,
			timeline,
		}
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn timeline(&self) -> &Arc<AuditTimeline> {
		&self.timeline
	}

	pub fn now(&self) -> DateTime<Utc> {
		self.clock.now()
	}

	/// Loads an active order together with the bytes it was read from.
	pub async fn load(&self, order_id: u64) -> Result<Tracked<Order>, WorkflowError> {
		match self
			.storage
			.retrieve_tracked::<Order>(StorageTable::Orders.as_str(), &order_id.to_string())
			.await
		{
			Ok(tracked) if tracked.value.is_active() => Ok(tracked),
			Ok(_) | Err(StorageError::NotFound) => Err(WorkflowError::order_not_found(order_id)),
			Err(e) => Err(e.into()),
		}
	}

	/// Gets an active order by id.
	pub async fn get_order(&self, order_id: u64) -> Result<Order, WorkflowError> {
		self.load(order_id).await.map(Tracked::into_inner)
	}

	/// Checks if a forward stage transition is valid.
	pub fn is_valid_transition(from: Stage, to: Stage) -> bool {
		static TRANSITIONS: Lazy<HashMap<Stage, HashSet<Stage>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(Stage::Order, HashSet::from([Stage::Review]));
			m.insert(Stage::Review, HashSet::from([Stage::Manufacturing]));
			m.insert(Stage::Manufacturing, HashSet::from([Stage::Printing]));
			m.insert(Stage::Printing, HashSet::from([Stage::Completed]));
			m.insert(Stage::Completed, HashSet::new()); // terminal
			m
		});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}

	/// Rejects operations on cancelled orders.
	pub fn ensure_open(order: &Order, operation: &str) -> Result<(), WorkflowError> {
		if order.is_cancelled() {
			return Err(WorkflowError::guard(format!(
				"Cannot {} order {}: the order is cancelled",
				operation, order.order_number
			)));
		}
		Ok(())
	}

	/// Requires the order to be open and in `stage`.
	pub fn ensure_stage(order: &Order, stage: Stage, operation: &str) -> Result<(), WorkflowError> {
		Self::ensure_open(order, operation)?;
		if order.stage != stage {
			return Err(WorkflowError::guard(format!(
				"Cannot {} order {}: it must be in the {} stage but is in {}",
				operation, order.order_number, stage, order.stage
			)));
		}
		Ok(())
	}

	/// Requires the order to be open and allowed to move forward to `to`.
	pub fn ensure_transition(order: &Order, to: Stage) -> Result<(), WorkflowError> {
		let operation = format!("move to {}", to.as_str());
		Self::ensure_open(order, &operation)?;
		if !Self::is_valid_transition(order.stage, to) {
			return Err(WorkflowError::guard(format!(
				"Cannot {} order {}: invalid transition from {} to {}",
				operation, order.order_number, order.stage, to
			)));
		}
		Ok(())
	}

	/// Applies `update` to a loaded order and stages the write and its
	/// timeline entry.
	///
	/// The write is conditional on the order row being unchanged since it was
	/// loaded. Returns the updated order.
	pub fn record<F>(
		&self,
		uow: &mut UnitOfWork,
		tracked: &Tracked<Order>,
		actor: &Actor,
		action: TimelineAction,
		notes: Option<String>,
		update: F,
	) -> Result<Order, WorkflowError>
	where
		F: FnOnce(&mut Order, DateTime<Utc>),
	{
		let now = self.now();
		let mut order = tracked.value.clone();
		update(&mut order, now);
		order.mark_modified(actor, now);

		uow.expect_unchanged(tracked);
		uow.put(StorageTable::Orders.as_str(), &order.id.to_string(), &order)?;
		self.timeline
			.append(uow, &order, action, notes, actor, now)?;
		Ok(order)
	}

	/// Stages the insert of a brand-new order and its first timeline entry.
	///
	/// The order number index row must not exist, which keeps order numbers
	/// unique even when two creates race.
	pub fn record_new(
		&self,
		uow: &mut UnitOfWork,
		order: &Order,
		actor: &Actor,
		notes: Option<String>,
	) -> Result<(), WorkflowError> {
		let id = order.id.to_string();
		uow.expect_absent(StorageTable::Orders.as_str(), &id);
		uow.put(StorageTable::Orders.as_str(), &id, order)?;
		uow.expect_absent(StorageTable::OrderNumbers.as_str(), &order.order_number);
		uow.put(StorageTable::OrderNumbers.as_str(), &order.order_number, &order.id)?;
		self.timeline
			.append(uow, order, TimelineAction::Created, notes, actor, order.created_at)?;
		Ok(())
	}

	/// Commits a unit of work.
	pub async fn commit(&self, uow: UnitOfWork) -> Result<(), WorkflowError> {
		self.storage.commit(uow).await?;
		Ok(())
	}
}
