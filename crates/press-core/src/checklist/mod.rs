//! Manufacturing checklist gate.
//!
//! An order may only leave manufacturing once every checklist item is done.
//! Items are created when the review is submitted and afterwards only ever
//! flip from pending to completed.

use crate::WorkflowError;
use chrono::{DateTime, Utc};
use press_storage::{StorageError, StorageService, UnitOfWork};
use press_types::{Actor, CatalogRef, EmptyChecklistPolicy, ManufacturingItem, StorageTable};
use rust_decimal::Decimal;
use std::sync::Arc;

const ITEM_SEQUENCE: &str = "manufacturing_items";

pub struct ChecklistGate {
	storage: Arc<StorageService>,
	empty_policy: EmptyChecklistPolicy,
}

impl ChecklistGate {
	pub fn new(storage: Arc<StorageService>, empty_policy: EmptyChecklistPolicy) -> Self {
		Self {
			storage,
			empty_policy,
		}
	}

	pub fn empty_policy(&self) -> EmptyChecklistPolicy {
		self.empty_policy
	}

	/// Stages replacement of the order's checklist with `additions`, in order.
	///
	/// New items get `display_order` 1..=N and fresh ids.
	pub async fn replace_items(
		&self,
		uow: &mut UnitOfWork,
		order_id: u64,
		additions: &[CatalogRef],
	) -> Result<Vec<ManufacturingItem>, WorkflowError> {
		for existing in self.items(order_id).await? {
			uow.delete(
				StorageTable::ManufacturingItems.as_str(),
				&existing.id.to_string(),
			);
		}

		if additions.is_empty() {
			return Ok(Vec::new());
		}

		let ids = self
			.storage
			.reserve_ids(
				uow,
				StorageTable::Sequences.as_str(),
				ITEM_SEQUENCE,
				additions.len() as u64,
			)
			.await?;

		let mut items = Vec::with_capacity(additions.len());
		for ((id, addition), display_order) in ids.zip(additions).zip(1u32..) {
			let item = ManufacturingItem::pending(id, order_id, addition.clone(), display_order);
			uow.expect_absent(StorageTable::ManufacturingItems.as_str(), &id.to_string());
			uow.put(StorageTable::ManufacturingItems.as_str(), &id.to_string(), &item)?;
			items.push(item);
		}
		Ok(items)
	}

	/// Stages completion of one item of `order_id`.
	///
	/// Fails with `NotFound` for an unknown item, a guard violation for an item
	/// of another order and `AlreadyInState` if it is already completed.
	pub async fn complete_item(
		&self,
		uow: &mut UnitOfWork,
		order_id: u64,
		item_id: u64,
		actor: &Actor,
		at: DateTime<Utc>,
	) -> Result<ManufacturingItem, WorkflowError> {
		let tracked = match self
			.storage
			.retrieve_tracked::<ManufacturingItem>(
				StorageTable::ManufacturingItems.as_str(),
				&item_id.to_string(),
			)
			.await
		{
			Ok(tracked) => tracked,
			Err(StorageError::NotFound) => {
				return Err(WorkflowError::NotFound {
					entity: "Manufacturing item",
					id: item_id.to_string(),
				})
			},
			Err(e) => return Err(e.into()),
		};

		if tracked.value.order_id != order_id {
			return Err(WorkflowError::guard(format!(
				"Manufacturing item {} does not belong to order {}",
				item_id, order_id
			)));
		}
		if tracked.value.is_completed {
			return Err(WorkflowError::AlreadyInState(format!(
				"Manufacturing item '{}' is already completed",
				tracked.value.addition.name
			)));
		}

		let mut item = tracked.value.clone();
		item.is_completed = true;
		item.completed_at = Some(at);
		item.completed_by = Some(actor.id.clone());

		uow.expect_unchanged(&tracked);
		uow.put(
			StorageTable::ManufacturingItems.as_str(),
			&item.id.to_string(),
			&item,
		)?;
		Ok(item)
	}

	/// Returns the order's items ordered by `display_order`.
	pub async fn items(&self, order_id: u64) -> Result<Vec<ManufacturingItem>, WorkflowError> {
		let mut items = self
			.storage
			.find(
				StorageTable::ManufacturingItems.as_str(),
				|item: &ManufacturingItem| item.order_id == order_id,
			)
			.await?;
		items.sort_by_key(|item| (item.display_order, item.id));
		Ok(items)
	}

	/// Names of the items that are not yet completed.
	pub fn incomplete(items: &[ManufacturingItem]) -> Vec<&str> {
		items
			.iter()
			.filter(|item| !item.is_completed)
			.map(|item| item.addition.name.as_str())
			.collect()
	}

	/// True when every item is completed. An empty checklist answers according
	/// to the configured [`EmptyChecklistPolicy`].
	pub async fn all_completed(&self, order_id: u64) -> Result<bool, WorkflowError> {
		let items = self.items(order_id).await?;
		Ok(Self::is_complete(&items, self.empty_policy))
	}

	pub(crate) fn is_complete(items: &[ManufacturingItem], policy: EmptyChecklistPolicy) -> bool {
		if items.is_empty() {
			return policy.allows_empty();
		}
		items.iter().all(|item| item.is_completed)
	}

	/// completed / total x 100, rounded to two decimals; 0 for an empty list.
	pub async fn completion_percentage(&self, order_id: u64) -> Result<Decimal, WorkflowError> {
		let items = self.items(order_id).await?;
		Ok(Self::percentage(&items))
	}

	pub(crate) fn percentage(items: &[ManufacturingItem]) -> Decimal {
		if items.is_empty() {
			return Decimal::ZERO;
		}
		let completed = items.iter().filter(|item| item.is_completed).count();
		(Decimal::from(completed as u64) * Decimal::ONE_HUNDRED / Decimal::from(items.len() as u64))
			.round_dp(2)
	}
}
