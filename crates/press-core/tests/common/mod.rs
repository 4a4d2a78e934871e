#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use press_core::{Clock, FixedClock, NewOrder, ReviewSubmission, WorkflowEngine, WorkflowSettings};
use press_storage::implementations::memory::MemoryStorage;
use press_storage::{StorageInterface, StorageService};
use press_types::{Actor, CatalogRef, Dimensions, IntakeDetails, Order};
use std::sync::Arc;

pub struct Harness {
	pub engine: WorkflowEngine,
	pub clock: Arc<FixedClock>,
	pub storage: Arc<StorageService>,
}

impl Harness {
	pub fn clock_now(&self) -> DateTime<Utc> {
		self.clock.now()
	}
}

pub fn harness() -> Harness {
	harness_with(Box::new(MemoryStorage::new()), WorkflowSettings::default())
}

pub fn harness_with(backend: Box<dyn StorageInterface>, settings: WorkflowSettings) -> Harness {
	let clock = Arc::new(FixedClock::new(
		Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap(),
	));
	let storage = Arc::new(StorageService::new(backend));
	let engine = WorkflowEngine::new(storage.clone(), clock.clone(), settings);
	Harness {
		engine,
		clock,
		storage,
	}
}

pub fn planner() -> Actor {
	Actor::new("u-100", "Priya Planner")
}

pub fn operator() -> Actor {
	Actor::new("u-200", "Omar Operator")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
	NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn new_order(order_number: &str) -> NewOrder {
	NewOrder {
		order_number: order_number.to_string(),
		priority: None,
		expected_delivery_date: date(2024, 1, 10),
		intake: IntakeDetails {
			customer: CatalogRef::new(1, "Acme Foods"),
			supplier: None,
			product: CatalogRef::new(7, "Shrink sleeve 500ml"),
			raw_material: Some(CatalogRef::new(3, "PETG 40µ")),
			dimensions: Dimensions {
				width_mm: Some(220.0),
				length_mm: Some(180.0),
				thickness_micron: Some(40.0),
			},
			quantity: 5000,
			notes: None,
		},
	}
}

pub fn review_with(additions: &[&str]) -> ReviewSubmission {
	let mut submission = ReviewSubmission {
		additions: additions
			.iter()
			.enumerate()
			.map(|(i, name)| CatalogRef::new(i as u64 + 1, *name))
			.collect(),
		notes: Some("Tooling checked".to_string()),
		..Default::default()
	};
	submission.selections.machine = Some(CatalogRef::new(2, "Press 2"));
	submission
}

/// Creates an order and drives it into manufacturing with the given checklist.
pub async fn order_in_manufacturing(h: &Harness, order_number: &str, additions: &[&str]) -> Order {
	let actor = planner();
	let order = h.engine.create_order(&new_order(order_number), &actor).await.unwrap();
	h.engine.move_to_review(order.id, None, &actor).await.unwrap();
	h.engine
		.update_review(order.id, &review_with(additions), &actor)
		.await
		.unwrap();
	h.engine
		.move_to_manufacturing(order.id, None, &actor)
		.await
		.unwrap()
}

/// Creates an order and drives it all the way into printing.
pub async fn order_in_printing(h: &Harness, input: NewOrder) -> Order {
	let actor = planner();
	let order = h.engine.create_order(&input, &actor).await.unwrap();
	h.engine.move_to_review(order.id, None, &actor).await.unwrap();
	h.engine
		.update_review(order.id, &review_with(&[]), &actor)
		.await
		.unwrap();
	h.engine
		.move_to_manufacturing(order.id, None, &actor)
		.await
		.unwrap();
	h.engine
		.move_to_printing(order.id, None, &actor)
		.await
		.unwrap()
}
