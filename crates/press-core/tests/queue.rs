mod common;

use common::*;
use press_core::WorkflowError;
use press_types::TimelineAction;

#[tokio::test]
async fn test_equal_priority_ordered_by_delivery_date() {
	let h = harness();

	let mut later = new_order("ORD-A");
	later.priority = Some(5);
	later.expected_delivery_date = date(2024, 1, 10);
	let later = order_in_printing(&h, later).await;

	let mut sooner = new_order("ORD-B");
	sooner.priority = Some(5);
	sooner.expected_delivery_date = date(2024, 1, 5);
	let sooner = order_in_printing(&h, sooner).await;

	let queue = h.engine.print_queue().await.unwrap();
	let ids: Vec<u64> = queue.iter().map(|e| e.order_id).collect();
	assert_eq!(ids, vec![sooner.id, later.id]);
	assert_eq!(queue[0].position, 1);
	assert_eq!(queue[1].position, 2);
	assert_eq!(queue[0].machine_name.as_deref(), Some("Press 2"));
	assert_eq!(queue[0].customer_name, "Acme Foods");
}

#[tokio::test]
async fn test_queue_is_total_order_and_only_printing_orders() {
	let h = harness();
	let specs = [
		("ORD-1", 3, date(2024, 1, 9)),
		("ORD-2", 1, date(2024, 1, 20)),
		("ORD-3", 3, date(2024, 1, 9)),
		("ORD-4", 2, date(2024, 1, 1)),
	];
	for (number, priority, delivery) in specs {
		let mut input = new_order(number);
		input.priority = Some(priority);
		input.expected_delivery_date = delivery;
		order_in_printing(&h, input).await;
	}
	// Not yet printing, never queued.
	let mut urgent = new_order("ORD-5");
	urgent.priority = Some(1);
	h.engine.create_order(&urgent, &planner()).await.unwrap();

	let queue = h.engine.print_queue().await.unwrap();
	let numbers: Vec<&str> = queue.iter().map(|e| e.order_number.as_str()).collect();
	assert_eq!(numbers, vec!["ORD-2", "ORD-4", "ORD-1", "ORD-3"]);

	for pair in queue.windows(2) {
		let key = |e: &press_types::PrintQueueEntry| (e.priority, e.expected_delivery_date, e.order_id);
		assert!(key(&pair[0]) < key(&pair[1]));
	}
}

#[tokio::test]
async fn test_set_priority_below_one_changes_nothing() {
	let h = harness();
	let order = order_in_printing(&h, new_order("ORD-1")).await;
	let before = h.engine.timeline(order.id).await.unwrap().len();

	for priority in [0, -4] {
		let err = h
			.engine
			.set_priority(order.id, priority, &planner())
			.await
			.unwrap_err();
		assert!(matches!(err, WorkflowError::GuardViolation(_)));
	}

	let after = h.engine.get_order(order.id).await.unwrap();
	assert_eq!(after.priority, order.priority);
	assert_eq!(after.version, order.version);
	assert_eq!(h.engine.timeline(order.id).await.unwrap().len(), before);
}

#[tokio::test]
async fn test_set_priority_records_change() {
	let h = harness();
	let order = order_in_printing(&h, new_order("ORD-1")).await;

	let updated = h.engine.set_priority(order.id, 2, &planner()).await.unwrap();
	assert_eq!(updated.priority, 2);

	let entry = h.engine.latest_timeline_entry(order.id).await.unwrap().unwrap();
	assert_eq!(entry.action, TimelineAction::PriorityChanged);
	assert_eq!(entry.notes.as_deref(), Some("Priority changed: 999 → 2"));

	assert!(matches!(
		h.engine.set_priority(424242, 2, &planner()).await,
		Err(WorkflowError::NotFound { .. })
	));
}

#[tokio::test]
async fn test_reorder_audits_each_order_and_skips_unknown() {
	let h = harness();
	let first = order_in_printing(&h, new_order("ORD-1")).await;
	let second = order_in_printing(&h, new_order("ORD-2")).await;

	let report = h
		.engine
		.reorder_queue([(second.id, 1), (first.id, 2), (9999, 3)], &planner())
		.await
		.unwrap();
	assert_eq!(report.updated, vec![first.id, second.id]);
	assert_eq!(report.skipped, vec![9999]);

	let queue = h.engine.print_queue().await.unwrap();
	assert_eq!(queue[0].order_id, second.id);
	assert_eq!(queue[1].order_id, first.id);

	for (order, expected) in [(&first, "Priority changed: 999 → 2"), (&second, "Priority changed: 999 → 1")] {
		let entry = h.engine.latest_timeline_entry(order.id).await.unwrap().unwrap();
		assert_eq!(entry.action, TimelineAction::QueueReordered);
		assert_eq!(entry.notes.as_deref(), Some(expected));
		assert_eq!(entry.sequence, order.version + 1);
	}
}

#[tokio::test]
async fn test_reorder_with_invalid_priority_rejects_whole_batch() {
	let h = harness();
	let first = order_in_printing(&h, new_order("ORD-1")).await;
	let second = order_in_printing(&h, new_order("ORD-2")).await;

	let err = h
		.engine
		.reorder_queue([(first.id, 1), (second.id, 0)], &planner())
		.await
		.unwrap_err();
	assert!(err.is_guard_violation());

	for order in [&first, &second] {
		let current = h.engine.get_order(order.id).await.unwrap();
		assert_eq!(current.priority, 999);
		assert_eq!(current.version, order.version);
	}
}
