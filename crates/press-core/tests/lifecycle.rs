mod common;

use chrono::Duration;
use common::*;
use press_core::{OrderStateMachine, WorkflowError, WorkflowSettings};
use press_storage::implementations::memory::MemoryStorage;
use press_types::{EmptyChecklistPolicy, Stage, Status, TimelineAction};
use rust_decimal::Decimal;
use std::str::FromStr;

#[tokio::test]
async fn test_create_then_move_to_review() {
	let h = harness();
	let actor = planner();

	let order = h.engine.create_order(&new_order("ORD-1"), &actor).await.unwrap();
	assert_eq!((order.stage, order.status), (Stage::Order, Status::Pending));
	assert_eq!(order.priority, 999);
	assert_eq!(order.version, 1);
	assert_eq!(order.created_by, "u-100");

	h.clock.advance(Duration::minutes(5));
	let order = h.engine.move_to_review(order.id, None, &actor).await.unwrap();
	assert_eq!((order.stage, order.status), (Stage::Review, Status::UnderReview));
	assert_eq!(order.last_modified_at, Some(h.clock_now()));
	assert_eq!(order.last_modified_by.as_deref(), Some("u-100"));

	let timeline = h.engine.timeline(order.id).await.unwrap();
	assert_eq!(timeline.len(), 2);
	assert_eq!(timeline[0].action, TimelineAction::MovedToReview);
	assert_eq!(timeline[0].stage, Stage::Review);
	assert_eq!(timeline[0].status, Status::UnderReview);
	assert_eq!(timeline[0].actor_name, "Priya Planner");
	assert_eq!(timeline[1].action, TimelineAction::Created);
}

#[tokio::test]
async fn test_create_rejects_invalid_input_with_every_reason() {
	let h = harness();
	let mut input = new_order("  ");
	input.intake.quantity = 0;
	input.priority = Some(0);

	let err = h.engine.create_order(&input, &planner()).await.unwrap_err();
	assert!(err.is_guard_violation());
	assert_eq!(err.messages().len(), 3);
	assert!(h.engine.list_orders(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_order_number_rejected() {
	let h = harness();
	h.engine.create_order(&new_order("ORD-7"), &planner()).await.unwrap();

	let err = h
		.engine
		.create_order(&new_order("ORD-7"), &planner())
		.await
		.unwrap_err();
	assert!(err.to_string().contains("ORD-7 already exists"));
	assert_eq!(h.engine.list_orders(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_printing_gate_blocks_until_checklist_complete() {
	let h = harness();
	let actor = operator();
	let order = order_in_manufacturing(&h, "ORD-2", &["Lamination", "Varnish", "Slitting"]).await;

	let items = h.engine.checklist(order.id).await.unwrap();
	assert_eq!(items.len(), 3);
	h.engine
		.complete_checklist_item(order.id, items[0].id, &actor)
		.await
		.unwrap();
	h.engine
		.complete_checklist_item(order.id, items[1].id, &actor)
		.await
		.unwrap();
	assert!(!h.engine.checklist_completed(order.id).await.unwrap());
	assert_eq!(
		h.engine.completion_percentage(order.id).await.unwrap(),
		Decimal::from_str("66.67").unwrap()
	);

	let err = h
		.engine
		.move_to_printing(order.id, None, &actor)
		.await
		.unwrap_err();
	assert!(matches!(err, WorkflowError::GuardViolation(_)));
	assert!(err.to_string().contains("incomplete"));
	assert!(err.to_string().contains("Slitting"));
	let unchanged = h.engine.get_order(order.id).await.unwrap();
	assert_eq!(unchanged.stage, Stage::Manufacturing);
	assert_eq!(unchanged.version, order.version + 2);

	h.clock.advance(Duration::hours(3));
	h.engine
		.complete_checklist_item(order.id, items[2].id, &actor)
		.await
		.unwrap();
	let printing = h
		.engine
		.move_to_printing(order.id, Some("All additions done".into()), &actor)
		.await
		.unwrap();
	assert_eq!((printing.stage, printing.status), (Stage::Printing, Status::InPrinting));
	assert_eq!(printing.manufacturing.ended_at, Some(h.clock_now()));
	assert_eq!(printing.manufacturing.notes.as_deref(), Some("All additions done"));
}

#[tokio::test]
async fn test_checklist_item_completes_only_once() {
	let h = harness();
	let order = order_in_manufacturing(&h, "ORD-3", &["Lamination"]).await;
	let item = &h.engine.checklist(order.id).await.unwrap()[0];

	let done = h
		.engine
		.complete_checklist_item(order.id, item.id, &operator())
		.await
		.unwrap();
	assert!(done.is_completed);

	let err = h
		.engine
		.complete_checklist_item(order.id, item.id, &operator())
		.await
		.unwrap_err();
	assert!(matches!(err, WorkflowError::AlreadyInState(_)));
	assert!(h.engine.checklist(order.id).await.unwrap()[0].is_completed);
}

#[tokio::test]
async fn test_item_of_another_order_rejected() {
	let h = harness();
	let first = order_in_manufacturing(&h, "ORD-4", &["Lamination"]).await;
	let second = order_in_manufacturing(&h, "ORD-5", &["Varnish"]).await;
	let foreign = h.engine.checklist(second.id).await.unwrap()[0].id;

	let err = h
		.engine
		.complete_checklist_item(first.id, foreign, &operator())
		.await
		.unwrap_err();
	assert!(err.is_guard_violation());
	assert!(!h.engine.checklist(second.id).await.unwrap()[0].is_completed);
}

#[tokio::test]
async fn test_completed_item_of_another_order_rejected_as_foreign() {
	let h = harness();
	let first = order_in_manufacturing(&h, "ORD-6", &["Lamination"]).await;
	let second = order_in_manufacturing(&h, "ORD-7", &["Varnish"]).await;
	let foreign = h.engine.checklist(second.id).await.unwrap()[0].id;
	h.engine
		.complete_checklist_item(second.id, foreign, &operator())
		.await
		.unwrap();

	let err = h
		.engine
		.complete_checklist_item(first.id, foreign, &operator())
		.await
		.unwrap_err();
	assert!(matches!(err, WorkflowError::GuardViolation(_)));
	assert!(err.to_string().contains("does not belong"));
	assert_eq!(h.engine.get_order(first.id).await.unwrap().version, first.version);
}

#[tokio::test]
async fn test_resubmitted_review_replaces_checklist() {
	let h = harness();
	let actor = planner();
	let order = h.engine.create_order(&new_order("ORD-6"), &actor).await.unwrap();
	h.engine.move_to_review(order.id, None, &actor).await.unwrap();

	h.engine
		.update_review(order.id, &review_with(&["Lamination", "Varnish"]), &actor)
		.await
		.unwrap();
	let reviewed = h
		.engine
		.update_review(order.id, &review_with(&["Die cut"]), &actor)
		.await
		.unwrap();

	let items = h.engine.checklist(order.id).await.unwrap();
	assert_eq!(items.len(), 1);
	assert_eq!(items[0].addition.name, "Die cut");
	assert_eq!(items[0].display_order, 1);
	let review = reviewed.review.unwrap();
	assert_eq!(review.reviewed_by, "u-100");
	assert_eq!(review.selections.machine.unwrap().name, "Press 2");
}

#[tokio::test]
async fn test_empty_checklist_policy_decides_printing_gate() {
	let allow = harness();
	let order = order_in_manufacturing(&allow, "ORD-8", &[]).await;
	allow
		.engine
		.move_to_printing(order.id, None, &operator())
		.await
		.unwrap();

	let block = harness_with(
		Box::new(MemoryStorage::new()),
		WorkflowSettings {
			empty_checklist: EmptyChecklistPolicy::Block,
			..WorkflowSettings::default()
		},
	);
	let order = order_in_manufacturing(&block, "ORD-8", &[]).await;
	let err = block
		.engine
		.move_to_printing(order.id, None, &operator())
		.await
		.unwrap_err();
	assert!(err.to_string().contains("no manufacturing items"));
}

#[tokio::test]
async fn test_full_lifecycle_timeline_is_a_path() {
	let h = harness();
	let actor = operator();
	let order = order_in_manufacturing(&h, "ORD-9", &["Lamination"]).await;
	let item = h.engine.checklist(order.id).await.unwrap()[0].id;
	h.engine.complete_checklist_item(order.id, item, &actor).await.unwrap();
	h.engine.move_to_printing(order.id, None, &actor).await.unwrap();
	h.clock.advance(Duration::hours(1));
	h.engine.start_printing(order.id, None, &actor).await.unwrap();
	h.clock.advance(Duration::hours(2));
	let done = h
		.engine
		.complete_printing(order.id, Some("Shipped".into()), &actor)
		.await
		.unwrap();

	assert_eq!((done.stage, done.status), (Stage::Completed, Status::Completed));
	assert_eq!(done.actual_delivery_date, Some(h.clock_now()));
	assert_eq!(done.printing.printed_by.as_deref(), Some("u-200"));

	// create, review, review payload, manufacturing, item, printing, start, complete
	let mut timeline = h.engine.timeline(order.id).await.unwrap();
	assert_eq!(timeline.len(), 8);
	assert_eq!(done.version, 8);
	timeline.reverse();

	let sequences: Vec<u64> = timeline.iter().map(|e| e.sequence).collect();
	assert_eq!(sequences, (1..=8).collect::<Vec<_>>());

	for pair in timeline.windows(2) {
		let (from, to) = (pair[0].stage, pair[1].stage);
		assert!(
			from == to || OrderStateMachine::is_valid_transition(from, to),
			"{} -> {}",
			from,
			to
		);
		assert_eq!(pair[1].status, to.canonical_status());
	}
	assert_eq!(
		h.engine.latest_timeline_entry(order.id).await.unwrap().unwrap().action,
		TimelineAction::PrintingCompleted
	);
}

#[tokio::test]
async fn test_out_of_order_moves_rejected_without_mutation() {
	let h = harness();
	let actor = planner();
	let order = h.engine.create_order(&new_order("ORD-10"), &actor).await.unwrap();

	for result in [
		h.engine.move_to_manufacturing(order.id, None, &actor).await,
		h.engine.move_to_printing(order.id, None, &actor).await,
		h.engine.start_printing(order.id, None, &actor).await,
		h.engine.complete_printing(order.id, None, &actor).await,
	] {
		assert!(result.unwrap_err().is_guard_violation());
	}

	assert_eq!(h.engine.get_order(order.id).await.unwrap().version, 1);
	assert_eq!(h.engine.timeline(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_printing_must_start_before_completing() {
	let h = harness();
	let order = order_in_printing(&h, new_order("ORD-11")).await;

	let err = h
		.engine
		.complete_printing(order.id, None, &operator())
		.await
		.unwrap_err();
	assert!(err.to_string().contains("not started"));

	h.engine.start_printing(order.id, None, &operator()).await.unwrap();
	let err = h
		.engine
		.start_printing(order.id, None, &operator())
		.await
		.unwrap_err();
	assert!(matches!(err, WorkflowError::AlreadyInState(_)));
}

#[tokio::test]
async fn test_printing_notes_kept_unless_replaced() {
	let h = harness();
	let order = order_in_printing(&h, new_order("ORD-12")).await;

	let started = h
		.engine
		.start_printing(order.id, Some("Roll 1 loaded".to_string()), &operator())
		.await
		.unwrap();
	assert_eq!(started.printing.notes.as_deref(), Some("Roll 1 loaded"));

	let completed = h
		.engine
		.complete_printing(order.id, None, &operator())
		.await
		.unwrap();
	assert_eq!(completed.printing.notes.as_deref(), Some("Roll 1 loaded"));
	assert_eq!(completed.stage, Stage::Completed);

	let other = order_in_printing(&h, new_order("ORD-13")).await;
	h.engine.start_printing(other.id, None, &operator()).await.unwrap();
	let completed = h
		.engine
		.complete_printing(other.id, Some("Shipped".to_string()), &operator())
		.await
		.unwrap();
	assert_eq!(completed.printing.notes.as_deref(), Some("Shipped"));
}

#[tokio::test]
async fn test_cancel_rules() {
	let h = harness();
	let actor = planner();

	let printing = order_in_printing(&h, new_order("ORD-12")).await;
	let cancelled = h
		.engine
		.cancel_order(printing.id, Some("Customer withdrew".into()), &actor)
		.await
		.unwrap();
	assert_eq!(cancelled.status, Status::Cancelled);
	assert_eq!(cancelled.stage, Stage::Printing);
	let entry = h.engine.latest_timeline_entry(printing.id).await.unwrap().unwrap();
	assert_eq!(entry.notes.as_deref(), Some("Customer withdrew"));

	let again = h.engine.cancel_order(printing.id, None, &actor).await.unwrap_err();
	assert!(matches!(again, WorkflowError::AlreadyInState(_)));

	let err = h.engine.start_printing(printing.id, None, &actor).await.unwrap_err();
	assert!(err.to_string().contains("cancelled"));

	let completed = order_in_printing(&h, new_order("ORD-13")).await;
	h.engine.start_printing(completed.id, None, &actor).await.unwrap();
	h.engine.complete_printing(completed.id, None, &actor).await.unwrap();
	let err = h.engine.cancel_order(completed.id, None, &actor).await.unwrap_err();
	assert!(matches!(err, WorkflowError::GuardViolation(_)));
	assert_eq!(
		h.engine.get_order(completed.id).await.unwrap().status,
		Status::Completed
	);
}

#[tokio::test]
async fn test_admin_overrides_record_old_and_new() {
	let h = harness();
	let actor = planner();
	let order = order_in_printing(&h, new_order("ORD-14")).await;

	let held = h
		.engine
		.change_status(order.id, Status::OnHold, None, &actor)
		.await
		.unwrap();
	assert_eq!((held.stage, held.status), (Stage::Printing, Status::OnHold));
	let entry = h.engine.latest_timeline_entry(order.id).await.unwrap().unwrap();
	assert_eq!(entry.notes.as_deref(), Some("InPrinting → OnHold"));

	let back = h
		.engine
		.change_stage(order.id, Stage::Review, Some("Reprint proof".into()), &actor)
		.await
		.unwrap();
	assert_eq!((back.stage, back.status), (Stage::Review, Status::UnderReview));
	let entry = h.engine.latest_timeline_entry(order.id).await.unwrap().unwrap();
	assert_eq!(entry.action, TimelineAction::StageChanged);
	assert_eq!(entry.notes.as_deref(), Some("Printing → Review: Reprint proof"));

	let err = h
		.engine
		.change_stage(order.id, Stage::Review, None, &actor)
		.await
		.unwrap_err();
	assert!(matches!(err, WorkflowError::AlreadyInState(_)));
}

#[tokio::test]
async fn test_intake_editable_only_in_order_stage() {
	let h = harness();
	let actor = planner();
	let order = h.engine.create_order(&new_order("ORD-15"), &actor).await.unwrap();

	let mut intake = order.intake.clone();
	intake.quantity = 7500;
	let updated = h
		.engine
		.update_intake(order.id, &intake, Some(date(2024, 2, 1)), &actor)
		.await
		.unwrap();
	assert_eq!(updated.intake.quantity, 7500);
	assert_eq!(updated.expected_delivery_date, date(2024, 2, 1));

	h.engine.move_to_review(order.id, None, &actor).await.unwrap();
	let err = h
		.engine
		.update_intake(order.id, &intake, None, &actor)
		.await
		.unwrap_err();
	assert!(err.is_guard_violation());
}

#[tokio::test]
async fn test_deleted_order_is_invisible() {
	let h = harness();
	let actor = planner();
	let order = order_in_printing(&h, new_order("ORD-16")).await;

	h.engine
		.delete_order(order.id, Some("Duplicate entry".into()), &actor)
		.await
		.unwrap();

	assert!(matches!(
		h.engine.get_order(order.id).await,
		Err(WorkflowError::NotFound { .. })
	));
	assert!(matches!(
		h.engine.find_by_order_number("ORD-16").await,
		Err(WorkflowError::NotFound { .. })
	));
	assert!(h.engine.print_queue().await.unwrap().is_empty());
	assert!(matches!(
		h.engine.cancel_order(order.id, None, &actor).await,
		Err(WorkflowError::NotFound { .. })
	));
	// The number stays reserved.
	let err = h
		.engine
		.create_order(&new_order("ORD-16"), &actor)
		.await
		.unwrap_err();
	assert!(err.is_guard_violation());
}

#[tokio::test]
async fn test_find_by_order_number() {
	let h = harness();
	let created = h.engine.create_order(&new_order("ORD-17"), &planner()).await.unwrap();
	let found = h.engine.find_by_order_number("ORD-17").await.unwrap();
	assert_eq!(found.id, created.id);
	assert!(matches!(
		h.engine.find_by_order_number("ORD-404").await,
		Err(WorkflowError::NotFound { .. })
	));
}
