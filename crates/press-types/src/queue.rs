//! Print queue projection types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Order, Status};

/// One row of the print queue.
///
/// Rows are derived from orders on every read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintQueueEntry {
	/// 1-based position in the queue.
	pub position: usize,
	pub order_id: u64,
	pub order_number: String,
	pub customer_name: String,
	pub product_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub machine_name: Option<String>,
	pub quantity: u32,
	pub priority: u32,
	pub expected_delivery_date: NaiveDate,
	pub status: Status,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub printing_started_at: Option<DateTime<Utc>>,
}

impl PrintQueueEntry {
	/// Builds the queue row for an order at the given position.
	pub fn from_order(position: usize, order: &Order) -> Self {
		Self {
			position,
			order_id: order.id,
			order_number: order.order_number.clone(),
			customer_name: order.intake.customer.name.clone(),
			product_name: order.intake.product.name.clone(),
			machine_name: order.machine_name().map(str::to_string),
			quantity: order.intake.quantity,
			priority: order.priority,
			expected_delivery_date: order.expected_delivery_date,
			status: order.status,
			printing_started_at: order.printing.started_at,
		}
	}
}
