//! Order types for the production workflow.
//!
//! This module defines the order aggregate together with its stage and status
//! classifications and the payload collected at each work stage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Actor, CatalogRef};

/// Priority assigned to orders created without an explicit one.
pub const DEFAULT_PRIORITY: u32 = 999;

/// Position of an order in the physical production pipeline.
///
/// Variants are declared in pipeline order so that `Ord` follows the
/// direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
	/// Intake: the order has been registered.
	Order,
	/// Technical review of machine and tooling selections.
	Review,
	/// Manufacturing operations are being carried out.
	Manufacturing,
	/// The order is on the printing floor.
	Printing,
	/// Printing finished and the order was delivered.
	Completed,
}

impl Stage {
	/// Returns the status an order carries when it enters this stage.
	pub fn canonical_status(self) -> Status {
		match self {
			Stage::Order => Status::Pending,
			Stage::Review => Status::UnderReview,
			Stage::Manufacturing => Status::InManufacturing,
			Stage::Printing => Status::InPrinting,
			Stage::Completed => Status::Completed,
		}
	}

	/// Returns the stage that follows this one, if any.
	pub fn next(self) -> Option<Stage> {
		match self {
			Stage::Order => Some(Stage::Review),
			Stage::Review => Some(Stage::Manufacturing),
			Stage::Manufacturing => Some(Stage::Printing),
			Stage::Printing => Some(Stage::Completed),
			Stage::Completed => None,
		}
	}

	/// Returns an iterator over all stages in pipeline order.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Order,
			Self::Review,
			Self::Manufacturing,
			Self::Printing,
			Self::Completed,
		]
		.into_iter()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Stage::Order => "order",
			Stage::Review => "review",
			Stage::Manufacturing => "manufacturing",
			Stage::Printing => "printing",
			Stage::Completed => "completed",
		}
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Stage::Order => write!(f, "Order"),
			Stage::Review => write!(f, "Review"),
			Stage::Manufacturing => write!(f, "Manufacturing"),
			Stage::Printing => write!(f, "Printing"),
			Stage::Completed => write!(f, "Completed"),
		}
	}
}

impl FromStr for Stage {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|stage| stage.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("Unknown stage '{}'", s))
	}
}

/// Presentation and reporting facet of an order.
///
/// Transitions keep it in lockstep with [`Stage`]; operators can also set it
/// directly (e.g. to put an order on hold).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
	Pending,
	UnderReview,
	InManufacturing,
	InPrinting,
	Completed,
	Cancelled,
	OnHold,
}

impl Status {
	/// Returns an iterator over all statuses.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Pending,
			Self::UnderReview,
			Self::InManufacturing,
			Self::InPrinting,
			Self::Completed,
			Self::Cancelled,
			Self::OnHold,
		]
		.into_iter()
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Status::Pending => "pending",
			Status::UnderReview => "under_review",
			Status::InManufacturing => "in_manufacturing",
			Status::InPrinting => "in_printing",
			Status::Completed => "completed",
			Status::Cancelled => "cancelled",
			Status::OnHold => "on_hold",
		}
	}

	/// Completed and cancelled orders accept no further cancellation.
	pub fn is_terminal(&self) -> bool {
		matches!(self, Status::Completed | Status::Cancelled)
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Status::Pending => write!(f, "Pending"),
			Status::UnderReview => write!(f, "UnderReview"),
			Status::InManufacturing => write!(f, "InManufacturing"),
			Status::InPrinting => write!(f, "InPrinting"),
			Status::Completed => write!(f, "Completed"),
			Status::Cancelled => write!(f, "Cancelled"),
			Status::OnHold => write!(f, "OnHold"),
		}
	}
}

impl FromStr for Status {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.replace('-', "_");
		Self::all()
			.find(|status| {
				status.as_str().eq_ignore_ascii_case(&normalized)
					|| status.to_string().eq_ignore_ascii_case(s)
			})
			.ok_or_else(|| format!("Unknown status '{}'", s))
	}
}

/// Physical dimensions of the ordered product, in millimetres.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub width_mm: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub length_mm: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub thickness_micron: Option<f64>,
}

/// Fields captured at intake.
///
/// Editable only while the order is in [`Stage::Order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeDetails {
	pub customer: CatalogRef,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub supplier: Option<CatalogRef>,
	pub product: CatalogRef,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub raw_material: Option<CatalogRef>,
	#[serde(default)]
	pub dimensions: Dimensions,
	pub quantity: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Machine and tooling selections made during review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSelections {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub machine: Option<CatalogRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub core: Option<CatalogRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub knife: Option<CatalogRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub carton: Option<CatalogRef>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mold: Option<CatalogRef>,
}

/// Review payload as stored on the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDetails {
	#[serde(flatten)]
	pub selections: ReviewSelections,
	/// Actor id of the reviewer.
	pub reviewed_by: String,
	pub reviewed_at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Manufacturing stage timestamps and notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingDetails {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub started_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ended_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Printing stage timestamps, operator and notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintingDetails {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub started_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ended_at: Option<DateTime<Utc>>,
	/// Actor id of the operator who completed printing.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub printed_by: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Whether the order row is live or has been soft-deleted.
///
/// Deletion is a tombstone on the record, distinct from the
/// [`Status::Cancelled`] business outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RecordState {
	#[default]
	Active,
	Deleted {
		at: DateTime<Utc>,
		/// Actor id of the operator who deleted the order.
		by: String,
	},
}

/// A production order moving through the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Numeric identifier allocated at creation.
	pub id: u64,
	/// Business-facing order number, unique and immutable.
	pub order_number: String,
	/// Current pipeline stage.
	pub stage: Stage,
	/// Current status.
	pub status: Status,
	/// Queue priority, lower is more urgent. Always at least 1.
	pub priority: u32,
	/// Date the customer expects delivery.
	pub expected_delivery_date: NaiveDate,
	/// Set when printing completes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual_delivery_date: Option<DateTime<Utc>>,
	/// Intake fields.
	pub intake: IntakeDetails,
	/// Review payload, present once the review has been submitted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub review: Option<ReviewDetails>,
	#[serde(default)]
	pub manufacturing: ManufacturingDetails,
	#[serde(default)]
	pub printing: PrintingDetails,
	#[serde(default)]
	pub record_state: RecordState,
	pub created_at: DateTime<Utc>,
	/// Actor id of the creator.
	pub created_by: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_modified_at: Option<DateTime<Utc>>,
	/// Actor id of the last modifier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_modified_by: Option<String>,
	/// Concurrency token, incremented by every successful operation.
	/// Equals the number of timeline entries recorded for the order.
	pub version: u64,
}

impl Order {
	/// Returns true unless the order has been soft-deleted.
	pub fn is_active(&self) -> bool {
		matches!(self.record_state, RecordState::Active)
	}

	pub fn is_cancelled(&self) -> bool {
		self.status == Status::Cancelled
	}

	/// Stamps the audit columns and advances the concurrency token.
	pub fn mark_modified(&mut self, actor: &Actor, at: DateTime<Utc>) {
		self.last_modified_at = Some(at);
		self.last_modified_by = Some(actor.id.clone());
		self.version += 1;
	}

	/// Name of the machine selected at review, if any.
	pub fn machine_name(&self) -> Option<&str> {
		self.review
			.as_ref()
			.and_then(|review| review.selections.machine.as_ref())
			.map(|machine| machine.name.as_str())
	}
}
