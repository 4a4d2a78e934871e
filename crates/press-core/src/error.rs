//! Error taxonomy for workflow operations.

use press_storage::StorageError;
use thiserror::Error;

/// Failure of a workflow operation.
///
/// Every variant except [`Persistence`](WorkflowError::Persistence) is an
/// expected outcome; none of them leave a partial write behind.
#[derive(Debug, Error)]
pub enum WorkflowError {
	/// The order or item does not exist, or the order has been deleted.
	#[error("{entity} {id} not found")]
	NotFound { entity: &'static str, id: String },
	/// One or more preconditions of the operation do not hold.
	#[error("{}", .0.join("; "))]
	GuardViolation(Vec<String>),
	/// The operation has already been applied.
	#[error("{0}")]
	AlreadyInState(String),
	#[error("Persistence error: {0}")]
	Persistence(String),
	/// A competing write changed a row this operation depended on.
	#[error("Concurrent modification of '{0}'")]
	ConcurrencyConflict(String),
}

impl WorkflowError {
	pub fn order_not_found(id: impl ToString) -> Self {
		WorkflowError::NotFound {
			entity: "Order",
			id: id.to_string(),
		}
	}

	pub fn guard(message: impl Into<String>) -> Self {
		WorkflowError::GuardViolation(vec![message.into()])
	}

	/// True when the caller asked for something the order's state forbids.
	pub fn is_guard_violation(&self) -> bool {
		matches!(
			self,
			WorkflowError::GuardViolation(_) | WorkflowError::AlreadyInState(_)
		)
	}

	/// True when re-running the operation may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, WorkflowError::ConcurrencyConflict(_))
	}

	/// Human-readable messages, one per problem.
	pub fn messages(&self) -> Vec<String> {
		match self {
			WorkflowError::GuardViolation(messages) => messages.clone(),
			other => vec![other.to_string()],
		}
	}
}

impl From<StorageError> for WorkflowError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::Conflict(key) => WorkflowError::ConcurrencyConflict(key),
			other => WorkflowError::Persistence(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_guard_violation_lists_every_message() {
		let err = WorkflowError::GuardViolation(vec![
			"Quantity must be greater than zero".into(),
			"Priority must be at least 1".into(),
		]);
		assert!(err.is_guard_violation());
		assert!(!err.is_retryable());
		assert_eq!(err.messages().len(), 2);
		assert_eq!(
			err.to_string(),
			"Quantity must be greater than zero; Priority must be at least 1"
		);
	}

	#[test]
	fn test_storage_conflict_is_retryable() {
		let err: WorkflowError = StorageError::Conflict("orders:1".into()).into();
		assert!(err.is_retryable());
		assert!(!err.is_guard_violation());

		let err: WorkflowError = StorageError::Backend("disk full".into()).into();
		assert!(matches!(err, WorkflowError::Persistence(ref m) if m.contains("disk full")));
	}

	#[test]
	fn test_not_found_message() {
		assert_eq!(WorkflowError::order_not_found(7).to_string(), "Order 7 not found");
	}
}
