//! Operator identity and catalog references.
//!
//! The workflow never resolves operators or catalog entries itself. Callers
//! hand in an [`Actor`] for every mutating operation, and orders carry
//! [`CatalogRef`] values that pair an external id with its display name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operator performing an action.
///
/// Both fields are opaque to the workflow; they are copied verbatim into
/// audit columns and timeline entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
	/// Stable identifier of the operator.
	pub id: String,
	/// Display name of the operator at the time of the action.
	pub name: String,
}

impl Actor {
	/// Creates a new actor from an id and a display name.
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.id)
	}
}

/// Reference to an entity owned by an external catalog (customer, product,
/// machine, manufacturing addition, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRef {
	/// Identifier in the owning catalog.
	pub id: u64,
	/// Display name, denormalized for listings.
	pub name: String,
}

impl CatalogRef {
	pub fn new(id: u64, name: impl Into<String>) -> Self {
		Self {
			id,
			name: name.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_actor_display() {
		let actor = Actor::new("u-17", "Dana");
		assert_eq!(actor.to_string(), "Dana (u-17)");
	}

	#[test]
	fn test_catalog_ref_serialization() {
		let machine = CatalogRef::new(4, "Flexo 8-colour");
		let json = serde_json::to_string(&machine).unwrap();
		assert_eq!(json, r#"{"id":4,"name":"Flexo 8-colour"}"#);
	}
}
