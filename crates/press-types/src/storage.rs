//! Storage-related types for the workflow.

use std::str::FromStr;

/// Storage tables for the persisted collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTable {
	/// Order rows keyed by numeric id.
	Orders,
	/// Unique index from order number to order id.
	OrderNumbers,
	/// Manufacturing checklist items keyed by item id.
	ManufacturingItems,
	/// Timeline entries keyed by order id and sequence.
	Timeline,
	/// Id allocation counters.
	Sequences,
}

impl StorageTable {
	/// Returns the string representation of the storage table.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageTable::Orders => "orders",
			StorageTable::OrderNumbers => "order_numbers",
			StorageTable::ManufacturingItems => "manufacturing_items",
			StorageTable::Timeline => "timeline",
			StorageTable::Sequences => "sequences",
		}
	}

	/// Returns an iterator over all StorageTable variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::OrderNumbers,
			Self::ManufacturingItems,
			Self::Timeline,
			Self::Sequences,
		]
		.into_iter()
	}
}

impl FromStr for StorageTable {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"order_numbers" => Ok(Self::OrderNumbers),
			"manufacturing_items" => Ok(Self::ManufacturingItems),
			"timeline" => Ok(Self::Timeline),
			"sequences" => Ok(Self::Sequences),
			_ => Err(()),
		}
	}
}

impl From<StorageTable> for &'static str {
	fn from(table: StorageTable) -> Self {
		table.as_str()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_table_names_round_trip() {
		for table in StorageTable::all() {
			assert_eq!(table.as_str().parse::<StorageTable>(), Ok(table));
		}
		assert!("quotes".parse::<StorageTable>().is_err());
	}
}
