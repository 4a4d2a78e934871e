//! Time source for the workflow.
//!
//! Nothing in the core reads wall-clock time directly; every timestamp comes
//! from the [`Clock`] the engine was built with.

use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Used by tests.
#[derive(Debug)]
pub struct FixedClock {
	now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
	pub fn new(at: DateTime<Utc>) -> Self {
		Self {
			now: RwLock::new(at),
		}
	}

	pub fn set(&self, at: DateTime<Utc>) {
		*self.now.write().unwrap_or_else(|e| e.into_inner()) = at;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
		*now += by;
	}
}

impl Clock for FixedClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.read().unwrap_or_else(|e| e.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_fixed_clock_moves_only_when_told() {
		let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
		let clock = FixedClock::new(start);
		assert_eq!(clock.now(), start);
		assert_eq!(clock.now(), start);

		clock.advance(Duration::minutes(90));
		assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap());

		clock.set(start);
		assert_eq!(clock.now(), start);
	}
}
