//! Registry trait for self-registering implementations.
//!
//! Pluggable backends declare the name they are configured under and the
//! factory that builds them, so the service can assemble its factory map
//! without hard-coding either.

/// Base trait for implementation registries.
///
/// Each backend module provides a `Registry` struct implementing this trait.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "file" for `[storage.implementations.file]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
