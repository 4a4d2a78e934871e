//! Configuration validation utilities for pluggable backends.
//!
//! Each backend validates its raw `toml::Value` section against a [`Schema`]
//! before it is built, so misconfigured sections fail at startup with the
//! offending field named.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when an unexpected key is present.
	#[error("Unknown field: {0}")]
	UnknownField(String),
}

impl ValidationError {
	fn type_mismatch(field: &str, expected: &str, value: &toml::Value) -> Self {
		ValidationError::TypeMismatch {
			field: field.to_string(),
			expected: expected.to_string(),
			actual: value.type_str().to_string(),
		}
	}

	/// Qualifies the field name with the enclosing table.
	fn within(self, table: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => ValidationError::MissingField(format!("{}.{}", table, f)),
			ValidationError::UnknownField(f) => ValidationError::UnknownField(format!("{}.{}", table, f)),
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", table, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", table, field),
				expected,
				actual,
			},
		}
	}
}

/// The type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A nested table with its own schema.
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named, typed field of a schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Validation schema for one TOML table.
///
/// Keys that are neither required nor optional are rejected, so typos in a
/// backend section surface instead of silently falling back to defaults.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// # Errors
	///
	/// Returns the first problem found: a non-table root, a missing required
	/// field, an unknown key, a type mismatch, a bound violation or a failed
	/// custom validator. Nested table errors carry a dotted field path.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::type_mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		if let Some(unknown) = table.keys().find(|key| !self.declares(key)) {
			return Err(ValidationError::UnknownField(unknown.clone()));
		}

		Ok(())
	}

	fn declares(&self, key: &str) -> bool {
		self.required
			.iter()
			.chain(self.optional.iter())
			.any(|field| field.name == key)
	}
}

fn check_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String if value.is_str() => Ok(()),
		FieldType::String => Err(ValidationError::type_mismatch(field_name, "string", value)),
		FieldType::Boolean if value.is_bool() => Ok(()),
		FieldType::Boolean => Err(ValidationError::type_mismatch(field_name, "boolean", value)),
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| ValidationError::type_mismatch(field_name, "integer", value))?;
			let out_of_range = |message: String| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message,
			};
			match (min, max) {
				(Some(min_val), _) if int_val < *min_val => Err(out_of_range(format!(
					"Value {} is less than minimum {}",
					int_val, min_val
				))),
				(_, Some(max_val)) if int_val > *max_val => Err(out_of_range(format!(
					"Value {} is greater than maximum {}",
					int_val, max_val
				))),
				_ => Ok(()),
			}
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| e.within(field_name)),
	}
}

/// Trait defining a configuration schema that can validate TOML values.
///
/// Storage backends return one from `config_schema()` so the section they were
/// built from can be checked independently of the backend itself.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn storage_schema() -> Schema {
		Schema::new(
			vec![Field::new("storage_path", FieldType::String)],
			vec![Field::new(
				"lock_timeout_ms",
				FieldType::Integer {
					min: Some(0),
					max: Some(60_000),
				},
			)],
		)
	}

	#[test]
	fn test_missing_required_field() {
		let config: toml::Value = toml::from_str("lock_timeout_ms = 10").unwrap();
		let err = storage_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(ref f) if f == "storage_path"));
	}

	#[test]
	fn test_integer_bounds() {
		let config: toml::Value =
			toml::from_str("storage_path = \"./data\"\nlock_timeout_ms = 90000").unwrap();
		let err = storage_schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("greater than maximum"));
	}

	#[test]
	fn test_unknown_field_rejected() {
		let config: toml::Value =
			toml::from_str("storage_path = \"./data\"\nstorage_pth = \"typo\"").unwrap();
		let err = storage_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::UnknownField(ref f) if f == "storage_pth"));
	}

	#[test]
	fn test_custom_validator_runs() {
		let schema = Schema::new(
			vec![Field::new("storage_path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(path) if !path.trim().is_empty() => Ok(()),
					_ => Err("path cannot be blank".to_string()),
				}
			})],
			vec![],
		);
		let config: toml::Value = toml::from_str("storage_path = \"  \"").unwrap();
		let err = schema.validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::InvalidValue { .. }));
	}

	#[test]
	fn test_nested_table_errors_are_prefixed() {
		let schema = Schema::new(
			vec![Field::new("inner", FieldType::Table(storage_schema()))],
			vec![],
		);
		let config: toml::Value = toml::from_str("[inner]\nlock_timeout_ms = 1").unwrap();
		let err = schema.validate(&config).unwrap_err();
		assert_eq!(err.to_string(), "Missing required field: inner.storage_path");
	}
}
