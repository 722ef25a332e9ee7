//! Response shape validation.
//!
//! A body is checked against a [`Shape`] before it is handed to serde, so a malformed payload
//! is rejected as a whole and never half-decoded into application state.

use super::types::ApiError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Expected shape of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
	Any,
	String,
	/// A string that must not be empty.
	NonEmptyString,
	UnsignedInteger,
	Boolean,
	Array(Box<Shape>),
	/// An object with these fields; fields not listed are allowed.
	Object(Vec<Field>),
}

/// One field of an object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub name: &'static str,
	pub shape: Shape,
	pub required: bool,
}

impl Field {
	pub fn required(name: &'static str, shape: Shape) -> Self {
		Self {
			name,
			shape,
			required: true,
		}
	}

	pub fn optional(name: &'static str, shape: Shape) -> Self {
		Self {
			name,
			shape,
			required: false,
		}
	}
}

impl Shape {
	pub fn array_of(item: Shape) -> Self {
		Shape::Array(Box::new(item))
	}

	pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
		Shape::Object(fields.into_iter().collect())
	}

	fn describe(&self) -> &'static str {
		match self {
			Shape::Any => "any value",
			Shape::String => "a string",
			Shape::NonEmptyString => "a non-empty string",
			Shape::UnsignedInteger => "an unsigned integer",
			Shape::Boolean => "a boolean",
			Shape::Array(_) => "an array",
			Shape::Object(_) => "an object",
		}
	}
}

/// Where and why a value did not match its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
	pub path: String,
	pub expected: &'static str,
}

impl std::fmt::Display for SchemaViolation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: expected {}", self.path, self.expected)
	}
}

/// Check `value` against `shape`, reporting the first mismatch.
pub fn validate(value: &Value, shape: &Shape) -> Result<(), SchemaViolation> {
	validate_at(value, shape, "$")
}

fn validate_at(value: &Value, shape: &Shape, path: &str) -> Result<(), SchemaViolation> {
	let ok = match (shape, value) {
		(Shape::Any, _) => true,
		(Shape::String, Value::String(_)) => true,
		(Shape::NonEmptyString, Value::String(s)) => !s.is_empty(),
		(Shape::UnsignedInteger, Value::Number(n)) => n.is_u64(),
		(Shape::Boolean, Value::Bool(_)) => true,
		(Shape::Array(item), Value::Array(items)) => {
			for (i, element) in items.iter().enumerate() {
				validate_at(element, item, &format!("{}[{}]", path, i))?;
			}
			true
		}
		(Shape::Object(fields), Value::Object(map)) => {
			for field in fields {
				let field_path = format!("{}.{}", path, field.name);
				match map.get(field.name) {
					Some(v) => validate_at(v, &field.shape, &field_path)?,
					None if field.required => {
						return Err(SchemaViolation {
							path: field_path,
							expected: "a required field",
						});
					}
					None => {}
				}
			}
			true
		}
		_ => false,
	};

	if ok {
		Ok(())
	} else {
		Err(SchemaViolation {
			path: path.to_string(),
			expected: shape.describe(),
		})
	}
}

/// Parse, validate and decode a response body.
///
/// An empty body is read as `null`. Any failure, including a serde error after a passed
/// validation, is reported as [`ApiError::SchemaInvalid`].
pub fn decode<T: DeserializeOwned>(body: &[u8], shape: &Shape) -> Result<T, ApiError> {
	let value = parse(body)?;
	validate(&value, shape).map_err(|v| ApiError::SchemaInvalid(v.to_string()))?;
	serde_json::from_value(value).map_err(|e| ApiError::SchemaInvalid(e.to_string()))
}

/// Parse and validate a body without decoding it.
pub fn check(body: &[u8], shape: &Shape) -> Result<(), ApiError> {
	let value = parse(body)?;
	validate(&value, shape).map_err(|v| ApiError::SchemaInvalid(v.to_string()))
}

fn parse(body: &[u8]) -> Result<Value, ApiError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}
	serde_json::from_slice(body).map_err(|e| ApiError::SchemaInvalid(format!("not JSON: {}", e)))
}

/// `{"access_token": "<non-empty>"}`
pub fn token_response() -> Shape {
	Shape::object([Field::required("access_token", Shape::NonEmptyString)])
}

/// `{"dernier": u64, "logs": [{"no": u64, "message": string}]}`
pub fn logs_response() -> Shape {
	let entry = Shape::object([
		Field::required("no", Shape::UnsignedInteger),
		Field::required("message", Shape::String),
	]);
	Shape::object([
		Field::required("dernier", Shape::UnsignedInteger),
		Field::required("logs", Shape::array_of(entry)),
	])
}

/// `{"blocs": [{"hash", "hash_precedent", "donnees", "horodatage"}]}`
pub fn chain_response() -> Shape {
	let block = Shape::object([
		Field::required("hash", Shape::String),
		Field::required("hash_precedent", Shape::String),
		Field::required("donnees", Shape::Any),
		Field::required("horodatage", Shape::UnsignedInteger),
	]);
	Shape::object([Field::required("blocs", Shape::array_of(block))])
}

/// Command endpoints acknowledge with any body.
pub fn ack_response() -> Shape {
	Shape::Any
}
