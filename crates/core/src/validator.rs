// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use crate::property::PropertyId;
use crate::value::PropertyValue;

/// A single rejected write, produced by a [`Validator`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationError {
	pub property: PropertyId,
	pub message: String,
}

/// Cross-property validation hook (spec §6, component C7). May read other
/// properties while a transaction is open; those reads observe the
/// pending view (spec §4.5 "Capture"), enabling validation that spans
/// several properties written within the same transaction.
pub trait Validator: Send + Sync {
	fn validate(&self, property: &PropertyId, new_value: &PropertyValue) -> Vec<ValidationError>;
}

/// A validator that never rejects anything, for contexts that don't
/// configure one.
pub struct NoopValidator;

impl Validator for NoopValidator {
	fn validate(&self, _property: &PropertyId, _new_value: &PropertyValue) -> Vec<ValidationError> {
		Vec::new()
	}
}
