// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::fmt::{Display, Formatter};

use crate::property::PropertyId;

/// The error taxonomy for the interceptor/transaction core (§7).
///
/// Manual `Display`/`std::error::Error` impls instead of a derive-macro
/// crate: every variant carries the context a caller needs to report the
/// failure without re-deriving it from a wrapped source error.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	/// Fail-fast coercion failure, raised before the write chain runs.
	/// Never enters the pending-change buffer.
	TypeCoercion { property: PropertyId, expected: &'static str, found: &'static str },

	/// A `Validator` rejected a write during capture.
	Validation { property: PropertyId, message: String },

	/// A write was attempted against a derived property.
	DerivedPropertyWrite { property: PropertyId },

	/// `begin` called while a transaction is already current for the flow.
	NestedTransaction,

	/// `commit` called on a transaction that already committed.
	AlreadyCommitted,

	/// Any operation called on a disposed transaction.
	ObjectDisposed,

	/// `begin`'s cancellation token was already cancelled.
	Cancelled,

	/// Optimistic Stage 1 conflict under `FailOnConflict`.
	Conflict { property: PropertyId },

	/// `SingleWrite` requirement violated (distinct sources, or batch size).
	RequirementViolation { message: String },

	/// A source's `write_changes` reported a failure for this property.
	SourceWrite { property: PropertyId, message: String },

	/// A local property setter threw during Stage 4 apply.
	LocalApply { property: PropertyId, message: String },

	/// A revert (source or local) failed during Rollback.
	Revert { property: PropertyId, message: String },
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::TypeCoercion { property, expected, found } => write!(
				f,
				"cannot assign {found} to property {property} declared as {expected}"
			),
			Error::Validation { property, message } => {
				write!(f, "validation failed for property {property}: {message}")
			}
			Error::DerivedPropertyWrite { property } => {
				write!(f, "property {property} is derived and cannot be written")
			}
			Error::NestedTransaction => write!(f, "Nested transactions are not supported"),
			Error::AlreadyCommitted => write!(f, "transaction has already committed"),
			Error::ObjectDisposed => write!(f, "transaction has been disposed"),
			Error::Cancelled => write!(f, "begin was cancelled"),
			Error::Conflict { property } => {
				write!(f, "conflict detected on property {property}")
			}
			Error::RequirementViolation { message } => write!(f, "{message}"),
			Error::SourceWrite { property, message } => {
				write!(f, "source write failed for property {property}: {message}")
			}
			Error::LocalApply { property, message } => {
				write!(f, "local setter failed for property {property}: {message}")
			}
			Error::Revert { property, message } => {
				write!(f, "revert failed for property {property}: {message}")
			}
		}
	}
}

impl std::error::Error for Error {}

#[macro_export]
macro_rules! requirement_violation {
	($($args:tt)*) => { $crate::error::Error::RequirementViolation { message: format!($($args)*) } };
}
