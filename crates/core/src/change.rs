// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::time::SystemTime;

use crate::context::ChangeContext;
use crate::property::PropertyId;
use crate::source::SourceId;
use crate::value::PropertyValue;

/// An immutable record of one property mutation (spec §3): the tuple
/// `(property, old_value, new_value, originating_source?, changed_ts,
/// received_ts)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
	pub property: PropertyId,
	pub old_value: PropertyValue,
	pub new_value: PropertyValue,
	pub originating_source: Option<SourceId>,
	pub changed_ts: SystemTime,
	pub received_ts: SystemTime,
}

impl Change {
	/// Stamps `originating_source`/`changed_ts`/`received_ts` from the
	/// ambient `ChangeContext` (spec §4.2) in effect when the write was
	/// made. A `ctx` field left unset (e.g. no adapter ever called
	/// `ChangeContext::from_source` for this flow) falls back to
	/// `SystemTime::now()`, the same as a purely local, non-adapter
	/// write would expect.
	pub fn new(
		property: PropertyId,
		old_value: PropertyValue,
		new_value: PropertyValue,
		ctx: &ChangeContext,
	) -> Self {
		Self {
			property,
			old_value,
			new_value,
			originating_source: ctx.source.clone(),
			changed_ts: ctx.changed_ts.unwrap_or_else(SystemTime::now),
			received_ts: ctx.received_ts.unwrap_or_else(SystemTime::now),
		}
	}

	/// A copy of `self` with old/new swapped, used to build a revert
	/// write (spec §4.4 Step D, §4.5 Stage 4).
	pub fn reverted(&self) -> Self {
		Self {
			property: self.property.clone(),
			old_value: self.new_value.clone(),
			new_value: self.old_value.clone(),
			originating_source: self.originating_source.clone(),
			changed_ts: self.changed_ts,
			received_ts: self.received_ts,
		}
	}
}
