// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use indexmap::IndexMap;
use interflux_core::{Change, ChangeContext, PropertyId, PropertyValue};

/// Per-transaction map of property → captured change, insertion-ordered
/// (spec §3, §4.3, component C3).
///
/// Owned exclusively by the transaction that opened it and accessed only
/// from the flow that opened it (spec §5 "Shared-resource policy") — it
/// is not `Sync` by design; callers hold it behind whatever
/// synchronization the transaction itself needs (a `Mutex`, in
/// `Transaction`).
#[derive(Default)]
pub struct PendingChangeBuffer {
	entries: IndexMap<PropertyId, Change>,
}

impl PendingChangeBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a write to `property`. The first write for a property
	/// establishes `old_value`, stamped with `change_ctx`'s originating
	/// source and timestamps (spec §4.2); every later write to the same
	/// property within this transaction only overwrites `new_value`
	/// (spec §3 invariant, §4.3 "Insertion semantics").
	pub fn record(
		&mut self,
		property: PropertyId,
		current_value: impl FnOnce() -> PropertyValue,
		new_value: PropertyValue,
		change_ctx: &ChangeContext,
	) {
		match self.entries.get_mut(&property) {
			Some(existing) => existing.new_value = new_value,
			None => {
				let old_value = current_value();
				self.entries.insert(
					property.clone(),
					Change::new(property, old_value, new_value, change_ctx),
				);
			}
		}
	}

	/// The pending `new_value` for `property`, if this transaction has
	/// captured a write to it — used by the transaction read
	/// interceptor to make the buffer behave like copy-on-write for
	/// readers in the same flow (spec §4.1).
	pub fn pending_value(&self, property: &PropertyId) -> Option<&PropertyValue> {
		self.entries.get(property).map(|change| &change.new_value)
	}

	pub fn contains(&self, property: &PropertyId) -> bool {
		self.entries.contains_key(property)
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Iterates pending changes in capture order (spec §4.3).
	pub fn iterate_in_order(&self) -> impl Iterator<Item = &Change> {
		self.entries.values()
	}

	/// Empties the buffer, returning its contents in capture order
	/// (spec §4.5 Stage 5 "Empty the pending buffer").
	pub fn remove_all(&mut self) -> Vec<Change> {
		std::mem::take(&mut self.entries).into_values().collect()
	}
}

#[cfg(test)]
mod tests {
	use interflux_core::SubjectId;

	use super::*;

	fn property(name: &str) -> PropertyId {
		PropertyId::new(SubjectId::new(), name)
	}

	#[test]
	fn first_write_establishes_old_value() {
		let mut buffer = PendingChangeBuffer::new();
		let p = property("FirstName");
		buffer.record(p.clone(), || PropertyValue::Null, PropertyValue::Text("John".into()), &ChangeContext::default());

		let change = buffer.iterate_in_order().next().unwrap();
		assert_eq!(change.old_value, PropertyValue::Null);
		assert_eq!(change.new_value, PropertyValue::Text("John".into()));
	}

	#[test]
	fn repeated_writes_collapse_keeping_first_old_value() {
		let mut buffer = PendingChangeBuffer::new();
		let p = property("FirstName");
		buffer.record(p.clone(), || PropertyValue::Text("Original".into()), PropertyValue::Text("A".into()), &ChangeContext::default());
		buffer.record(p.clone(), || panic!("current_value must not be recomputed"), PropertyValue::Text("B".into()), &ChangeContext::default());
		buffer.record(p.clone(), || panic!("current_value must not be recomputed"), PropertyValue::Text("C".into()), &ChangeContext::default());

		assert_eq!(buffer.len(), 1);
		let change = buffer.iterate_in_order().next().unwrap();
		assert_eq!(change.old_value, PropertyValue::Text("Original".into()));
		assert_eq!(change.new_value, PropertyValue::Text("C".into()));
	}

	#[test]
	fn preserves_insertion_order_across_distinct_properties() {
		let mut buffer = PendingChangeBuffer::new();
		let first = property("FirstName");
		let last = property("LastName");
		buffer.record(last.clone(), || PropertyValue::Null, PropertyValue::Text("Doe".into()), &ChangeContext::default());
		buffer.record(first.clone(), || PropertyValue::Null, PropertyValue::Text("John".into()), &ChangeContext::default());

		let order: Vec<_> = buffer.iterate_in_order().map(|c| c.property.clone()).collect();
		assert_eq!(order, vec![last, first]);
	}

	#[test]
	fn remove_all_empties_and_returns_captured_changes() {
		let mut buffer = PendingChangeBuffer::new();
		buffer.record(property("FirstName"), || PropertyValue::Null, PropertyValue::Text("John".into()), &ChangeContext::default());

		let drained = buffer.remove_all();
		assert_eq!(drained.len(), 1);
		assert!(buffer.is_empty());
	}
}
