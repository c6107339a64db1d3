// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::change::Change;
use crate::context::current_change_context;
use crate::error::Error;
use crate::interceptor::{InterceptorChain, ReadAction, WriteAction};
use crate::observable::{ChangeObservable, NoopObservable};
use crate::property::PropertyId;
use crate::registry::Registry;
use crate::value::PropertyValue;

/// Backing store for property slots. A subject's "real" state lives
/// here; the core never reaches into user domain objects directly
/// (spec §3: "the core does not own them") — subjects interact with
/// this store only through `Context::read`/`Context::write`.
#[derive(Default)]
pub struct PropertyStore {
	slots: DashMap<PropertyId, PropertyValue>,
}

impl PropertyStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, property: &PropertyId) -> PropertyValue {
		self.slots.get(property).map(|v| v.clone()).unwrap_or(PropertyValue::Null)
	}

	pub fn set(&self, property: &PropertyId, value: PropertyValue) {
		self.slots.insert(property.clone(), value);
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ContextId {
	fn default() -> Self {
		Self::new()
	}
}

/// A process-level namespace grouping subjects that share interceptors,
/// the change observable, the registry and (from `interflux-transaction`)
/// a transaction manager (spec §3). Multiple independent contexts
/// coexist without interference — each owns its own store and chain.
pub struct Context {
	pub id: ContextId,
	pub(crate) store: PropertyStore,
	pub chain: InterceptorChain,
	pub registry: Arc<dyn Registry>,
	pub observable: Arc<dyn ChangeObservable>,
}

impl Context {
	pub fn new(registry: Arc<dyn Registry>) -> Self {
		Self {
			id: ContextId::new(),
			store: PropertyStore::new(),
			chain: InterceptorChain::new(),
			registry,
			observable: Arc::new(NoopObservable),
		}
	}

	pub fn with_observable(mut self, observable: Arc<dyn ChangeObservable>) -> Self {
		self.observable = observable;
		self
	}

	/// Reads `property` through the full read chain, including a
	/// short-circuit from the transaction interceptor if one is
	/// installed and the read's property has a pending change in the
	/// current transaction (spec §4.1).
	pub fn read(&self, property: &PropertyId) -> PropertyValue {
		self.read_inner(property, false)
	}

	/// Reads bypassing the transaction interceptor, so the actual
	/// stored value comes back regardless of any pending change.
	/// Used during commit-apply (spec §4.1, §4.5 Stage 4).
	pub fn read_bypassing_transaction(&self, property: &PropertyId) -> PropertyValue {
		self.read_inner(property, true)
	}

	fn read_inner(&self, property: &PropertyId, bypass_transaction: bool) -> PropertyValue {
		let current = self.store.get(property);
		if !bypass_transaction {
			if let Some(interceptor) = self.chain.transaction_read() {
				if let ReadAction::ShortCircuit(v) = interceptor.on_read(property, &current) {
					return v;
				}
			}
		}
		for interceptor in self.chain.other_reads() {
			if let ReadAction::ShortCircuit(v) = interceptor.on_read(property, &current) {
				return v;
			}
		}
		current
	}

	/// Writes `value` to `property` through the full write chain
	/// (spec §4.1). Fails fast with [`Error::TypeCoercion`] or
	/// [`Error::DerivedPropertyWrite`] before any interceptor runs.
	pub fn write(&self, property: &PropertyId, value: PropertyValue) -> Result<(), Error> {
		self.write_inner(property, value, false)
	}

	/// Writes bypassing the transaction interceptor, firing change
	/// notifications unconditionally once applied. Used by Stage 4
	/// apply and by reverts (spec §4.5).
	pub fn apply_bypassing_transaction(
		&self,
		property: &PropertyId,
		value: PropertyValue,
	) -> Result<(), Error> {
		self.write_inner(property, value, true)
	}

	fn write_inner(
		&self,
		property: &PropertyId,
		value: PropertyValue,
		bypass_transaction: bool,
	) -> Result<(), Error> {
		if let Some(meta) = self.registry.metadata(property) {
			if meta.is_derived {
				return Err(Error::DerivedPropertyWrite { property: property.clone() });
			}
			if let Err(expected) = value.check_assignable(meta.value_kind) {
				return Err(Error::TypeCoercion {
					property: property.clone(),
					expected,
					found: value.kind_name(),
				});
			}
		}

		let change_ctx = current_change_context();
		let old_value = self.store.get(property);
		let mut current_value = value;

		if !bypass_transaction {
			if let Some(interceptor) = self.chain.transaction_write() {
				match interceptor.on_write(property, &current_value, &change_ctx) {
					WriteAction::Continue(v) => current_value = v,
					WriteAction::Divert => return Ok(()),
					WriteAction::Abort(err) => return Err(err),
				}
			}
		}

		for interceptor in self.chain.other_writes() {
			match interceptor.on_write(property, &current_value, &change_ctx) {
				WriteAction::Continue(v) => current_value = v,
				WriteAction::Divert => return Ok(()),
				WriteAction::Abort(err) => return Err(err),
			}
		}

		self.store.set(property, current_value.clone());
		let change = Change::new(property.clone(), old_value, current_value, &change_ctx);
		self.observable.on_change(&change);
		Ok(())
	}
}
