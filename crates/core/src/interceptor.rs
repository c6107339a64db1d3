// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::{Arc, RwLock};

use crate::context::ChangeContext;
use crate::error::Error;
use crate::property::PropertyId;
use crate::value::PropertyValue;

/// What a [`WriteInterceptor`] does with a write as it walks the chain
/// (spec §4.1): pass the (possibly transformed) value on, divert it away
/// from the underlying slot entirely, or abort the write outright.
pub enum WriteAction {
	Continue(PropertyValue),
	/// Diverts the write into the interceptor's own buffer. No later
	/// interceptor runs and the terminal step (slot assignment +
	/// notification) never happens for this write.
	Divert,
	Abort(Error),
}

/// What a [`ReadInterceptor`] does with a read as it walks the chain
/// (spec §4.1).
pub enum ReadAction {
	Continue,
	ShortCircuit(PropertyValue),
}

pub trait WriteInterceptor: Send + Sync {
	fn on_write(
		&self,
		property: &PropertyId,
		new_value: &PropertyValue,
		change_ctx: &ChangeContext,
	) -> WriteAction;
}

pub trait ReadInterceptor: Send + Sync {
	fn on_read(&self, property: &PropertyId, current_value: &PropertyValue) -> ReadAction;
}

/// A per-context, ordered interceptor chain (spec §4.1, component C1).
///
/// The transaction interceptor is tracked in its own slot rather than as
/// just another chain entry: that's what lets Stage 4 apply and reverts
/// (spec §4.5) bypass *only* it while still running every other
/// registered interceptor. The change-observable's "must run after the
/// transaction interceptor" ordering requirement is satisfied by
/// construction, not by a registration-time assertion: notification
/// firing is the chain's fixed terminal step (see `Context::write` in
/// `namespace.rs`), which by definition happens after every interceptor
/// — transactional or not — has had a chance to divert or abort first.
#[derive(Default)]
pub struct InterceptorChain {
	transaction_write: RwLock<Option<Arc<dyn WriteInterceptor>>>,
	transaction_read: RwLock<Option<Arc<dyn ReadInterceptor>>>,
	other_writes: RwLock<Vec<Arc<dyn WriteInterceptor>>>,
	other_reads: RwLock<Vec<Arc<dyn ReadInterceptor>>>,
}

impl InterceptorChain {
	pub fn new() -> Self {
		Self::default()
	}

	/// Installs the transaction manager's interceptors. Called once,
	/// at context construction; a second call replaces the first
	/// (used by tests that rebuild a context's transaction manager).
	pub fn install_transaction_interceptor(
		&self,
		write: Arc<dyn WriteInterceptor>,
		read: Arc<dyn ReadInterceptor>,
	) {
		*self.transaction_write.write().unwrap() = Some(write);
		*self.transaction_read.write().unwrap() = Some(read);
	}

	pub fn push_write_interceptor(&self, interceptor: Arc<dyn WriteInterceptor>) {
		self.other_writes.write().unwrap().push(interceptor);
	}

	pub fn push_read_interceptor(&self, interceptor: Arc<dyn ReadInterceptor>) {
		self.other_reads.write().unwrap().push(interceptor);
	}

	pub(crate) fn transaction_write(&self) -> Option<Arc<dyn WriteInterceptor>> {
		self.transaction_write.read().unwrap().clone()
	}

	pub(crate) fn transaction_read(&self) -> Option<Arc<dyn ReadInterceptor>> {
		self.transaction_read.read().unwrap().clone()
	}

	pub(crate) fn other_writes(&self) -> Vec<Arc<dyn WriteInterceptor>> {
		self.other_writes.read().unwrap().clone()
	}

	pub(crate) fn other_reads(&self) -> Vec<Arc<dyn ReadInterceptor>> {
		self.other_reads.read().unwrap().clone()
	}
}
