// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use interflux_core::{
	ChangeContext, Context, ContextId, NoopValidator, PropertyId, PropertyValue, ReadAction, ReadInterceptor,
	Validator, WriteAction, WriteInterceptor,
};

use crate::binding::SourceBindings;
use crate::current::{self, TransactionId};
use crate::error::CommitError;
use crate::lock::TransactionLock;
use crate::options::{CancellationToken, TransactionOptions};
use crate::transaction::Transaction;

/// Installed once per `Context` as its transaction write/read interceptor
/// (spec §4.1). Resolves "is a transaction current for this flow" via
/// [`current::current_for`] and, if so, delegates to it; otherwise the
/// write/read passes through untouched — this is what lets sources and
/// other unrelated flows keep writing to the same context while a
/// transaction is open elsewhere (spec §9 design note on the transaction
/// interceptor's own chain slot).
struct ManagerInterceptor {
	context_id: ContextId,
	open: Arc<DashMap<TransactionId, Weak<Transaction>>>,
}

impl WriteInterceptor for ManagerInterceptor {
	fn on_write(&self, property: &PropertyId, new_value: &PropertyValue, change_ctx: &ChangeContext) -> WriteAction {
		let Some(transaction) = self.current_transaction() else {
			return WriteAction::Continue(new_value.clone());
		};
		match transaction.capture_write(property, new_value, change_ctx) {
			Ok(()) => WriteAction::Divert,
			Err(err) => WriteAction::Abort(err),
		}
	}
}

impl ReadInterceptor for ManagerInterceptor {
	fn on_read(&self, property: &PropertyId, _current_value: &PropertyValue) -> ReadAction {
		let Some(transaction) = self.current_transaction() else {
			return ReadAction::Continue;
		};
		match transaction.pending_value(property) {
			Some(value) => ReadAction::ShortCircuit(value),
			None => ReadAction::Continue,
		}
	}
}

impl ManagerInterceptor {
	fn current_transaction(&self) -> Option<Arc<Transaction>> {
		let id = current::current_for(self.context_id)?;
		self.open.get(&id)?.upgrade()
	}
}

/// Owns everything a `Context`'s transactions share: the serialization
/// lock, source bindings, the configured validator, and the table of
/// currently-open transactions that the installed [`ManagerInterceptor`]
/// consults (spec §4.5, component C5 "coordinator").
pub struct TransactionManager {
	context: Arc<Context>,
	bindings: Arc<SourceBindings>,
	validator: Arc<dyn Validator>,
	lock: TransactionLock,
	open: Arc<DashMap<TransactionId, Weak<Transaction>>>,
}

impl TransactionManager {
	pub fn new(context: Arc<Context>) -> Arc<Self> {
		Self::with_validator(context, Arc::new(NoopValidator))
	}

	pub fn with_validator(context: Arc<Context>, validator: Arc<dyn Validator>) -> Arc<Self> {
		let open = Arc::new(DashMap::new());
		let interceptor = Arc::new(ManagerInterceptor { context_id: context.id, open: open.clone() });
		context.chain.install_transaction_interceptor(interceptor.clone(), interceptor);

		Arc::new(Self {
			context,
			bindings: Arc::new(SourceBindings::new()),
			validator,
			lock: TransactionLock::new(),
			open,
		})
	}

	pub fn bindings(&self) -> Arc<SourceBindings> {
		self.bindings.clone()
	}

	pub fn context(&self) -> Arc<Context> {
		self.context.clone()
	}

	pub(crate) fn context_id(&self) -> ContextId {
		self.context.id
	}

	pub(crate) fn validator(&self) -> Arc<dyn Validator> {
		self.validator.clone()
	}

	pub(crate) fn lock(&self) -> &TransactionLock {
		&self.lock
	}

	pub(crate) fn open_table(&self) -> Arc<DashMap<TransactionId, Weak<Transaction>>> {
		self.open.clone()
	}

	/// Opens a new transaction for the calling logical flow (spec §4.5
	/// "Begin"). Must be called from within a [`current::within_flow`]
	/// scope for nested-transaction detection and ambient divert-on-write
	/// to work; outside one, every write/read against this manager's
	/// context passes straight through.
	pub async fn begin(
		&self,
		options: TransactionOptions,
		cancellation: Option<&CancellationToken>,
	) -> Result<Arc<Transaction>, interflux_core::Error> {
		Transaction::begin(self, options, cancellation).await
	}

	/// Convenience for the common case: open a transaction, run `body`
	/// with it, then commit. `body` returning `Err` disposes the
	/// transaction (implicit rollback, spec §4.5 "Dispose") instead of
	/// committing it.
	pub async fn run<F, Fut, T>(
		&self,
		options: TransactionOptions,
		body: F,
	) -> Result<T, TransactionRunError>
	where
		F: FnOnce(Arc<Transaction>) -> Fut,
		Fut: std::future::Future<Output = Result<T, interflux_core::Error>>,
	{
		let transaction = self.begin(options, None).await.map_err(TransactionRunError::Begin)?;
		match body(transaction.clone()).await {
			Ok(value) => {
				transaction.commit().await.map_err(TransactionRunError::Commit)?;
				Ok(value)
			}
			Err(err) => {
				transaction.dispose();
				Err(TransactionRunError::Body(err))
			}
		}
	}
}

#[derive(Debug)]
pub enum TransactionRunError {
	Begin(interflux_core::Error),
	Body(interflux_core::Error),
	Commit(CommitError),
}

impl std::fmt::Display for TransactionRunError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TransactionRunError::Begin(err) => write!(f, "begin failed: {err}"),
			TransactionRunError::Body(err) => write!(f, "transaction body failed: {err}"),
			TransactionRunError::Commit(err) => write!(f, "commit failed: {err}"),
		}
	}
}

impl std::error::Error for TransactionRunError {}
