// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use interflux_core::{Change, Context, Error, PropertyId, PropertyValue, Validator};
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::{instrument, warn};

use crate::current::{self, TransactionId};
use crate::error::{CommitError, TransactionException};
use crate::oracle::ConflictOracle;
use crate::options::{CancellationToken, FailureMode, LockingMode, TransactionOptions};
use crate::pending::PendingChangeBuffer;
use crate::writer::SourceTransactionWriter;

/// States of `Transaction` (spec §4.5): `Open → Committing → {Committed |
/// Faulted} → Disposed`, with `Open → Disposed` (implicit rollback)
/// allowed directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TransactionState {
	Open,
	Committing,
	Committed,
	Faulted,
	Disposed,
}

/// A single commit lifecycle: capture via the installed write/read
/// interceptor, then `commit`/`dispose` (spec §4.5, component C5).
///
/// Held behind `Arc` because the context-wide transaction interceptor
/// (installed once by `TransactionManager`) looks transactions up by id
/// and calls back into whichever one is current for the calling flow.
pub struct Transaction {
	id: TransactionId,
	context: Arc<Context>,
	validator: Arc<dyn Validator>,
	lock: crate::lock::TransactionLock,
	open: Arc<DashMap<TransactionId, Weak<Transaction>>>,
	bindings: Arc<crate::binding::SourceBindings>,
	options: TransactionOptions,
	pending: Mutex<PendingChangeBuffer>,
	state: Mutex<TransactionState>,
	exclusive_guard: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl Transaction {
	/// Step 1-4 of spec §4.5 "Begin". Fails fast with
	/// [`Error::NestedTransaction`] if a transaction is already current
	/// for this context in the calling flow, and with [`Error::Cancelled`]
	/// if `cancellation` was already triggered before the lock was
	/// acquired.
	#[instrument(name = "transaction::begin", level = "debug", skip(manager, cancellation))]
	pub(crate) async fn begin(
		manager: &crate::manager::TransactionManager,
		options: TransactionOptions,
		cancellation: Option<&CancellationToken>,
	) -> Result<Arc<Transaction>, Error> {
		if current::current_for(manager.context_id()).is_some() {
			return Err(Error::NestedTransaction);
		}

		let exclusive_guard = if options.locking_mode == LockingMode::Exclusive {
			Some(manager.lock().acquire().await)
		} else {
			None
		};

		if cancellation.is_some_and(CancellationToken::is_cancelled) {
			return Err(Error::Cancelled);
		}

		let id = TransactionId::new();
		if current::set_current(manager.context_id(), id).is_err() {
			return Err(Error::NestedTransaction);
		}

		let transaction = Arc::new(Transaction {
			id,
			context: manager.context(),
			validator: manager.validator(),
			lock: manager.lock().clone(),
			open: manager.open_table(),
			bindings: manager.bindings(),
			options,
			pending: Mutex::new(PendingChangeBuffer::new()),
			state: Mutex::new(TransactionState::Open),
			exclusive_guard: Mutex::new(exclusive_guard),
		});

		transaction.open.insert(id, Arc::downgrade(&transaction));
		Ok(transaction)
	}

	pub fn id(&self) -> TransactionId {
		self.id
	}

	pub fn options(&self) -> &TransactionOptions {
		&self.options
	}

	pub fn pending_len(&self) -> usize {
		self.pending.lock().len()
	}

	/// Invoked by the context-wide transaction write interceptor when
	/// this transaction is current for the calling flow (spec §4.1, §4.3).
	/// Runs the configured validator, then diverts the write into the
	/// pending buffer.
	pub(crate) fn capture_write(
		&self,
		property: &PropertyId,
		new_value: &PropertyValue,
		change_ctx: &interflux_core::ChangeContext,
	) -> Result<(), Error> {
		let errors = self.validator.validate(property, new_value);
		if let Some(first) = errors.into_iter().next() {
			return Err(Error::Validation { property: first.property, message: first.message });
		}

		let context = self.context.clone();
		let captured_property = property.clone();
		self.pending.lock().record(
			property.clone(),
			move || context.read_bypassing_transaction(&captured_property),
			new_value.clone(),
			change_ctx,
		);
		Ok(())
	}

	/// Invoked by the context-wide transaction read interceptor. Returns
	/// the pending `new_value` for `property` if this transaction has
	/// captured a write to it (spec §4.1 "copy-on-write for readers").
	pub(crate) fn pending_value(&self, property: &PropertyId) -> Option<PropertyValue> {
		self.pending.lock().pending_value(property).cloned()
	}

	/// Runs Stages 1-5 of spec §4.5 "Commit (staged)". The commit timeout
	/// bounds stages 1-5 as a whole; `Duration::MAX` (the default)
	/// disables it, since adding it to `Instant::now()` would overflow.
	#[instrument(name = "transaction::commit", level = "debug", skip(self), fields(transaction = ?self.id))]
	pub async fn commit(self: &Arc<Self>) -> Result<(), CommitError> {
		{
			let mut state = self.state.lock();
			match *state {
				TransactionState::Disposed => return Err(Error::ObjectDisposed.into()),
				TransactionState::Committed | TransactionState::Committing | TransactionState::Faulted => {
					return Err(Error::AlreadyCommitted.into());
				}
				TransactionState::Open => *state = TransactionState::Committing,
			}
		}

		let result = if self.options.commit_timeout == Duration::MAX {
			self.commit_staged().await
		} else {
			match tokio::time::timeout(self.options.commit_timeout, self.commit_staged()).await {
				Ok(result) => result,
				Err(_) => {
					let stranded = self.pending.lock().iterate_in_order().cloned().collect();
					Err(CommitError::Failed(TransactionException::new(
						Vec::new(),
						stranded,
						vec![interflux_core::requirement_violation!("commit timed out")],
					)))
				}
			}
		};

		*self.state.lock() = if result.is_ok() { TransactionState::Committed } else { TransactionState::Faulted };
		self.finish();
		result
	}

	async fn commit_staged(&self) -> Result<(), CommitError> {
		// Optimistic transactions take the serialization lock only for
		// the duration of stages 1-5 (spec §5 "Locking").
		let _optimistic_guard = if self.options.locking_mode == LockingMode::Optimistic {
			Some(self.lock.acquire().await)
		} else {
			None
		};

		let changes: Vec<Change> = self.pending.lock().iterate_in_order().cloned().collect();

		if changes.is_empty() {
			// Boundary case (spec §8.10/.11): nothing to validate, no
			// source write, no notification.
			return Ok(());
		}

		if self.options.locking_mode == LockingMode::Optimistic {
			// Stage 1.
			ConflictOracle::check(&self.context, &changes, self.options.conflict_behavior)?;
		}

		// Stages 2-3, delegated to C4.
		let writer = SourceTransactionWriter::new(&self.bindings);
		let (outcome, issued) = writer.commit(&changes, self.options.failure_mode, self.options.requirement).await;

		let mut applied = Vec::new();
		let mut failed = outcome.failed_changes;
		let mut errors = outcome.errors;

		// Stage 4 — apply local values, unless Stage 2 already rejected
		// the commit outright (spec §4.5 Stage 2: "short-circuits to
		// Stage 5").
		if !outcome.requirement_violated {
			let should_apply = match self.options.failure_mode {
				FailureMode::BestEffort => true,
				FailureMode::Rollback => errors.is_empty(),
			};

			if should_apply {
				let mut locally_applied = Vec::new();
				for change in &outcome.successful_changes {
					match self.context.apply_bypassing_transaction(&change.property, change.new_value.clone()) {
						Ok(()) => {
							locally_applied.push(change.clone());
							applied.push(change.clone());
						}
						Err(err) => {
							failed.push(change.clone());
							errors.push(Error::LocalApply {
								property: change.property.clone(),
								message: err.to_string(),
							});
						}
					}
				}

				if self.options.failure_mode == FailureMode::Rollback
					&& locally_applied.len() != outcome.successful_changes.len()
				{
					for change in locally_applied.iter().rev() {
						if let Err(err) =
							self.context.apply_bypassing_transaction(&change.property, change.old_value.clone())
						{
							warn!(property = %change.property, error = %err, "local revert failed");
							errors.push(Error::Revert {
								property: change.property.clone(),
								message: err.to_string(),
							});
							failed.push(change.clone());
						}
					}
					applied.clear();

					// Source writes that succeeded in Stage 3 are still
					// sitting at their source, undone locally but not
					// there — revert them too (spec §4.5 Stage 4: "they
					// are now reverted at the source as in C4 Stage D
					// revert").
					if !issued.is_empty() {
						issued.revert(&mut errors, &mut failed).await;
						errors.push(interflux_core::requirement_violation!("Rollback was attempted"));
					}
				}
			}
		}

		// Stage 5 — report.
		self.pending.lock().remove_all();

		if errors.is_empty() && failed.is_empty() {
			Ok(())
		} else {
			Err(CommitError::Failed(TransactionException::new(applied, failed, errors)))
		}
	}

	/// Idempotent. If not committed, discards the pending buffer without
	/// applying it (an implicit rollback, spec §4.5 "Dispose").
	pub fn dispose(&self) {
		let mut state = self.state.lock();
		if *state == TransactionState::Disposed {
			return;
		}
		*state = TransactionState::Disposed;
		drop(state);

		self.pending.lock().remove_all();
		self.finish();
	}

	fn finish(&self) {
		current::clear_current(self.context.id, self.id);
		self.open.remove(&self.id);
		self.exclusive_guard.lock().take();
	}
}

impl Drop for Transaction {
	fn drop(&mut self) {
		// Guarantees the flow-local marker and lock are released even if
		// a caller drops the `Arc<Transaction>` without calling
		// `dispose` explicitly — `finish` is itself idempotent on its
		// individual effects (remove of an absent key, clear of an
		// already-cleared marker, and take on an empty guard slot are
		// all no-ops).
		self.finish();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use interflux_core::test_utils::TestSource;
	use interflux_core::{PropertyValue, WriteResult};
	use tokio::sync::Mutex as AsyncMutex;

	use super::*;
	use crate::current::{suppressed, within_flow};
	use crate::options::{ConflictBehavior, Requirement};
	use crate::test_utils::Fixture;

	#[tokio::test]
	async fn nested_begin_is_rejected() {
		let fx = Fixture::new();
		within_flow(async {
			let _tx = fx.manager.begin(TransactionOptions::default(), None).await.unwrap();
			let err = fx.manager.begin(TransactionOptions::default(), None).await.unwrap_err();
			assert_eq!(err, Error::NestedTransaction);
		})
		.await;
	}

	#[tokio::test]
	async fn dispose_is_idempotent_and_clears_pending() {
		let fx = Fixture::new();
		let p = fx.declare_text("FirstName");
		within_flow(async {
			let tx = fx.manager.begin(TransactionOptions::default(), None).await.unwrap();
			fx.context.write(&p, PropertyValue::Text("John".into())).unwrap();
			assert_eq!(tx.pending_len(), 1);
			tx.dispose();
			tx.dispose();

			let tx2 = fx.manager.begin(TransactionOptions::default(), None).await.unwrap();
			tx2.dispose();
		})
		.await;
		assert_eq!(fx.context.read(&p), PropertyValue::Null);
	}

	#[tokio::test]
	async fn commit_with_no_pending_changes_fires_no_notifications() {
		let fx = Fixture::new();
		let observable = interflux_core::test_utils::RecordingObservable::new();
		let context =
			Arc::new(interflux_core::Context::new(fx.registry.clone()).with_observable(observable.clone()));
		let manager = crate::manager::TransactionManager::new(context);

		within_flow(async {
			let tx = manager
				.begin(TransactionOptions::default().with_requirement(Requirement::SingleWrite), None)
				.await
				.unwrap();
			tx.commit().await.unwrap();
		})
		.await;

		assert!(observable.changes().is_empty());
	}

	#[tokio::test]
	async fn batch_size_one_rejects_two_changes_to_the_same_source() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		let last = fx.declare_text("LastName");
		let src = TestSource::with_batch_size("srcA", 1);
		fx.manager.bindings().bind(first.clone(), src.clone()).unwrap();
		fx.manager.bindings().bind(last.clone(), src.clone()).unwrap();

		within_flow(async {
			let tx = fx
				.manager
				.begin(TransactionOptions::default().with_requirement(Requirement::SingleWrite), None)
				.await
				.unwrap();
			fx.context.write(&first, PropertyValue::Text("John".into())).unwrap();
			fx.context.write(&last, PropertyValue::Text("Doe".into())).unwrap();

			match tx.commit().await {
				Err(CommitError::Failed(exception)) => {
					assert_eq!(exception.failed_changes.len(), 2);
					let message = exception.errors[0].to_string();
					assert!(message.contains("WriteBatchSize is 1"), "{message}");
				}
				other => panic!("expected RequirementViolation, got {other:?}"),
			}
		})
		.await;

		assert_eq!(src.call_count(), 0);
	}

	#[tokio::test]
	async fn best_effort_two_sources_one_fails() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		let last = fx.declare_text("LastName");
		let src_a = TestSource::new("srcA");
		let src_b = TestSource::new("srcB");
		src_b.push_result(WriteResult::Failure { error: "boom".into() });
		fx.manager.bindings().bind(first.clone(), src_a.clone()).unwrap();
		fx.manager.bindings().bind(last.clone(), src_b.clone()).unwrap();

		within_flow(async {
			let tx = fx.manager.begin(TransactionOptions::best_effort(), None).await.unwrap();
			fx.context.write(&first, PropertyValue::Text("John".into())).unwrap();
			fx.context.write(&last, PropertyValue::Text("Doe".into())).unwrap();

			match tx.commit().await {
				Err(CommitError::Failed(exception)) => {
					assert_eq!(exception.applied_changes.len(), 1);
					assert_eq!(exception.applied_changes[0].property, first);
					assert_eq!(exception.failed_changes.len(), 1);
					assert_eq!(exception.failed_changes[0].property, last);
					assert!(exception.is_partial_success());
				}
				other => panic!("expected a partial TransactionException, got {other:?}"),
			}
		})
		.await;

		assert_eq!(fx.context.read(&first), PropertyValue::Text("John".into()));
		assert_eq!(fx.context.read(&last), PropertyValue::Null);
	}

	#[tokio::test]
	async fn rollback_reverts_successful_source_on_sibling_failure() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		let last = fx.declare_text("LastName");
		let src_a = TestSource::new("srcA");
		let src_b = TestSource::new("srcB");
		src_b.push_result(WriteResult::Failure { error: "boom".into() });
		fx.manager.bindings().bind(first.clone(), src_a.clone()).unwrap();
		fx.manager.bindings().bind(last.clone(), src_b.clone()).unwrap();

		within_flow(async {
			let tx = fx.manager.begin(TransactionOptions::rollback(), None).await.unwrap();
			fx.context.write(&first, PropertyValue::Text("John".into())).unwrap();
			fx.context.write(&last, PropertyValue::Text("Doe".into())).unwrap();

			match tx.commit().await {
				Err(CommitError::Failed(exception)) => {
					assert!(exception.applied_changes.is_empty());
					assert!(exception.errors.iter().any(|e| e.to_string().contains("Rollback was attempted")));
				}
				other => panic!("expected a failed TransactionException, got {other:?}"),
			}
		})
		.await;

		assert_eq!(fx.context.read(&first), PropertyValue::Null);
		assert_eq!(fx.context.read(&last), PropertyValue::Null);
		assert_eq!(src_a.call_count(), 2);
	}

	#[tokio::test]
	async fn rollback_reverts_source_write_that_already_succeeded_when_local_apply_fails_later() {
		let fx = Fixture::new();
		let subject = interflux_core::SubjectId::new();
		let property = fx.registry.declare(subject, "FirstName", interflux_core::ValueKind::Text);
		let src = TestSource::new("srcA");
		fx.manager.bindings().bind(property.clone(), src.clone()).unwrap();

		within_flow(async {
			let tx = fx.manager.begin(TransactionOptions::rollback(), None).await.unwrap();
			fx.context.write(&property, PropertyValue::Text("John".into())).unwrap();

			// Stage 3 will succeed against `src`; before commit runs,
			// turn the property derived so Stage 4's local apply throws
			// on a write that already landed at the source.
			fx.registry.declare_derived(subject, "FirstName", interflux_core::ValueKind::Text);

			match tx.commit().await {
				Err(CommitError::Failed(exception)) => {
					assert!(exception.applied_changes.is_empty());
					assert!(exception.errors.iter().any(|e| e.to_string().contains("Rollback was attempted")));
				}
				other => panic!("expected a failed TransactionException, got {other:?}"),
			}
		})
		.await;

		// write + revert, in that order.
		assert_eq!(src.call_count(), 2);
		let calls = src.calls();
		assert_eq!(calls[0][0].new_value, PropertyValue::Text("John".into()));
		assert_eq!(calls[1][0].new_value, PropertyValue::Null);
	}

	#[tokio::test]
	async fn single_write_rejects_two_distinct_sources() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		let last = fx.declare_text("LastName");
		let src_a = TestSource::new("srcA");
		let src_b = TestSource::new("srcB");
		fx.manager.bindings().bind(first.clone(), src_a.clone()).unwrap();
		fx.manager.bindings().bind(last.clone(), src_b.clone()).unwrap();

		within_flow(async {
			let tx = fx
				.manager
				.begin(TransactionOptions::default().with_requirement(Requirement::SingleWrite), None)
				.await
				.unwrap();
			fx.context.write(&first, PropertyValue::Text("John".into())).unwrap();
			fx.context.write(&last, PropertyValue::Text("Doe".into())).unwrap();

			match tx.commit().await {
				Err(CommitError::Failed(exception)) => {
					assert_eq!(exception.failed_changes.len(), 2);
					assert_eq!(exception.errors.len(), 1);
					let message = exception.errors[0].to_string();
					assert!(message.contains("2 sources"), "{message}");
					assert!(message.contains("only 1 is allowed"), "{message}");
				}
				other => panic!("expected RequirementViolation, got {other:?}"),
			}
		})
		.await;

		assert_eq!(src_a.call_count(), 0);
		assert_eq!(src_b.call_count(), 0);
	}

	#[tokio::test]
	async fn optimistic_fail_on_conflict_reports_the_drifted_property() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		fx.context.write(&first, PropertyValue::Text("Original".into())).unwrap();

		within_flow(async {
			let tx = fx
				.manager
				.begin(TransactionOptions::optimistic(ConflictBehavior::FailOnConflict), None)
				.await
				.unwrap();
			fx.context.write(&first, PropertyValue::Text("FromTx".into())).unwrap();

			suppressed(|| {
				fx.context.write(&first, PropertyValue::Text("ExternalChange".into())).unwrap();
			});

			match tx.commit().await {
				Err(CommitError::Standalone(Error::Conflict { property })) => {
					assert_eq!(property, first);
				}
				other => panic!("expected a standalone Conflict error, got {other:?}"),
			}
		})
		.await;

		assert_eq!(fx.context.read(&first), PropertyValue::Text("ExternalChange".into()));
	}

	#[tokio::test]
	async fn optimistic_ignore_overwrites_the_external_change() {
		let fx = Fixture::new();
		let first = fx.declare_text("FirstName");
		fx.context.write(&first, PropertyValue::Text("Original".into())).unwrap();

		within_flow(async {
			let tx =
				fx.manager.begin(TransactionOptions::optimistic(ConflictBehavior::Ignore), None).await.unwrap();
			fx.context.write(&first, PropertyValue::Text("FromTx".into())).unwrap();

			suppressed(|| {
				fx.context.write(&first, PropertyValue::Text("ExternalChange".into())).unwrap();
			});

			tx.commit().await.unwrap();
		})
		.await;

		assert_eq!(fx.context.read(&first), PropertyValue::Text("FromTx".into()));
	}

	#[tokio::test]
	async fn exclusive_transactions_serialize_fifo() {
		let fx = Arc::new(Fixture::new());
		let log = Arc::new(AsyncMutex::new(Vec::<&'static str>::new()));

		let fx_a = fx.clone();
		let log_a = log.clone();
		let task_a = tokio::spawn(within_flow(async move {
			let tx = fx_a.manager.begin(TransactionOptions::default(), None).await.unwrap();
			log_a.lock().await.push("a-began");
			tokio::time::sleep(Duration::from_millis(30)).await;
			log_a.lock().await.push("a-committed");
			tx.commit().await.unwrap();
		}));

		tokio::time::sleep(Duration::from_millis(5)).await;

		let fx_b = fx.clone();
		let log_b = log.clone();
		let task_b = tokio::spawn(within_flow(async move {
			let tx = fx_b.manager.begin(TransactionOptions::default(), None).await.unwrap();
			log_b.lock().await.push("b-began");
			tx.commit().await.unwrap();
		}));

		task_a.await.unwrap();
		task_b.await.unwrap();

		let log = log.lock().await.clone();
		let a_committed = log.iter().position(|e| *e == "a-committed").unwrap();
		let b_began = log.iter().position(|e| *e == "b-began").unwrap();
		assert!(a_committed < b_began, "exclusive begin must suspend until the holder commits: {log:?}");
	}
}
