// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;

use interflux_core::ContextId;
use uuid::Uuid;

/// Opaque identity of an open transaction. Lets the installed transaction
/// write/read interceptor recognize "its own" flow's writes without
/// holding a strong reference back to the `Transaction` itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for TransactionId {
	fn default() -> Self {
		Self::new()
	}
}

tokio::task_local! {
	/// Current transaction per `Context`, for the logical flow that
	/// entered the enclosing [`within_flow`] scope (spec §5 "Logical-flow
	/// identity"). A `task_local`, not a plain thread-local, so the
	/// mapping survives `.await` points within the flow (spec §9).
	static CURRENT: RefCell<HashMap<ContextId, TransactionId>>;
	static SUPPRESSED: Cell<bool>;
}

/// Establishes a fresh logical flow: a task-local scope within which
/// `begin`/`dispose` can install and clear the current transaction per
/// context. Application code is expected to call this once per
/// independent unit of work (a request, a scan iteration, a test body) —
/// mirroring how [`interflux_core::with_change_context_async`] scopes C2.
/// Nesting is allowed and simply shadows the outer flow's map for the
/// duration of the inner future.
pub async fn within_flow<R, Fut>(fut: Fut) -> R
where
	Fut: Future<Output = R>,
{
	CURRENT.scope(RefCell::new(HashMap::new()), fut).await
}

/// The transaction current for `context` in the calling logical flow, if
/// any. Returns `None` outside of any [`within_flow`] scope or under
/// [`suppressed`] (spec §5: "a fresh, unrelated flow sees no current
/// transaction").
pub fn current_for(context: ContextId) -> Option<TransactionId> {
	if is_suppressed() {
		return None;
	}
	CURRENT.try_with(|cell| cell.borrow().get(&context).copied()).ok().flatten()
}

/// Installs `id` as current for `context` in the calling flow. Returns
/// `Err(())` if there is already a current transaction for this context
/// (nested `begin`, spec §4.5 Step 1). Outside any [`within_flow`] scope
/// there is nowhere to install into, so this is a no-op that reports
/// success.
pub fn set_current(context: ContextId, id: TransactionId) -> Result<(), ()> {
	match CURRENT.try_with(|cell| {
		let mut map = cell.borrow_mut();
		if map.contains_key(&context) {
			return Err(());
		}
		map.insert(context, id);
		Ok(())
	}) {
		Ok(inner) => inner,
		Err(_) => Ok(()),
	}
}

/// Clears the current transaction for `context`, if `id` is still the one
/// installed (a stale clear — e.g. from a transaction that lost a race
/// with a newer `begin` — is a no-op).
pub fn clear_current(context: ContextId, id: TransactionId) {
	let _ = CURRENT.try_with(|cell| {
		let mut map = cell.borrow_mut();
		if map.get(&context) == Some(&id) {
			map.remove(&context);
		}
	});
}

fn is_suppressed() -> bool {
	SUPPRESSED.try_with(|cell| cell.get()).unwrap_or(false)
}

/// Runs `f` with flow inheritance suppressed, so any transaction current
/// for the enclosing flow is invisible to `f` — used by tests to simulate
/// an unrelated flow's write landing on a context that also has an open
/// transaction (spec §5 "Tests rely on the ability to suppress flow
/// inheritance").
pub fn suppressed<R>(f: impl FnOnce() -> R) -> R {
	SUPPRESSED.sync_scope(Cell::new(true), f)
}
