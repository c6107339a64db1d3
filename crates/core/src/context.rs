// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::time::SystemTime;

use crate::source::SourceId;

/// Per-logical-flow ambient metadata attached to an in-flight write
/// (spec §4.2, component C2). Upstream adapters stamp a change as coming
/// "from source X at time T" so interceptors can tell local writes from
/// remote-originated echoes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeContext {
	pub source: Option<SourceId>,
	pub changed_ts: Option<SystemTime>,
	pub received_ts: Option<SystemTime>,
}

impl ChangeContext {
	pub fn from_source(source: SourceId) -> Self {
		let now = SystemTime::now();
		Self { source: Some(source), changed_ts: Some(now), received_ts: Some(now) }
	}
}

tokio::task_local! {
	/// Logical-flow-local ambient change context. A `task_local` (not a
	/// plain thread-local) so the value survives `.await` points within
	/// the task that entered the scope (spec §9 design note).
	static CHANGE_CONTEXT: std::cell::RefCell<ChangeContext>;
}

/// Returns the ambient change context for the current logical flow, or
/// the default (no source, no timestamps) if none was ever scoped.
pub fn current_change_context() -> ChangeContext {
	CHANGE_CONTEXT.try_with(|cell| cell.borrow().clone()).unwrap_or_default()
}

/// Runs `f` with `ctx` installed as the ambient change context,
/// restoring whatever was active beforehand once `f` returns (including
/// on panic, since this is plain stack unwinding through a nested scope,
/// not a manual save/restore that a panic could skip).
pub fn with_change_context<R>(ctx: ChangeContext, f: impl FnOnce() -> R) -> R {
	CHANGE_CONTEXT.sync_scope(std::cell::RefCell::new(ctx), f)
}

/// Async counterpart of [`with_change_context`], for call sites that
/// need to hold the context across `.await` points (e.g. a source write
/// issued from within a commit stage).
pub async fn with_change_context_async<R, Fut>(ctx: ChangeContext, fut: Fut) -> R
where
	Fut: std::future::Future<Output = R>,
{
	CHANGE_CONTEXT.scope(std::cell::RefCell::new(ctx), fut).await
}
