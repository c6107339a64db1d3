// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Minimal cooperative cancellation flag checked by `begin` (spec §4.5
/// "Begin" step 3, §5 "Cancellation"). Cloning shares the same flag;
/// `cancel` is idempotent.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self(Arc::new(AtomicBool::new(false)))
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// How a commit reacts to a source (or local-apply) failure (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FailureMode {
	#[default]
	BestEffort,
	Rollback,
}

/// Locking discipline a transaction acquires at `begin` (spec §3, §5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LockingMode {
	#[default]
	Exclusive,
	Optimistic,
}

/// What an optimistic transaction does when Stage 1 finds the stored
/// value has moved since capture (spec §4.5 Stage 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConflictBehavior {
	#[default]
	FailOnConflict,
	Ignore,
}

/// Multi-source requirement a commit must satisfy (spec §3, §4.4 Step B).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Requirement {
	#[default]
	None,
	/// At most one distinct source may be touched by source-bound
	/// pending changes, and its batch size (if bounded) must not be
	/// exceeded.
	SingleWrite,
}

/// Configuration a `Transaction` carries for its whole lifecycle (§3).
/// A small, named option bag in the style of `reifydb-catalog`'s
/// `MigrationToCreate`/`TableToCreate` builders, rather than positional
/// booleans.
#[derive(Clone, Copy, Debug)]
pub struct TransactionOptions {
	pub failure_mode: FailureMode,
	pub locking_mode: LockingMode,
	pub conflict_behavior: ConflictBehavior,
	pub requirement: Requirement,
	/// `Duration::MAX` disables the timeout (spec §4.5 "Commit
	/// (staged)": "infinite timeout disables this").
	pub commit_timeout: Duration,
}

impl Default for TransactionOptions {
	fn default() -> Self {
		Self {
			failure_mode: FailureMode::default(),
			locking_mode: LockingMode::default(),
			conflict_behavior: ConflictBehavior::default(),
			requirement: Requirement::default(),
			commit_timeout: Duration::MAX,
		}
	}
}

impl TransactionOptions {
	pub fn best_effort() -> Self {
		Self { failure_mode: FailureMode::BestEffort, ..Self::default() }
	}

	pub fn rollback() -> Self {
		Self { failure_mode: FailureMode::Rollback, ..Self::default() }
	}

	pub fn optimistic(conflict_behavior: ConflictBehavior) -> Self {
		Self { locking_mode: LockingMode::Optimistic, conflict_behavior, ..Self::default() }
	}

	pub fn with_requirement(mut self, requirement: Requirement) -> Self {
		self.requirement = requirement;
		self
	}

	pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
		self.commit_timeout = timeout;
		self
	}
}
