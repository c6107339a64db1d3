// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-context serialization lock (spec §5 "Concurrency model").
///
/// `tokio::sync::Mutex` queues waiters FIFO, which is what gives the
/// `Exclusive` regime its fairness guarantee: transactions commit in the
/// order they called `begin`. `Optimistic` transactions only take the
/// same lock for the duration of commit Stage 1-5, so they serialize
/// with `Exclusive` commits without blocking on `begin`.
#[derive(Clone)]
pub struct TransactionLock {
	inner: Arc<Mutex<()>>,
}

impl TransactionLock {
	pub fn new() -> Self {
		Self { inner: Arc::new(Mutex::new(())) }
	}

	/// Acquired by an `Exclusive` transaction at `begin` and held until
	/// it is committed or disposed.
	pub async fn acquire(&self) -> OwnedMutexGuard<()> {
		self.inner.clone().lock_owned().await
	}
}

impl Default for TransactionLock {
	fn default() -> Self {
		Self::new()
	}
}
