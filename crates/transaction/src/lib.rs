// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

//! The transactional commit protocol built on top of `interflux-core`'s
//! interceptor chain: pending-change capture (C3), source-grouped writes
//! with revert-on-failure (C4), the transaction state machine (C5), the
//! locking/conflict substate (§5), and the per-source buffered writer
//! (C6) that absorbs remote updates during adapter bootstrap.

pub mod binding;
pub mod buffered;
pub mod current;
pub mod error;
pub mod lock;
pub mod manager;
pub mod oracle;
pub mod options;
pub mod pending;
pub mod transaction;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use binding::SourceBindings;
pub use buffered::BufferedPropertyWriter;
pub use current::{suppressed, within_flow, TransactionId};
pub use error::{CommitError, TransactionException};
pub use lock::TransactionLock;
pub use manager::{TransactionManager, TransactionRunError};
pub use oracle::ConflictOracle;
pub use options::{CancellationToken, ConflictBehavior, FailureMode, LockingMode, Requirement, TransactionOptions};
pub use pending::PendingChangeBuffer;
pub use transaction::Transaction;
pub use writer::{IssuedSources, SourceTransactionWriter, WriteOutcome};
