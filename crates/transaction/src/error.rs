// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::fmt::{Display, Formatter};

use interflux_core::{Change, Error};

/// Raised by `Transaction::commit` whenever Stage 5 reports at least one
/// failure (spec §4.5 Stage 5, §7). Carries everything a caller needs to
/// reconcile what actually happened without re-deriving it from the
/// individual errors.
#[derive(Debug, Clone)]
pub struct TransactionException {
	pub applied_changes: Vec<Change>,
	pub failed_changes: Vec<Change>,
	pub errors: Vec<Error>,
}

impl TransactionException {
	pub fn new(applied_changes: Vec<Change>, failed_changes: Vec<Change>, errors: Vec<Error>) -> Self {
		Self { applied_changes, failed_changes, errors }
	}

	/// True iff at least one change applied and at least one failed —
	/// i.e. the commit was neither a clean success nor a clean wash
	/// (spec §7: `is_partial_success`).
	pub fn is_partial_success(&self) -> bool {
		!self.applied_changes.is_empty() && !self.failed_changes.is_empty()
	}
}

impl Display for TransactionException {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"transaction commit failed: {} applied, {} failed, {} error(s)",
			self.applied_changes.len(),
			self.failed_changes.len(),
			self.errors.len()
		)?;
		if let Some(first) = self.errors.first() {
			write!(f, ": {first}")?;
		}
		Ok(())
	}
}

impl std::error::Error for TransactionException {}

/// Everything `Transaction::commit` can return on the error path (§7).
/// `Standalone` covers errors thrown standalone, not wrapped — conflict,
/// nested/disposed/committed misuse, cancellation; everything else
/// accumulates into a [`TransactionException`].
#[derive(Debug, Clone)]
pub enum CommitError {
	Standalone(Error),
	Failed(TransactionException),
}

impl Display for CommitError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			CommitError::Standalone(err) => Display::fmt(err, f),
			CommitError::Failed(exception) => Display::fmt(exception, f),
		}
	}
}

impl std::error::Error for CommitError {}

impl From<Error> for CommitError {
	fn from(err: Error) -> Self {
		CommitError::Standalone(err)
	}
}
