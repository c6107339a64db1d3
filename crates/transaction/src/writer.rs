// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::collections::BTreeMap;
use std::sync::Arc;

use interflux_core::{Change, Error, Source, SourceId};
use tracing::{instrument, warn};

use crate::binding::SourceBindings;
use crate::options::{FailureMode, Requirement};

/// Result of the source-facing portion of a commit (spec §4.4,
/// component C4). Local (source-less) changes are always reported as
/// successful at this layer — whether they end up applied is decided by
/// the transaction state machine's Stage 4 (spec §4.4 closing note).
#[derive(Debug, Default)]
pub struct WriteOutcome {
	pub successful_changes: Vec<Change>,
	pub failed_changes: Vec<Change>,
	pub errors: Vec<Error>,
	/// Set when Step B rejected the commit outright. The transaction
	/// state machine's Stage 2 short-circuits straight to Stage 5 on
	/// this (spec §4.5 Stage 2) — no source write, and critically, no
	/// local apply either, even in `BestEffort` mode.
	pub requirement_violated: bool,
}

/// Source batches that succeeded during Stage 3 and have not already
/// been reverted. Empty whenever `commit`'s own Step D already reverted
/// them (a source-level failure occurred); otherwise carries everything
/// `commit_staged` may still need to unwind if a *later* Stage 4
/// local-apply failure forces a Rollback commit to give up on writes
/// that had already succeeded at the source (spec §4.5 Stage 4: "If any
/// source writes succeeded earlier, they are now reverted at the source
/// as in C4 Stage D revert").
#[derive(Default)]
pub struct IssuedSources(Vec<(Arc<dyn Source>, Vec<Change>)>);

impl std::fmt::Debug for IssuedSources {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IssuedSources").field("sources", &self.0.len()).finish()
	}
}

impl IssuedSources {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Reverts every issued batch, in reverse order of issue (spec §4.4
	/// Step D). Revert failures are appended to `errors`/`failed_changes`
	/// — additional failures, not replacements.
	pub async fn revert(self, errors: &mut Vec<Error>, failed_changes: &mut Vec<Change>) {
		for (source, batch) in self.0.into_iter().rev() {
			let revert_batch: Vec<Change> = batch.iter().map(Change::reverted).collect();
			let result = source.write_changes(&revert_batch).await;
			if let Some(error) = result.error_message() {
				warn!(source = %source.id(), error, "revert write failed");
				for change in &batch {
					errors.push(Error::Revert { property: change.property.clone(), message: error.to_string() });
					failed_changes.push(change.clone());
				}
			}
		}
	}
}

/// Groups pending changes by external source and drives the write /
/// revert protocol against them (spec §4.4, component C4).
pub struct SourceTransactionWriter<'a> {
	bindings: &'a SourceBindings,
}

impl<'a> SourceTransactionWriter<'a> {
	pub fn new(bindings: &'a SourceBindings) -> Self {
		Self { bindings }
	}

	/// Runs Steps A-D of spec §4.4 against a snapshot of the
	/// transaction's pending changes, taken before any source write is
	/// issued (so the pending buffer's lock never has to be held across
	/// an `.await`). Returns, alongside the outcome, whatever source
	/// batches succeeded and were *not* reverted here — `commit_staged`
	/// holds onto those in case Stage 4 needs to revert them later.
	#[instrument(name = "transaction::writer::commit", level = "debug", skip(self, changes))]
	pub async fn commit(
		&self,
		changes: &[Change],
		failure_mode: FailureMode,
		requirement: Requirement,
	) -> (WriteOutcome, IssuedSources) {
		// Step A — partition.
		let mut source_changes: BTreeMap<SourceId, (Arc<dyn Source>, Vec<Change>)> = BTreeMap::new();
		let mut local_changes = Vec::new();

		for change in changes {
			match self.bindings.source_of(&change.property) {
				Some(source) => {
					source_changes
						.entry(source.id())
						.or_insert_with(|| (source.clone(), Vec::new()))
						.1
						.push(change.clone());
				}
				None => local_changes.push(change.clone()),
			}
		}

		// Step B — validate the SingleWrite requirement, if any.
		if requirement == Requirement::SingleWrite && !source_changes.is_empty() {
			if source_changes.len() > 1 {
				let message = format!(
					"{} sources were touched by this commit, only 1 is allowed",
					source_changes.len()
				);
				let outcome = WriteOutcome {
					successful_changes: Vec::new(),
					failed_changes: local_changes
						.into_iter()
						.chain(source_changes.into_values().flat_map(|(_, changes)| changes))
						.collect(),
					errors: vec![interflux_core::requirement_violation!("{message}")],
					requirement_violated: true,
				};
				return (outcome, IssuedSources::default());
			}

			let (_, (source, changes)) = source_changes.iter().next().expect("checked non-empty");
			let batch_size = source.write_batch_size();
			if batch_size > 0 && changes.len() > batch_size {
				let message = format!(
					"{} changes were submitted, WriteBatchSize is {batch_size}",
					changes.len()
				);
				let outcome = WriteOutcome {
					successful_changes: Vec::new(),
					failed_changes: local_changes
						.into_iter()
						.chain(source_changes.into_values().flat_map(|(_, changes)| changes))
						.collect(),
					errors: vec![interflux_core::requirement_violation!("{message}")],
					requirement_violated: true,
				};
				return (outcome, IssuedSources::default());
			}
		}

		// Step C — issue writes, in a stable order across sources
		// (here: ascending `SourceId`; unspecified but deterministic
		// §4.4/§9).
		let mut outcome = WriteOutcome { successful_changes: local_changes, ..WriteOutcome::default() };
		let mut issued: Vec<(Arc<dyn Source>, Vec<Change>)> = Vec::new();

		for (source, batch) in source_changes.into_values() {
			let result = source.write_changes(&batch).await;

			if matches!(result, interflux_core::WriteResult::Success) {
				issued.push((source, batch.clone()));
				outcome.successful_changes.extend(batch);
				continue;
			}

			let error = result.error_message().unwrap_or_default().to_string();
			let failing = result.failed_properties();

			if result.is_full_failure() {
				// `Failure` names no properties of its own (the whole
				// batch is the failure); `FailureSubset` does.
				if failing.is_empty() {
					for change in &batch {
						outcome.errors.push(Error::SourceWrite {
							property: change.property.clone(),
							message: error.clone(),
						});
					}
				} else {
					for property in failing {
						outcome.errors.push(Error::SourceWrite {
							property: property.clone(),
							message: error.clone(),
						});
					}
				}
				outcome.failed_changes.extend(batch);
			} else {
				let (failed_batch, succeeded_batch): (Vec<_>, Vec<_>) =
					batch.into_iter().partition(|change| failing.contains(&change.property));
				for change in &failed_batch {
					outcome.errors.push(Error::SourceWrite {
						property: change.property.clone(),
						message: error.clone(),
					});
				}
				if !succeeded_batch.is_empty() {
					issued.push((source, succeeded_batch.clone()));
				}
				outcome.successful_changes.extend(succeeded_batch);
				outcome.failed_changes.extend(failed_batch);
			}
		}

		// Step D — on any failure, behave per failure mode.
		if !outcome.failed_changes.is_empty() && failure_mode == FailureMode::Rollback {
			IssuedSources(issued).revert(&mut outcome.errors, &mut outcome.failed_changes).await;
			outcome.errors.push(interflux_core::requirement_violation!("Rollback was attempted"));
			outcome.successful_changes.clear();
			(outcome, IssuedSources::default())
		} else {
			(outcome, IssuedSources(issued))
		}
	}
}
