// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::change::Change;
use crate::property::PropertyId;

/// Reference identity of an external `Source` (spec §3: "External
/// writable/readable endpoint identified by reference identity").
/// Two `SourceId`s are equal iff they name the same underlying source
/// instance, not merely equal-looking endpoints.
#[derive(Clone, Debug)]
pub struct SourceId(Arc<str>);

impl SourceId {
	pub fn new(name: impl Into<Arc<str>>) -> Self {
		Self(name.into())
	}
}

impl PartialEq for SourceId {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
	}
}
impl Eq for SourceId {}

impl std::hash::Hash for SourceId {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.0.hash(state);
	}
}

impl Ord for SourceId {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.0.cmp(&other.0)
	}
}
impl PartialOrd for SourceId {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Display for SourceId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

/// Outcome of a single `write_changes`/revert call (spec §6, §9 design
/// note: modeled as an explicit tagged union so the hot path — full
/// success — avoids allocation).
#[derive(Clone, Debug)]
pub enum WriteResult {
	/// All changes in the batch were applied.
	Success,
	/// The whole batch failed; no partial application.
	Failure { error: String },
	/// The whole batch failed, naming exactly which changes failed.
	FailureSubset { failed: Vec<PropertyId>, error: String },
	/// Some changes applied, some didn't.
	PartialFailure { failed: Vec<PropertyId>, error: String },
}

impl WriteResult {
	/// Properties that did NOT succeed, given the full batch that was
	/// attempted. `Success` never contributes any.
	pub fn failed_properties(&self) -> &[PropertyId] {
		static EMPTY: &[PropertyId] = &[];
		match self {
			WriteResult::Success => EMPTY,
			WriteResult::Failure { .. } => EMPTY, // caller treats whole batch as failed
			WriteResult::FailureSubset { failed, .. } => failed,
			WriteResult::PartialFailure { failed, .. } => failed,
		}
	}

	pub fn is_full_failure(&self) -> bool {
		matches!(self, WriteResult::Failure { .. } | WriteResult::FailureSubset { .. })
	}

	pub fn error_message(&self) -> Option<&str> {
		match self {
			WriteResult::Success => None,
			WriteResult::Failure { error }
			| WriteResult::FailureSubset { error, .. }
			| WriteResult::PartialFailure { error, .. } => Some(error.as_str()),
		}
	}
}

/// External writable/readable endpoint a property can be bound to
/// (spec §6, component C7). Out of scope here: the transport underneath
/// it (OPC UA, MQTT, ...).
///
/// `SourceBindings`/`SourceTransactionWriter` hold these behind
/// `Arc<dyn Source>`, so the trait needs to be object-safe — hence
/// `#[async_trait]` rather than a native `async fn` in the trait.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
	fn id(&self) -> SourceId;

	/// 0 means unlimited.
	fn write_batch_size(&self) -> usize;

	async fn write_changes(&self, batch: &[Change]) -> WriteResult;
}
