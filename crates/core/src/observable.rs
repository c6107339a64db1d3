// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use crate::change::Change;

/// Receives post-commit [`Change`] notifications (spec §6, component C7).
/// Must never fire during capture — only once Stage 4 has applied the
/// value to the underlying slot (spec §4.1, §4.5 "Observed ordering
/// guarantees").
pub trait ChangeObservable: Send + Sync {
	fn on_change(&self, change: &Change);
}

/// A `ChangeObservable` that drops every notification. Useful as a
/// default when a context doesn't care about observing commits.
pub struct NoopObservable;

impl ChangeObservable for NoopObservable {
	fn on_change(&self, _change: &Change) {}
}
