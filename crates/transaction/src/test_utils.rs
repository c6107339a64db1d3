// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

//! Fixtures shared by `interflux-transaction`'s own tests.

use std::sync::Arc;

use interflux_core::test_utils::TestRegistry;
use interflux_core::{Context, SubjectId, ValueKind};

use crate::manager::TransactionManager;

/// A context wired up with a fresh `TestRegistry` and `TransactionManager`,
/// plus one subject with a couple of declared properties — the baseline
/// most commit-protocol tests start from.
pub struct Fixture {
	pub context: Arc<Context>,
	pub registry: Arc<TestRegistry>,
	pub manager: Arc<TransactionManager>,
	pub subject: SubjectId,
}

impl Fixture {
	pub fn new() -> Self {
		let registry = Arc::new(TestRegistry::new());
		let context = Arc::new(Context::new(registry.clone()));
		let manager = TransactionManager::new(context.clone());
		let subject = SubjectId::new();
		Self { context, registry, manager, subject }
	}

	/// Declares `name: Text` on the fixture's subject and returns its id.
	pub fn declare_text(&self, name: &str) -> interflux_core::PropertyId {
		self.registry.declare(self.subject, name, ValueKind::Text)
	}
}

impl Default for Fixture {
	fn default() -> Self {
		Self::new()
	}
}
