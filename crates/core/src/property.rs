// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use uuid::Uuid;

use crate::value::ValueKind;

/// Opaque handle identifying a subject (a tracked domain object) within a
/// context. The core never dereferences it; subjects are owned by user
/// code or the registry graph (spec §3 "Lifecycles").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(Uuid);

impl SubjectId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn from_uuid(id: Uuid) -> Self {
		Self(id)
	}
}

impl Default for SubjectId {
	fn default() -> Self {
		Self::new()
	}
}

impl Display for SubjectId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self.0, f)
	}
}

/// Global name interner. Property names repeat across every subject of a
/// given type, so equality and hashing on `PropertyId` go through a
/// shared `Arc<str>` rather than re-comparing/re-hashing raw strings
/// (spec §9 design note: "prefer interned names for fast equality").
static INTERNER: Lazy<DashMap<&'static str, Arc<str>>> = Lazy::new(DashMap::new);

fn intern(name: &str) -> Arc<str> {
	if let Some(existing) = INTERNER.get(name) {
		return existing.clone();
	}
	let interned: Arc<str> = Arc::from(name);
	// Leaking the key is acceptable here: property names are a small,
	// effectively-static vocabulary (type descriptors), not user data.
	let key: &'static str = Box::leak(name.to_string().into_boxed_str());
	INTERNER.entry(key).or_insert(interned).clone()
}

/// Identity of a property slot: the pair `(subject, name)` (spec §3).
#[derive(Clone, Debug, Eq)]
pub struct PropertyId {
	pub subject: SubjectId,
	pub name: Arc<str>,
}

impl PropertyId {
	pub fn new(subject: SubjectId, name: &str) -> Self {
		Self { subject, name: intern(name) }
	}
}

impl PartialEq for PropertyId {
	fn eq(&self, other: &Self) -> bool {
		self.subject == other.subject
			&& (Arc::ptr_eq(&self.name, &other.name) || self.name == other.name)
	}
}

impl std::hash::Hash for PropertyId {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.subject.hash(state);
		self.name.hash(state);
	}
}

impl Display for PropertyId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.subject, self.name)
	}
}

/// Static metadata describing a property slot, as produced by a
/// `Registry` (C7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyMetadata {
	pub name: Arc<str>,
	pub value_kind: ValueKind,
	/// Computed from other properties; writes are forbidden (spec §3).
	pub is_derived: bool,
	/// Metadata attached to another property, rather than a value slot
	/// in its own right.
	pub is_attribute: bool,
}

impl PropertyMetadata {
	pub fn new(name: &str, value_kind: ValueKind) -> Self {
		Self { name: intern(name), value_kind, is_derived: false, is_attribute: false }
	}

	pub fn derived(mut self) -> Self {
		self.is_derived = true;
		self
	}

	pub fn attribute(mut self) -> Self {
		self.is_attribute = true;
		self
	}
}
