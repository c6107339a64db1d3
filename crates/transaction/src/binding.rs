// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::sync::Arc;

use dashmap::DashMap;
use interflux_core::{PropertyId, Source};

/// Tracks which `Source` (if any) a property is currently bound to
/// (spec §3: "A property has at most one associated source at a time").
#[derive(Default)]
pub struct SourceBindings {
	bound: DashMap<PropertyId, Arc<dyn Source>>,
}

impl SourceBindings {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds `property` to `source`. Fails without overwriting the
	/// existing binding if one is already present and names a
	/// different source (spec §3 invariant).
	pub fn bind(&self, property: PropertyId, source: Arc<dyn Source>) -> Result<(), String> {
		match self.bound.get(&property) {
			Some(existing) if existing.id() != source.id() => Err(format!(
				"property {property} is already bound to source {}",
				existing.id()
			)),
			_ => {
				self.bound.insert(property, source);
				Ok(())
			}
		}
	}

	pub fn unbind(&self, property: &PropertyId) {
		self.bound.remove(property);
	}

	pub fn source_of(&self, property: &PropertyId) -> Option<Arc<dyn Source>> {
		self.bound.get(property).map(|entry| entry.clone())
	}
}
