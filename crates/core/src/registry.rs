// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use crate::property::{PropertyId, PropertyMetadata, SubjectId};

/// Maps a subject to its property metadata (spec §6, component C7). The
/// reflection-based generator that produces real metadata from a domain
/// type is out of scope (spec §1); this is the contract the core
/// consumes.
pub trait Registry: Send + Sync {
	fn metadata(&self, property: &PropertyId) -> Option<PropertyMetadata>;

	/// All properties registered for a subject, if it is known.
	fn properties_of(&self, subject: SubjectId) -> Vec<PropertyMetadata>;
}

/// Produces a new subject for a given type descriptor when applying a
/// remote update that introduces a previously-unseen graph node (spec
/// §6, component C7). The core never calls this itself; it's part of the
/// contract surface external adapters rely on.
pub trait SubjectFactory: Send + Sync {
	fn create(&self, type_descriptor: &str) -> SubjectId;
}

/// Optional naming-convention translation for properties exposed under
/// an external path (e.g. camelCase JSON paths). Transparent to the
/// commit protocol (spec §6) — the core never calls it, but external
/// adapters sitting on top of the same context may.
pub trait PathProvider: Send + Sync {
	fn external_path(&self, property: &PropertyId) -> Option<String>;
}
