// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

//! Fixtures shared by `interflux-core` and `interflux-transaction` tests.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::change::Change;
use crate::observable::ChangeObservable;
use crate::property::{PropertyId, PropertyMetadata, SubjectId};
use crate::registry::Registry;
use crate::source::{Source, SourceId, WriteResult};
use crate::value::ValueKind;

/// An in-memory `Registry` a test can populate by hand.
#[derive(Default)]
pub struct TestRegistry {
	properties: DashMap<PropertyId, PropertyMetadata>,
}

impl TestRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn declare(&self, subject: SubjectId, name: &str, kind: ValueKind) -> PropertyId {
		let id = PropertyId::new(subject, name);
		self.properties.insert(id.clone(), PropertyMetadata::new(name, kind));
		id
	}

	pub fn declare_derived(&self, subject: SubjectId, name: &str, kind: ValueKind) -> PropertyId {
		let id = PropertyId::new(subject, name);
		self.properties.insert(id.clone(), PropertyMetadata::new(name, kind).derived());
		id
	}
}

impl Registry for TestRegistry {
	fn metadata(&self, property: &PropertyId) -> Option<PropertyMetadata> {
		self.properties.get(property).map(|v| v.clone())
	}

	fn properties_of(&self, subject: SubjectId) -> Vec<PropertyMetadata> {
		self.properties
			.iter()
			.filter(|entry| entry.key().subject == subject)
			.map(|entry| entry.value().clone())
			.collect()
	}
}

/// A `Source` whose behavior a test controls by queuing canned
/// `WriteResult`s, and that records every batch it was asked to write
/// (including reverts) for ordering assertions.
pub struct TestSource {
	id: SourceId,
	batch_size: usize,
	scripted: Mutex<Vec<WriteResult>>,
	calls: Mutex<Vec<Vec<Change>>>,
}

impl TestSource {
	pub fn new(name: &str) -> Arc<Self> {
		Arc::new(Self {
			id: SourceId::new(name.to_string()),
			batch_size: 0,
			scripted: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
		})
	}

	pub fn with_batch_size(name: &str, batch_size: usize) -> Arc<Self> {
		Arc::new(Self {
			id: SourceId::new(name.to_string()),
			batch_size,
			scripted: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
		})
	}

	/// Queues the result of the next `write_changes` call. Calls
	/// beyond the queued results default to `Success`.
	pub fn push_result(&self, result: WriteResult) {
		self.scripted.lock().unwrap().push(result);
	}

	pub fn calls(&self) -> Vec<Vec<Change>> {
		self.calls.lock().unwrap().clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}
}

#[async_trait::async_trait]
impl Source for TestSource {
	fn id(&self) -> SourceId {
		self.id.clone()
	}

	fn write_batch_size(&self) -> usize {
		self.batch_size
	}

	async fn write_changes(&self, batch: &[Change]) -> WriteResult {
		self.calls.lock().unwrap().push(batch.to_vec());
		let mut scripted = self.scripted.lock().unwrap();
		if scripted.is_empty() {
			WriteResult::Success
		} else {
			scripted.remove(0)
		}
	}
}

/// A `ChangeObservable` that records every notification it receives.
#[derive(Default)]
pub struct RecordingObservable {
	changes: Mutex<Vec<Change>>,
}

impl RecordingObservable {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn changes(&self) -> Vec<Change> {
		self.changes.lock().unwrap().clone()
	}
}

impl ChangeObservable for RecordingObservable {
	fn on_change(&self, change: &Change) {
		self.changes.lock().unwrap().push(change.clone());
	}
}
