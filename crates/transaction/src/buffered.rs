// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use std::future::Future;

use interflux_core::Error;
use parking_lot::Mutex;
use tracing::warn;

type Callback<S> = Box<dyn FnOnce(&S) -> Result<(), Error> + Send>;
type SnapshotApply<S> = Box<dyn FnOnce(&S) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriterState {
	Buffering,
	Ready,
}

/// Per-source queue that absorbs remote updates arriving while an adapter
/// is (re)loading its initial snapshot (spec §4.6, component C6).
/// Independent of the transaction machinery. Generic over the adapter's
/// own state type `S` so callers replay queued writes without downcasting
/// anything.
pub struct BufferedPropertyWriter<S> {
	state: Mutex<WriterState>,
	queue: Mutex<Vec<Callback<S>>>,
}

impl<S> BufferedPropertyWriter<S> {
	pub fn new() -> Self {
		Self { state: Mutex::new(WriterState::Buffering), queue: Mutex::new(Vec::new()) }
	}

	/// Enters `Buffering`, discarding any previously queued writes.
	/// Re-entrant from `Ready` — used on reconnection.
	pub fn start_buffering(&self) {
		*self.state.lock() = WriterState::Buffering;
		self.queue.lock().clear();
	}

	pub fn is_ready(&self) -> bool {
		*self.state.lock() == WriterState::Ready
	}

	/// Applies `f` immediately while `Ready`; while `Buffering`, appends
	/// it to the FIFO queue for later replay.
	pub fn write<F>(&self, adapter_state: &S, f: F)
	where
		F: FnOnce(&S) -> Result<(), Error> + Send + 'static,
	{
		if self.is_ready() {
			if let Err(err) = f(adapter_state) {
				warn!(error = %err, "buffered write failed");
			}
		} else {
			self.queue.lock().push(Box::new(f));
		}
	}

	/// Transitions `Buffering` → `Ready` (spec §4.6). A no-op if already
	/// `Ready`. Runs `apply_before_replay` (if any), then drains the
	/// queue in FIFO order; a failing callback is logged and does not
	/// stop the drain.
	pub fn complete_initialization<F>(&self, apply_before_replay: Option<F>, adapter_state: &S)
	where
		F: FnOnce(&S),
	{
		let mut state = self.state.lock();
		if *state == WriterState::Ready {
			return;
		}
		if let Some(flush) = apply_before_replay {
			flush(adapter_state);
		}
		self.drain(adapter_state);
		*state = WriterState::Ready;
	}

	/// Async counterpart used when the adapter loads its initial state
	/// from a remote call. Ordering: pre-load flush, then the snapshot
	/// the loader returns (if any), then the buffered replay — in that
	/// order, to avoid oscillating between stale and fresh state (spec
	/// §4.6 closing paragraph).
	pub async fn complete_initialization_with_initial_state<Flush, Load, Fut>(
		&self,
		pre_load_flush: Flush,
		load_initial_state: Load,
		adapter_state: &S,
	) where
		Flush: FnOnce(&S),
		Load: FnOnce(&S) -> Fut,
		Fut: Future<Output = Option<SnapshotApply<S>>>,
	{
		if self.is_ready() {
			return;
		}
		pre_load_flush(adapter_state);
		if let Some(apply_snapshot) = load_initial_state(adapter_state).await {
			apply_snapshot(adapter_state);
		}
		self.drain(adapter_state);
		*self.state.lock() = WriterState::Ready;
	}

	fn drain(&self, adapter_state: &S) {
		let queued = std::mem::take(&mut *self.queue.lock());
		for callback in queued {
			if let Err(err) = callback(adapter_state) {
				warn!(error = %err, "buffered replay callback failed");
			}
		}
	}
}

impl<S> Default for BufferedPropertyWriter<S> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	use super::*;

	struct State {
		log: parking_lot::Mutex<Vec<&'static str>>,
	}

	#[test]
	fn buffering_queues_writes_until_ready() {
		let writer = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };

		writer.write(&state, |s| {
			s.log.lock().push("a");
			Ok(())
		});
		assert!(state.log.lock().is_empty());

		writer.complete_initialization(None::<fn(&State)>, &state);
		assert_eq!(*state.log.lock(), vec!["a"]);
	}

	#[test]
	fn ready_writes_apply_immediately() {
		let writer = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };
		writer.complete_initialization(None::<fn(&State)>, &state);

		writer.write(&state, |s| {
			s.log.lock().push("a");
			Ok(())
		});
		assert_eq!(*state.log.lock(), vec!["a"]);
	}

	// S6 — a throwing callback is logged and swallowed; the drain
	// continues for later entries.
	#[test]
	fn failing_callback_does_not_stop_the_drain() {
		let writer: BufferedPropertyWriter<State> = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };
		let seen = Arc::new(AtomicUsize::new(0));

		writer.write(&state, |s| {
			s.log.lock().push("one");
			Ok(())
		});
		writer.write(&state, {
			let seen = seen.clone();
			move |_| {
				seen.fetch_add(1, Ordering::SeqCst);
				Err(interflux_core::Error::LocalApply { property: test_property(), message: "boom".into() })
			}
		});
		writer.write(&state, |s| {
			s.log.lock().push("three");
			Ok(())
		});

		writer.complete_initialization(Some(|s: &State| s.log.lock().push("snapshot")), &state);

		assert_eq!(seen.load(Ordering::SeqCst), 1);
		assert_eq!(*state.log.lock(), vec!["snapshot", "one", "three"]);
		assert!(writer.is_ready());
	}

	#[test]
	fn complete_initialization_is_idempotent() {
		let writer = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };
		writer.write(&state, |s| {
			s.log.lock().push("a");
			Ok(())
		});

		writer.complete_initialization(None::<fn(&State)>, &state);
		writer.complete_initialization(None::<fn(&State)>, &state);

		assert_eq!(*state.log.lock(), vec!["a"]);
	}

	#[test]
	fn start_buffering_after_ready_discards_old_queue() {
		let writer = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };
		writer.complete_initialization(None::<fn(&State)>, &state);

		writer.write(&state, |s| {
			s.log.lock().push("stale");
			Ok(())
		});
		writer.start_buffering();
		assert!(!writer.is_ready());

		writer.complete_initialization(None::<fn(&State)>, &state);
		assert!(state.log.lock().is_empty());
	}

	#[tokio::test]
	async fn async_initialization_orders_flush_then_snapshot_then_replay() {
		let writer: BufferedPropertyWriter<State> = BufferedPropertyWriter::new();
		let state = State { log: parking_lot::Mutex::new(Vec::new()) };

		writer.write(&state, |s| {
			s.log.lock().push("buffered");
			Ok(())
		});

		writer
			.complete_initialization_with_initial_state(
				|s: &State| s.log.lock().push("flush"),
				|_s: &State| async { Some(Box::new(|s: &State| s.log.lock().push("snapshot")) as SnapshotApply<State>) },
				&state,
			)
			.await;

		assert_eq!(*state.log.lock(), vec!["flush", "snapshot", "buffered"]);
	}

	fn test_property() -> interflux_core::PropertyId {
		interflux_core::PropertyId::new(interflux_core::SubjectId::new(), "x")
	}
}
