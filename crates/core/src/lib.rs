// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

//! Interceptor chain, change-capture data model and collaborator
//! interfaces for the interflux transactional property-change core.
//!
//! This crate is deliberately transaction-agnostic: it owns the parts of
//! the framework that exist whether or not a transaction is open — the
//! interceptor pipeline (component C1), the ambient change context
//! (C2), the data model (subjects, properties, changes, §3) and the
//! external collaborator contracts (C7, §6). `interflux-transaction`
//! builds the commit protocol on top of it.

pub mod change;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod namespace;
pub mod observable;
pub mod property;
pub mod registry;
pub mod source;
pub mod validator;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use change::Change;
pub use context::{current_change_context, with_change_context, with_change_context_async, ChangeContext};
pub use error::Error;
pub use interceptor::{InterceptorChain, ReadAction, ReadInterceptor, WriteAction, WriteInterceptor};
pub use namespace::{Context, ContextId, PropertyStore};
pub use observable::{ChangeObservable, NoopObservable};
pub use property::{PropertyId, PropertyMetadata, SubjectId};
pub use registry::{PathProvider, Registry, SubjectFactory};
pub use source::{Source, SourceId, WriteResult};
pub use validator::{NoopValidator, ValidationError, Validator};
pub use value::{PropertyValue, ValueKind};

pub type Result<T> = std::result::Result<T, Error>;
