//! Pre-execution static audit for authgate
//!
//! Before any resolver or provider runs, the [`Auditor`] walks the parsed
//! operation document and discovers the full [`TouchSet`]: every
//! (entity, action, depth) triple the operation will touch, including
//! indirect access through fragment spreads, inline fragments, and
//! relationship-addressing filter arguments. A fragment is never a way to
//! reach fields the direct selection could not reach.
//!
//! Depth is counted across both selection nesting and filter-path nesting;
//! exceeding the configured maximum aborts immediately with
//! [`AuditError::DepthLimitExceeded`] - before any consolidation and before
//! any provider call.
//!
//! Consolidating the discovered triples against the ACL registry (and the
//! atomic all-or-nothing decision) is the engine's job; this crate only
//! answers "what does this operation touch, and is it shallow enough".

mod auditor;
mod document;
mod error;
mod touch;

pub use auditor::Auditor;
pub use document::{
    Arguments, FieldSelection, Fragment, InlineFragment, Operation, OperationDocument,
    OperationKind, RootField, Selection,
};
pub use error::{AuditError, Result};
pub use touch::{Touch, TouchSet};
