//! Shared vocabulary for the authgate authorization engine
//!
//! This crate holds the types every other authgate crate speaks:
//!
//! - [`Action`]: the four data actions (`Read`, `Create`, `Update`, `Delete`)
//! - [`Filter`]: entity-agnostic constraint trees plus the AND/OR algebra
//!   ([`and_all`], [`or_all`]) and residual record matching ([`matches`])
//! - [`AuthorizationContext`]: the per-request identity handle, threaded
//!   explicitly through every call (never process-global), with
//!   [`with_authorization_context`] as the scoped-acquisition wrapper
//! - [`EntityGraph`]: the read-only entity/relationship graph consumed from
//!   the schema host
//! - [`EngineConfig`]: depth limit and the single generic denial message
//!
//! # Design
//!
//! Filters at this layer are not tied to any backend's query language. A
//! multi-segment [`FieldPath`] addresses a related entity's field and implies
//! a join or cross-provider correlation; turning that into something a
//! concrete provider can execute is the planner's job, not this crate's.

mod action;
mod config;
mod context;
mod error;
mod filter;
mod graph;
mod page;

pub use action::Action;
pub use config::{EngineConfig, DEFAULT_DENIAL_MESSAGE, DEFAULT_MAX_QUERY_DEPTH};
pub use context::{with_authorization_context, AuthorizationContext, EVERYONE_ROLE};
pub use error::{CoreError, Result};
pub use filter::{and_all, matches, or_all, CompareOp, Condition, FieldPath, Filter};
pub use graph::{EntityGraph, EntitySchema, FieldKind, Relation};
pub use page::{Direction, OrderBy, Page};
