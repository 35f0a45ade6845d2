//! Data actions

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four data actions a request can perform against an entity.
///
/// Every entity/action pair a query will touch is discovered by the
/// pre-execution auditor and checked against the ACL before any provider
/// call is made. Relationship traversal and filter evaluation always touch
/// the related entity with `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    /// All actions, in declaration order
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    /// Lower-case name used in logs and error context
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
