//! Capability checks for runtime operations.

use persona_core::AccessLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operations a runtime context can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Execute,
    Admin,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Read,
        Operation::Write,
        Operation::Execute,
        Operation::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Execute => "execute",
            Operation::Admin => "admin",
        }
    }

    /// Exact, lowercase names only. Anything else is unknown.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed access table.
///
/// | Level                   | Operations                  |
/// |-------------------------|-----------------------------|
/// | root                    | read, write, execute, admin |
/// | specialized / composite | read, write, execute        |
/// | transient               | read, execute               |
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn allows(level: AccessLevel, op: Operation) -> bool {
        match level {
            AccessLevel::Root => true,
            AccessLevel::Specialized | AccessLevel::Composite => op != Operation::Admin,
            AccessLevel::Transient => matches!(op, Operation::Read | Operation::Execute),
        }
    }

    /// Check an operation by name. Unknown names are denied.
    pub fn allows_named(level: AccessLevel, operation: &str) -> bool {
        Operation::parse(operation).is_some_and(|op| Self::allows(level, op))
    }

    pub fn allowed_operations(level: AccessLevel) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| Self::allows(level, *op))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_table() {
        assert_eq!(AccessPolicy::allowed_operations(AccessLevel::Root).len(), 4);
        assert_eq!(
            AccessPolicy::allowed_operations(AccessLevel::Specialized),
            vec![Operation::Read, Operation::Write, Operation::Execute]
        );
        assert_eq!(
            AccessPolicy::allowed_operations(AccessLevel::Composite),
            AccessPolicy::allowed_operations(AccessLevel::Specialized)
        );
        assert_eq!(
            AccessPolicy::allowed_operations(AccessLevel::Transient),
            vec![Operation::Read, Operation::Execute]
        );
    }

    #[test]
    fn transient_cannot_admin() {
        assert!(!AccessPolicy::allows_named(AccessLevel::Transient, "admin"));
        assert!(!AccessPolicy::allows_named(AccessLevel::Transient, "write"));
        assert!(AccessPolicy::allows_named(AccessLevel::Transient, "read"));
    }

    #[test]
    fn unknown_operations_are_denied() {
        for level in AccessLevel::ALL {
            assert!(!AccessPolicy::allows_named(level, "delete"));
            assert!(!AccessPolicy::allows_named(level, "ADMIN"));
            assert!(!AccessPolicy::allows_named(level, ""));
        }
    }
}
