//! Session status tracking

use std::fmt;

/// Where a session is in its life
///
/// `Active` is the only state that accepts new prompts. Both other states are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Bound to a live connection
    Active,

    /// Released by `destroy`
    Destroyed,

    /// The connection it was bound to is gone
    Disconnected,
}

impl SessionStatus {
    /// Whether the session accepts new work
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    /// Name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Destroyed => "destroyed",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_accepts_work() {
        assert!(SessionStatus::Active.is_active());
        assert!(!SessionStatus::Destroyed.is_active());
        assert!(!SessionStatus::Disconnected.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
    }
}
