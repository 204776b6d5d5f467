//! Session identity shared by the engine and both endpoints.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names one logical connection: protocol version plus both comp ids, seen
/// from the local side (`sender_comp_id` is us).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    /// Protocol version string, e.g. `FIX.4.4`.
    pub begin_string: String,
    /// Local comp id.
    pub sender_comp_id: String,
    /// Counterparty comp id.
    pub target_comp_id: String,
}

impl SessionId {
    /// Creates a new session identity.
    pub fn new(begin_string: &str, sender_comp_id: &str, target_comp_id: &str) -> Self {
        SessionId {
            begin_string: String::from(begin_string),
            sender_comp_id: String::from(sender_comp_id),
            target_comp_id: String::from(target_comp_id),
        }
    }

    /// The same connection as named by the counterparty.
    pub fn reversed(&self) -> Self {
        SessionId {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_reverse() {
        let id = SessionId::new("FIX.4.4", "ACCEPTOR", "INIT1");
        assert_eq!(id.to_string(), "FIX.4.4:ACCEPTOR->INIT1");
        assert_eq!(id.reversed().to_string(), "FIX.4.4:INIT1->ACCEPTOR");
        assert_eq!(id.reversed().reversed(), id);
    }
}
