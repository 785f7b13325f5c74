//! Ticket: one admission request waiting on or running against the LLM
//! endpoint. `Priority` is deliberately two-valued here — a
//! broker-internal concept, not a general domain attribute (see
//! `domain::Capability` for why `Priority` isn't exported from `domain`).

use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    High,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: String,
    pub prompt: String,
    pub component: String,
    pub priority: Priority,
    pub submitted_at: Instant,
}

impl Ticket {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, component: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            component: component.into(),
            priority,
            submitted_at: Instant::now(),
        }
    }
}

impl Eq for Ticket {}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// LIFO within a class: freshest submission sorts greatest.
impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.submitted_at.cmp(&other.submitted_at))
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_outranks_low_regardless_of_submission_order() {
        let low = Ticket::new("a", "p", "router", Priority::Low);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let high = Ticket::new("b", "p", "router", Priority::High);
        assert!(high > low);
    }

    #[test]
    fn same_class_is_lifo() {
        let first = Ticket::new("a", "p", "router", Priority::Low);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = Ticket::new("b", "p", "router", Priority::Low);
        assert!(second > first);
    }
}
