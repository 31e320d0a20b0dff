//! Read-state ledger: which items the reader has already been sent.

use serde::{Deserialize, Serialize};

/// Delivery state of a single id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    /// Sentinel slot, or an id the catalog has not reached yet
    #[default]
    Unknown,
    /// Known and not yet delivered
    Unread,
    /// Delivered in some earlier run; permanent
    Delivered,
}

/// Per-id read state, indexed like the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReadState>", into = "Vec<ReadState>")]
pub struct Ledger {
    states: Vec<ReadState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            states: vec![ReadState::Unknown],
        }
    }

    /// Highest id tracked (0 when empty).
    pub fn upper_bound(&self) -> u32 {
        (self.states.len() - 1) as u32
    }

    pub fn state(&self, id: u32) -> ReadState {
        self.states.get(id as usize).copied().unwrap_or_default()
    }

    pub fn is_unread(&self, id: u32) -> bool {
        self.state(id) == ReadState::Unread
    }

    pub fn is_delivered(&self, id: u32) -> bool {
        self.state(id) == ReadState::Delivered
    }

    /// Grow to `upper_bound`, marking every new id unread.
    ///
    /// Returns how many ids were added. Never shrinks.
    pub fn extend_to(&mut self, upper_bound: u32) -> usize {
        let target = upper_bound as usize + 1;
        let before = self.states.len();
        if target > before {
            self.states.resize(target, ReadState::Unread);
        }
        self.states.len() - before
    }

    /// Mark `id` delivered. Returns false if the id is not tracked.
    pub fn mark_delivered(&mut self, id: u32) -> bool {
        match self.states.get_mut(id as usize) {
            Some(state) if id > 0 => {
                *state = ReadState::Delivered;
                true
            }
            _ => false,
        }
    }

    /// Every unread id in ascending order.
    pub fn unread_ids(&self) -> Vec<u32> {
        self.ids_in(ReadState::Unread)
    }

    pub fn delivered_count(&self) -> usize {
        self.ids_in(ReadState::Delivered).len()
    }

    fn ids_in(&self, wanted: ReadState) -> Vec<u32> {
        self.states
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, state)| **state == wanted)
            .map(|(id, _)| id as u32)
            .collect()
    }
}

impl TryFrom<Vec<ReadState>> for Ledger {
    type Error = String;

    fn try_from(states: Vec<ReadState>) -> std::result::Result<Self, Self::Error> {
        match states.first() {
            Some(ReadState::Unknown) => {}
            _ => return Err("ledger does not start with the sentinel entry".into()),
        }
        if let Some(index) = states.iter().skip(1).position(|s| *s == ReadState::Unknown) {
            return Err(format!("unknown state at tracked index {}", index + 1));
        }
        Ok(Self { states })
    }
}

impl From<Ledger> for Vec<ReadState> {
    fn from(ledger: Ledger) -> Self {
        ledger.states
    }
}
