//! Caller identities for game participants.
//!
//! A participant is either an authenticated user of the wider platform or an
//! anonymous guest occupying a numbered slot inside one game.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an authenticated platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Guest slot number, unique within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestSlot(u32);

impl GuestSlot {
    /// Slot reserved for the anonymous creator of a game.
    pub const CREATOR: GuestSlot = GuestSlot(0);

    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// First slot handed to guests joining after the creator.
    pub fn first_joiner() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for GuestSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guest:{}", self.0)
    }
}

/// Who is acting on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    User(UserId),
    Guest(GuestSlot),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => id.fmt(f),
            Identity::Guest(slot) => slot.fmt(f),
        }
    }
}

/// How a new participant asks to be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    /// Authenticated user; idempotent on the user id.
    User(UserId),
    /// Anonymous guest; when `requested` names an occupied slot the existing
    /// participant is returned, otherwise the next free slot is assigned.
    Guest { requested: Option<GuestSlot> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creator_slot_is_zero_and_joiners_start_after_it() {
        assert_eq!(GuestSlot::CREATOR.value(), 0);
        assert!(GuestSlot::first_joiner() > GuestSlot::CREATOR);
        assert_eq!(GuestSlot::new(4).next(), GuestSlot::new(5));
    }

    #[test]
    fn identities_render_their_kind() {
        assert_eq!(Identity::User(UserId(7)).to_string(), "user:7");
        assert_eq!(Identity::Guest(GuestSlot::new(2)).to_string(), "guest:2");
    }
}
