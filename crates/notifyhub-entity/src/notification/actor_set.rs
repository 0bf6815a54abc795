//! Insertion-ordered, duplicate-free set of actors.

use serde::{Deserialize, Deserializer, Serialize};

use notifyhub_core::types::id::PersonId;

/// The actors that contributed to one notification.
///
/// Membership is compared by stable person id. Order is the order in which
/// actors were first added, so "X and N others" renders consistently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActorSet {
    actors: Vec<PersonId>,
}

impl ActorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single actor.
    pub fn single(actor: PersonId) -> Self {
        Self {
            actors: vec![actor],
        }
    }

    /// Append `actor` unless already present. Returns `true` if it was added.
    pub fn add(&mut self, actor: PersonId) -> bool {
        if self.contains(&actor) {
            return false;
        }
        self.actors.push(actor);
        true
    }

    /// Whether `actor` is a member.
    pub fn contains(&self, actor: &PersonId) -> bool {
        self.actors.contains(actor)
    }

    /// Number of distinct actors.
    pub fn count(&self) -> usize {
        self.actors.len()
    }

    /// Whether the set has no actors.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// The earliest actor, used for display.
    pub fn first(&self) -> Option<&PersonId> {
        self.actors.first()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PersonId> {
        self.actors.iter()
    }

    /// Borrow as a slice in insertion order.
    pub fn as_slice(&self) -> &[PersonId] {
        &self.actors
    }
}

impl FromIterator<PersonId> for ActorSet {
    fn from_iter<I: IntoIterator<Item = PersonId>>(iter: I) -> Self {
        let mut set = Self::new();
        for actor in iter {
            set.add(actor);
        }
        set
    }
}

impl Extend<PersonId> for ActorSet {
    fn extend<I: IntoIterator<Item = PersonId>>(&mut self, iter: I) {
        for actor in iter {
            self.add(actor);
        }
    }
}

impl<'de> Deserialize<'de> for ActorSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let actors = Vec::<PersonId>::deserialize(deserializer)?;
        Ok(actors.into_iter().collect())
    }
}
