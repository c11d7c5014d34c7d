use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::AgentId;

#[derive(Debug)]
struct Membership {
    name: String,
    capacity: usize,
    members: BTreeSet<AgentId>,
}

/// Capacity-limited membership set shared between entities, such as the
/// agents currently allowed to chase the player.
///
/// Cloning yields another handle to the same set.
#[derive(Debug, Clone)]
pub struct SharedCoordinator {
    inner: Arc<RwLock<Membership>>,
}

impl SharedCoordinator {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Membership {
                name: name.into(),
                capacity,
                members: BTreeSet::new(),
            })),
        }
    }

    /// Joins if there is room. Already being a member counts as success.
    pub fn try_join(&self, agent: AgentId) -> bool {
        let mut inner = self.inner.write();
        if inner.members.contains(&agent) {
            return true;
        }
        if inner.members.len() >= inner.capacity {
            debug!(coordinator = %inner.name, agent = %agent, "Coordinator full");
            return false;
        }
        inner.members.insert(agent);
        debug!(
            coordinator = %inner.name,
            agent = %agent,
            members = inner.members.len(),
            "Joined coordinator"
        );
        true
    }

    /// Returns whether the agent was a member.
    pub fn leave(&self, agent: AgentId) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.members.remove(&agent);
        if removed {
            debug!(coordinator = %inner.name, agent = %agent, "Left coordinator");
        }
        removed
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.inner.read().members.contains(&agent)
    }

    pub fn len(&self) -> usize {
        self.inner.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let inner = self.inner.read();
        inner.members.len() >= inner.capacity
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }

    /// Shrinking below the current size keeps existing members; new joins
    /// wait until enough leave.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.write().capacity = capacity;
    }

    pub fn members(&self) -> Vec<AgentId> {
        self.inner.read().members.iter().copied().collect()
    }

    pub fn name(&self) -> String {
        self.inner.read().name.clone()
    }
}
