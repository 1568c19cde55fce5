use crate::agent::Agent;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashSet;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Dense agent storage addressed by generational handles.
///
/// Iteration follows insertion order, and every removal path preserves it so
/// that the per-tick snapshot order is stable.
#[derive(Debug, Default)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    agents: Vec<Agent>,
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over agent handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Iterate over `(handle, agent)` pairs in dense iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> + '_ {
        self.handles.iter().copied().zip(self.agents.iter())
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns true if `id` refers to a live slot.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Returns the agent behind `id`, if present.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).and_then(|idx| self.agents.get(idx))
    }

    #[must_use]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        let idx = self.index_of(id)?;
        self.agents.get_mut(idx)
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: Agent) -> AgentId {
        let index = self.agents.len();
        self.agents.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id`, shifting later agents down to keep iteration order.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let index = self.slots.remove(id)?;
        let removed = self.agents.remove(index);
        let removed_handle = self.handles.remove(index);
        debug_assert_eq!(removed_handle, id);
        for (offset, handle) in self.handles.iter().enumerate().skip(index) {
            if let Some(slot) = self.slots.get_mut(*handle) {
                *slot = offset;
            }
        }
        Some(removed)
    }

    /// Remove every agent in `dead`, preserving iteration order of the survivors.
    pub fn remove_many(&mut self, dead: &HashSet<AgentId>) -> Vec<(AgentId, Agent)> {
        if dead.is_empty() {
            return Vec::new();
        }
        let handles = std::mem::take(&mut self.handles);
        let agents = std::mem::take(&mut self.agents);
        let mut removed = Vec::new();
        for (id, agent) in handles.into_iter().zip(agents) {
            if dead.contains(&id) {
                self.slots.remove(id);
                removed.push((id, agent));
                continue;
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = self.handles.len();
            }
            self.handles.push(id);
            self.agents.push(agent);
        }
        removed
    }

    /// Clear all stored agents.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.agents.clear();
    }
}
