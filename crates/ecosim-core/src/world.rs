use crate::agent::Agent;
use crate::arena::{AgentArena, AgentId};
use crate::attributes::positive;
use crate::behavior;
use crate::error::{EntityError, WorldError};
use crate::geometry::Position;
use crate::season::Season;
use crate::stats::WorldStatistics;
use ecosim_index::{GridConfig, IndexError, NeighborhoodIndex, UniformGridIndex};
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Summary of one [`World::update`] call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    /// Simulated time after the tick.
    pub time: f64,
    /// Agents whose update ran this tick.
    pub updated: usize,
    pub births: usize,
    /// Agents removed at the end of the tick, failures included.
    pub deaths: usize,
    /// Agents removed because their update failed.
    pub failures: usize,
}

/// Owns the population, the spatial index, simulated time, and the random source.
pub struct World {
    width: f64,
    height: f64,
    agents: AgentArena,
    index: UniformGridIndex<AgentId>,
    time: f64,
    season: Season,
    rng: SmallRng,
    births: usize,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("agent_count", &self.agents.len())
            .field("time", &self.time)
            .field("season", &self.season)
            .finish()
    }
}

impl World {
    /// Create an empty world; `cell_size` tunes the spatial index.
    pub fn new(
        width: f64,
        height: f64,
        cell_size: f64,
        rng: SmallRng,
    ) -> Result<Self, WorldError> {
        positive("width", width)?;
        positive("height", height)?;
        positive("cell_size", cell_size)?;
        let index = UniformGridIndex::new(GridConfig {
            cell_size,
            world_width: width,
            world_height: height,
        })?;
        Ok(Self {
            width,
            height,
            agents: AgentArena::new(),
            index,
            time: 0.0,
            season: Season::Spring,
            rng,
            births: 0,
        })
    }

    /// Returns the world width.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Returns the world height.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Returns the accumulated simulated time.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.time
    }

    /// Returns the season used for fertility rolls.
    #[must_use]
    pub const fn current_season(&self) -> Season {
        self.season
    }

    /// Sets the season used for fertility rolls.
    pub fn set_current_season(&mut self, season: Season) {
        self.season = season;
    }

    /// Borrow the world RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Read-only view of the spatial index.
    #[must_use]
    pub fn index(&self) -> &UniformGridIndex<AgentId> {
        &self.index
    }

    /// Number of stored agents, including any killed since the last sweep.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Returns the agent behind `id`, if present.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Mutable access; positions can only change through world movement methods.
    #[must_use]
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Returns true if `id` is stored, dead or alive.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.agents.contains(id)
    }

    /// Iterate `(id, agent)` in stable insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (AgentId, &Agent)> + '_ {
        self.agents.iter()
    }

    /// Snapshot of current handles in iteration order.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.iter_handles().collect()
    }

    /// True when `position` lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub fn contains_position(&self, position: &Position) -> bool {
        (0.0..self.width).contains(&position.x) && (0.0..self.height).contains(&position.y)
    }

    /// Clamp a position into the world rectangle.
    #[must_use]
    pub fn clamp_position(&self, position: Position) -> Position {
        fn axis(value: f64, extent: f64) -> f64 {
            if value < 0.0 {
                0.0
            } else if value >= extent {
                (extent - 1.0).max(0.0)
            } else {
                value
            }
        }
        Position::new(axis(position.x, self.width), axis(position.y, self.height))
    }

    /// Register an agent with both the agent list and the spatial index.
    ///
    /// Agents whose species attributes fail validation are refused.
    pub fn add_entity(&mut self, mut agent: Agent) -> Result<AgentId, WorldError> {
        agent.attributes().validate()?;
        let position = agent.position();
        if !position.is_finite() {
            return Err(IndexError::NonFinitePosition {
                x: position.x,
                y: position.y,
            }
            .into());
        }
        let clamped = self.clamp_position(position);
        agent.set_position(clamped);
        let id = self.agents.insert(agent);
        if let Err(err) = self.index.insert(id, clamped.as_tuple()) {
            self.agents.remove(id);
            return Err(err.into());
        }
        Ok(id)
    }

    pub(crate) fn add_offspring(&mut self, agent: Agent) -> Result<AgentId, WorldError> {
        let id = self.add_entity(agent)?;
        self.births += 1;
        Ok(id)
    }

    /// Remove an agent from both the agent list and the spatial index.
    pub fn remove_entity(&mut self, id: AgentId) -> Result<Agent, WorldError> {
        let agent = self.agents.remove(id).ok_or(WorldError::UnknownAgent(id))?;
        match self.index.remove(id) {
            Ok(_) => Ok(agent),
            Err(IndexError::UnknownKey) => Err(WorldError::Desync(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop every agent and reset simulated time.
    pub fn clear(&mut self) {
        self.agents.clear();
        self.index.clear();
        self.time = 0.0;
        self.births = 0;
    }

    /// Agents within `radius` of `position`.
    #[must_use]
    pub fn get_entities_in_range(&self, position: &Position, radius: f64) -> Vec<AgentId> {
        self.index.query_range(position.as_tuple(), radius)
    }

    /// Agents within `radius` of `position` accepted by `filter`.
    pub fn entities_in_range_where(
        &self,
        position: &Position,
        radius: f64,
        mut filter: impl FnMut(AgentId, &Agent) -> bool,
    ) -> Vec<AgentId> {
        let mut found = Vec::new();
        self.index
            .neighbors_within(position.as_tuple(), radius, &mut |id, _| {
                if let Some(agent) = self.agents.get(id)
                    && filter(id, agent)
                {
                    found.push(id);
                }
            });
        found
    }

    /// Live agents per unit area within `radius` of `position`.
    #[must_use]
    pub fn entity_density(&self, position: &Position, radius: f64) -> f64 {
        if !(radius > 0.0) {
            return 0.0;
        }
        let count = self
            .entities_in_range_where(position, radius, |_, agent| agent.is_alive())
            .len();
        count as f64 / (std::f64::consts::PI * radius * radius)
    }

    /// Clamp an agent back inside the world and refresh its index cell.
    pub fn enforce_boundaries(&mut self, id: AgentId) -> Result<Position, WorldError> {
        let old = self
            .agents
            .get(id)
            .map(Agent::position)
            .ok_or(WorldError::UnknownAgent(id))?;
        self.sync_position(id, old)
    }

    /// Clamp the agent's position and move its index membership away from `old`.
    fn sync_position(&mut self, id: AgentId, old: Position) -> Result<Position, WorldError> {
        let current = self
            .agents
            .get(id)
            .map(Agent::position)
            .ok_or(WorldError::UnknownAgent(id))?;
        if !current.is_finite() {
            return Err(EntityError::NonFiniteState(id).into());
        }
        let clamped = self.clamp_position(current);
        if let Some(agent) = self.agents.get_mut(id) {
            agent.set_position(clamped);
        }
        if clamped != old {
            self.index
                .update_position(id, old.as_tuple(), clamped.as_tuple())
                .map_err(|err| match err {
                    IndexError::UnknownKey => WorldError::Desync(id),
                    other => WorldError::Index(other),
                })?;
        }
        Ok(clamped)
    }

    /// Step an agent toward `target` at its species speed.
    pub(crate) fn move_agent_towards(
        &mut self,
        id: AgentId,
        target: Position,
    ) -> Result<Position, WorldError> {
        let agent = self.agents.get_mut(id).ok_or(WorldError::UnknownAgent(id))?;
        let old = agent.position();
        let speed = agent.attributes().speed;
        agent.position_mut().move_towards(&target, speed);
        self.sync_position(id, old)
    }

    /// Step an agent in a random direction at its species speed.
    pub(crate) fn move_agent_randomly(&mut self, id: AgentId) -> Result<Position, WorldError> {
        let agent = self.agents.get_mut(id).ok_or(WorldError::UnknownAgent(id))?;
        let old = agent.position();
        let speed = agent.attributes().speed;
        agent.position_mut().move_random(speed, &mut self.rng);
        self.sync_position(id, old)
    }

    /// Run one agent's update: aging, decay, timers, then its behavior.
    pub fn update_agent(&mut self, id: AgentId, time_delta: f64) -> Result<(), WorldError> {
        let agent = self.agents.get_mut(id).ok_or(WorldError::UnknownAgent(id))?;
        if !agent.is_alive() {
            return Err(EntityError::NotAlive(id).into());
        }
        agent.apply_metabolism(time_delta);
        if agent.is_alive() {
            agent.advance_timers(time_delta);
        }
        let alive = agent.is_alive();
        self.enforce_boundaries(id)?;
        if !alive {
            return Ok(());
        }
        behavior::act(self, id)?;
        self.enforce_boundaries(id)?;
        Ok(())
    }

    /// Advance simulated time and update every agent in a snapshot taken at tick start.
    ///
    /// Agents killed earlier in the tick are skipped; offspring born during the tick
    /// are not updated until the next one. Dead agents are removed before returning.
    pub fn update(&mut self, time_delta: f64) -> Result<TickReport, WorldError> {
        if !(time_delta.is_finite() && time_delta > 0.0) {
            return Err(WorldError::InvalidTimeDelta(time_delta));
        }
        self.time += time_delta;
        self.births = 0;
        let snapshot = self.agent_ids();
        let mut report = TickReport {
            time: self.time,
            ..TickReport::default()
        };

        for id in snapshot {
            if !self.agents.get(id).is_some_and(Agent::is_alive) {
                continue;
            }
            report.updated += 1;
            if let Err(err) = self.update_agent(id, time_delta) {
                report.failures += 1;
                warn!(agent = ?id, error = %err, "agent update failed; removing agent");
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.kill();
                }
            }
        }

        report.births = self.births;
        report.deaths = self.remove_dead()?;
        debug!(
            time = self.time,
            updated = report.updated,
            births = report.births,
            deaths = report.deaths,
            "world tick complete"
        );
        Ok(report)
    }

    fn remove_dead(&mut self) -> Result<usize, WorldError> {
        let dead: HashSet<AgentId> = self
            .agents
            .iter()
            .filter(|(_, agent)| !agent.is_alive())
            .map(|(id, _)| id)
            .collect();
        if dead.is_empty() {
            return Ok(0);
        }
        let removed = self.agents.remove_many(&dead);
        let mut desync = None;
        for (id, _) in &removed {
            if self.index.remove(*id).is_err() {
                desync.get_or_insert(WorldError::Desync(*id));
            }
        }
        match desync {
            Some(err) => Err(err),
            None => Ok(removed.len()),
        }
    }

    /// Aggregate statistics over the current population.
    #[must_use]
    pub fn statistics(&self) -> WorldStatistics {
        WorldStatistics::from_agents(
            self.time,
            self.season,
            self.agents.iter().map(|(_, agent)| agent),
        )
    }
}
