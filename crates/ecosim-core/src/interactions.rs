//! Species interaction effects: the movement and energy changes behind every action.
//!
//! Each function returns `Ok(true)` when the action had its intended effect,
//! `Ok(false)` when it ran but achieved nothing (a missed hunt, an empty
//! neighborhood), and an [`EntityError`] wrapped in [`WorldError`] when the
//! request itself was invalid.

use crate::agent::Agent;
use crate::arena::AgentId;
use crate::attributes::Species;
use crate::error::{EntityError, WorldError};
use crate::world::World;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Cooldown imposed by every hunting attempt that reaches striking range.
pub const HUNTING_COOLDOWN: f64 = 5.0;
pub const FORAGING_COOLDOWN: f64 = 3.0;
pub const COMPETITION_COOLDOWN: f64 = 5.0;

const BASE_HUNT_SUCCESS: f64 = 0.5;
const MIN_HUNT_SUCCESS: f64 = 0.2;
const MAX_HUNT_SUCCESS: f64 = 0.9;
const FLEE_ENERGY_FACTOR: f64 = 0.4;
const WANDER_ENERGY_FACTOR: f64 = 0.1;
const MAX_DEPLETION_FRACTION: f64 = 0.3;

fn actor(world: &World, id: AgentId) -> Result<&Agent, WorldError> {
    world
        .agent(id)
        .ok_or_else(|| EntityError::UnknownAgent(id).into())
}

fn actor_mut(world: &mut World, id: AgentId) -> Result<&mut Agent, WorldError> {
    world
        .agent_mut(id)
        .ok_or_else(|| EntityError::UnknownAgent(id).into())
}

fn require_species(
    agent: &Agent,
    id: AgentId,
    allowed: &[Species],
    action: &'static str,
) -> Result<(), WorldError> {
    if allowed.contains(&agent.species()) {
        Ok(())
    } else {
        Err(EntityError::UnsupportedAction { agent: id, action }.into())
    }
}

/// Chance a strike succeeds, clamped to `[0.2, 0.9]`.
#[must_use]
pub fn hunt_success_probability(predator: &Agent, prey: &Agent) -> f64 {
    let raw = BASE_HUNT_SUCCESS
        * (predator.health() / 100.0)
        * predator.energy_ratio()
        * (1.0 - 0.5 * prey.health() / 100.0)
        * (1.0 - 0.5 * prey.energy_ratio());
    if raw.is_nan() {
        return MIN_HUNT_SUCCESS;
    }
    raw.clamp(MIN_HUNT_SUCCESS, MAX_HUNT_SUCCESS)
}

/// `competition_factor * (1 + adaptation)`; zero for natives.
#[must_use]
pub fn competition_strength(invasive: &Agent) -> f64 {
    invasive.attributes().invasive_traits().map_or(0.0, |traits| {
        traits.competition_factor * (1.0 + invasive.adaptation_level())
    })
}

/// Random step that costs a sliver of energy.
pub fn wander(world: &mut World, id: AgentId) -> Result<bool, WorldError> {
    world.move_agent_randomly(id)?;
    let agent = actor_mut(world, id)?;
    let cost = WANDER_ENERGY_FACTOR * agent.attributes().energy_consumption;
    agent.set_energy(agent.energy() - cost);
    Ok(true)
}

/// Step toward another agent without interacting with it.
pub fn approach(world: &mut World, id: AgentId, target: AgentId) -> Result<bool, WorldError> {
    let destination = world
        .agent(target)
        .filter(|agent| agent.is_alive())
        .map(Agent::position)
        .ok_or(EntityError::InvalidTarget { agent: id, target })?;
    world.move_agent_towards(id, destination)?;
    Ok(true)
}

/// Close in on `prey_id` and strike when inside interaction range.
pub fn hunt(world: &mut World, id: AgentId, prey_id: AgentId) -> Result<bool, WorldError> {
    require_species(actor(world, id)?, id, &[Species::Predator], "hunt")?;
    let prey = world.agent(prey_id).ok_or(EntityError::InvalidTarget {
        agent: id,
        target: prey_id,
    })?;
    if prey.species() != Species::Prey {
        return Err(EntityError::InvalidTarget {
            agent: id,
            target: prey_id,
        }
        .into());
    }
    if !prey.is_alive() {
        return Ok(false);
    }
    let prey_position = prey.position();

    let position = world.move_agent_towards(id, prey_position)?;
    let predator = actor_mut(world, id)?;
    if position.distance(&prey_position) >= predator.attributes().interaction_range {
        return Ok(false);
    }
    predator.set_hunting_cooldown(HUNTING_COOLDOWN);

    let (probability, digest_efficiency) = {
        let predator = actor(world, id)?;
        let prey = actor(world, prey_id)?;
        let digest = predator
            .attributes()
            .predator_traits()
            .map_or(0.0, |traits| traits.digest_efficiency);
        (hunt_success_probability(predator, prey), digest)
    };
    let roll: f64 = world.rng().random();
    if roll >= probability {
        debug!(predator = ?id, prey = ?prey_id, probability, "hunt missed");
        return Ok(false);
    }

    let prey = actor_mut(world, prey_id)?;
    let prey_energy = prey.energy();
    prey.set_health(0.0);
    let gained = prey_energy * digest_efficiency;
    let predator = actor_mut(world, id)?;
    predator.set_energy(predator.energy() + gained);
    debug!(predator = ?id, prey = ?prey_id, gained, "hunt succeeded");
    Ok(true)
}

/// Run directly away from `threat` at full speed.
pub fn flee(world: &mut World, id: AgentId, threat: AgentId) -> Result<bool, WorldError> {
    let threat_position = world
        .agent(threat)
        .map(Agent::position)
        .ok_or(EntityError::InvalidTarget { agent: id, target: threat })?;
    let away = actor(world, id)?.position().away_from(&threat_position);
    world.move_agent_towards(id, away)?;
    let agent = actor_mut(world, id)?;
    let cost = FLEE_ENERGY_FACTOR * agent.attributes().energy_consumption;
    agent.set_energy(agent.energy() - cost);
    Ok(true)
}

/// Gather energy from the environment, then drift randomly.
pub fn forage(world: &mut World, id: AgentId) -> Result<bool, WorldError> {
    let agent = actor(world, id)?;
    require_species(agent, id, &[Species::Prey, Species::Invasive], "forage")?;
    if agent.foraging_cooldown().unwrap_or(0.0) > 0.0 {
        return Ok(false);
    }
    let attrs = agent.attributes();
    let ceiling = if let Some(traits) = attrs.prey_traits() {
        traits.foraging_efficiency
    } else if let Some(traits) = attrs.invasive_traits() {
        traits.resource_consumption * (1.0 + 0.5 * agent.adaptation_level())
    } else {
        0.0
    };
    let gained = ceiling * world.rng().random_range(0.5..=1.0);

    let agent = actor_mut(world, id)?;
    agent.set_energy(agent.energy() + gained);
    agent.set_foraging_cooldown(FORAGING_COOLDOWN);
    world.move_agent_randomly(id)?;
    Ok(true)
}

/// Drain energy from a native competitor.
///
/// With no explicit target a random live native inside interaction range is
/// picked; an empty neighborhood degrades to a random step.
pub fn compete(
    world: &mut World,
    id: AgentId,
    target: Option<AgentId>,
) -> Result<bool, WorldError> {
    let agent = actor(world, id)?;
    require_species(agent, id, &[Species::Invasive], "compete")?;
    let range = agent.attributes().interaction_range;
    let origin = agent.position();
    actor_mut(world, id)?.set_competition_cooldown(COMPETITION_COOLDOWN);

    let target = match target {
        Some(target) => target,
        None => {
            let natives = world.entities_in_range_where(&origin, range, |_, other| {
                other.is_alive() && other.species().is_native()
            });
            match natives.choose(world.rng()).copied() {
                Some(target) => target,
                None => {
                    world.move_agent_randomly(id)?;
                    return Ok(false);
                }
            }
        }
    };

    let native = world.agent(target).ok_or(EntityError::InvalidTarget {
        agent: id,
        target,
    })?;
    if !native.species().is_native() {
        return Err(EntityError::InvalidTarget { agent: id, target }.into());
    }
    if !native.is_alive() {
        return Ok(false);
    }
    let native_position = native.position();
    let position = world.move_agent_towards(id, native_position)?;
    if position.distance(&native_position) >= 0.5 * range {
        return Ok(false);
    }

    let strength = competition_strength(actor(world, id)?);
    let native = actor_mut(world, target)?;
    let depletion = (0.1 * strength).min(MAX_DEPLETION_FRACTION) * native.energy();
    native.set_energy(native.energy() - depletion);
    let invasive = actor_mut(world, id)?;
    invasive.set_energy(invasive.energy() + 0.5 * depletion);
    debug!(invasive = ?id, native = ?target, depletion, "competition drained native");
    Ok(true)
}
