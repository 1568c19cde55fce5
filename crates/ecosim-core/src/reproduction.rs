//! Mate discovery, seasonal fertility, and offspring synthesis shared by every species.

use crate::agent::{Agent, Gender, MAX_HEALTH};
use crate::arena::AgentId;
use crate::attributes::{Species, SpeciesAttributes};
use crate::error::{EntityError, WorldError};
use crate::geometry::Position;
use crate::season::Season;
use crate::world::World;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Maximum per-axis offset of a newborn from its first parent.
pub const OFFSPRING_JITTER: f64 = 10.0;
/// Upper bound of the random boost added to inherited adaptation.
pub const ADAPTATION_INHERITANCE_BOOST: f64 = 0.05;

/// Same species, opposite gender, both alive.
#[must_use]
pub fn is_compatible(a: &Agent, b: &Agent) -> bool {
    a.species() == b.species() && a.gender() != b.gender() && a.is_alive() && b.is_alive()
}

/// Reproduction-eligible partners for `id` within `radius`.
#[must_use]
pub fn find_mates(world: &World, id: AgentId, radius: f64) -> Vec<AgentId> {
    let Some(agent) = world.agent(id) else {
        return Vec::new();
    };
    world.entities_in_range_where(&agent.position(), radius, |other_id, other| {
        other_id != id && is_compatible(agent, other) && other.can_reproduce()
    })
}

/// Pick a random eligible partner within the agent's interaction range.
pub fn find_mate(world: &mut World, id: AgentId) -> Option<AgentId> {
    let range = world.agent(id)?.attributes().interaction_range;
    let mates = find_mates(world, id, range);
    mates.choose(world.rng()).copied()
}

/// One acceptance roll with probability `min(1, modifier)`.
pub fn season_accepts<R: Rng + ?Sized>(season: Season, rng: &mut R) -> bool {
    let modifier = season.fertility_modifier();
    modifier >= 1.0 || rng.random::<f64>() < modifier
}

/// Scale a drawn litter size by parental vitality and season, then clamp to the species bounds.
#[must_use]
pub fn offspring_count(
    attributes: &SpeciesAttributes,
    drawn: u32,
    vitality: f64,
    season_modifier: f64,
) -> u32 {
    let scaled = (f64::from(drawn) * vitality * season_modifier).floor();
    let scaled = if scaled.is_finite() { scaled.max(0.0) } else { 0.0 };
    let (min, max) = litter_bounds(attributes);
    (scaled as u32).clamp(min, max)
}

fn litter_bounds(attributes: &SpeciesAttributes) -> (u32, u32) {
    let (a, b) = (attributes.min_offspring, attributes.max_offspring);
    (a.min(b), a.max(b))
}

fn validate_pair(world: &World, a: AgentId, b: AgentId) -> Result<(), EntityError> {
    let first = world.agent(a).ok_or(EntityError::UnknownAgent(a))?;
    let second = world.agent(b).ok_or(EntityError::UnknownAgent(b))?;
    if a == b || !is_compatible(first, second) {
        return Err(EntityError::InvalidPartner {
            agent: a,
            partner: b,
        });
    }
    if !first.can_reproduce() {
        return Err(EntityError::NotEligible(a));
    }
    if !second.can_reproduce() {
        return Err(EntityError::NotEligible(b));
    }
    Ok(())
}

fn pay_cost(agent: &mut Agent) {
    let fraction = agent
        .attributes()
        .reproduction_cost_fraction(agent.adaptation_level());
    let cost = fraction * agent.attributes().max_energy;
    agent.set_energy(agent.energy() - cost);
    agent.reset_reproduction_timer();
}

/// Pair `a` with `b` and register their offspring with the world.
///
/// Invalid or unready pairs and rejected seasonal rolls yield an empty litter.
/// Offspring registered before a world failure stay in the world.
pub fn reproduce(world: &mut World, a: AgentId, b: AgentId) -> Result<Vec<AgentId>, WorldError> {
    if let Err(err) = validate_pair(world, a, b) {
        debug!(agent = ?a, partner = ?b, error = %err, "reproduction skipped");
        return Ok(Vec::new());
    }
    let season = world.current_season();
    if !season_accepts(season, world.rng()) {
        debug!(agent = ?a, partner = ?b, %season, "reproduction rejected by season");
        return Ok(Vec::new());
    }

    for id in [a, b] {
        if let Some(parent) = world.agent_mut(id) {
            pay_cost(parent);
        }
    }

    let (template, vitality, adaptation_peak, adaptation_mean) = {
        let first = world.agent(a).ok_or(EntityError::UnknownAgent(a))?;
        let second = world.agent(b).ok_or(EntityError::UnknownAgent(b))?;
        (
            first.clone(),
            (first.vitality() + second.vitality()) / 2.0,
            first.adaptation_level().max(second.adaptation_level()),
            (first.adaptation_level() + second.adaptation_level()) / 2.0,
        )
    };
    let attributes = template.attributes_handle();
    let is_invasive = attributes.species() == Species::Invasive;

    let (min, max) = litter_bounds(&attributes);
    let mut drawn = world.rng().random_range(min..=max);
    if is_invasive {
        drawn += (adaptation_peak * 0.5).round() as u32;
    }
    let count = offspring_count(&attributes, drawn, vitality, season.fertility_modifier());

    let origin = template.position();
    let mut offspring = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let rng = world.rng();
        let position = Position::new(
            origin.x + rng.random_range(-OFFSPRING_JITTER..=OFFSPRING_JITTER),
            origin.y + rng.random_range(-OFFSPRING_JITTER..=OFFSPRING_JITTER),
        );
        let gender = Gender::random(rng);
        let mut child = Agent::new(attributes.clone(), position, gender, template.strategy())
            .with_vitals(
                attributes.offspring_energy * attributes.max_energy,
                MAX_HEALTH,
                0.0,
            );
        if is_invasive {
            let boost = rng.random_range(0.0..=ADAPTATION_INHERITANCE_BOOST);
            child = child.with_adaptation(adaptation_mean + boost);
        }
        offspring.push(world.add_offspring(child)?);
    }
    debug!(
        agent = ?a,
        partner = ?b,
        species = %attributes.species(),
        offspring = offspring.len(),
        "reproduction succeeded"
    );
    Ok(offspring)
}
