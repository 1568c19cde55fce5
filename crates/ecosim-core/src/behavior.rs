//! Action selection: a rule table per species, or utility scoring with softmax sampling.

use crate::agent::Agent;
use crate::arena::AgentId;
use crate::attributes::Species;
use crate::error::WorldError;
use crate::interactions;
use crate::reproduction;
use crate::world::World;
use ordered_float::OrderedFloat;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

const WANDER_UTILITY: f64 = 0.5;
const BASE_UTILITY: f64 = 0.5;
const RULES_HUNGER: f64 = 0.7;
const INVASIVE_HUNGER: f64 = 0.8;
const UTILITY_HUNT_SATIETY: f64 = 0.9;
const MATE_SEARCH_FACTOR: f64 = 1.5;

/// How an agent chooses its action each tick. Fixed at construction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorStrategy {
    /// Deterministic priority rules per species.
    #[default]
    Rules,
    /// Utility-scored catalog sampled through a softmax.
    Utility,
}

impl fmt::Display for BehaviorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BehaviorStrategy::Rules => "rules",
            BehaviorStrategy::Utility => "utility",
        })
    }
}

impl FromStr for BehaviorStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rules" | "basic" => Ok(BehaviorStrategy::Rules),
            "utility" => Ok(BehaviorStrategy::Utility),
            other => Err(format!("unknown behavior strategy `{other}`")),
        }
    }
}

/// A candidate action for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Wander,
    Forage,
    Flee { threat: AgentId },
    Hunt { prey: AgentId },
    Compete { native: AgentId },
    Mate { partner: AgentId },
    /// Close distance to a target without interacting.
    Approach { target: AgentId },
}

fn distance_factor(distance: f64, range: f64) -> f64 {
    1.0 - (distance / range).min(1.0)
}

impl Action {
    /// Short lowercase action name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Action::Wander => "wander",
            Action::Forage => "forage",
            Action::Flee { .. } => "flee",
            Action::Hunt { .. } => "hunt",
            Action::Compete { .. } => "compete",
            Action::Mate { .. } => "mate",
            Action::Approach { .. } => "approach",
        }
    }

    /// Whether the action is valid for `actor` in the current world state.
    #[must_use]
    pub fn can_perform(&self, world: &World, actor: AgentId) -> bool {
        let Some(agent) = world.agent(actor).filter(|agent| agent.is_alive()) else {
            return false;
        };
        let live_target = |id: AgentId| world.agent(id).filter(|other| other.is_alive());
        match *self {
            Action::Wander => true,
            Action::Forage => {
                agent.foraging_cooldown() == Some(0.0)
                    && agent.energy() < agent.attributes().max_energy
            }
            Action::Flee { threat } => {
                let Some(traits) = agent.attributes().prey_traits() else {
                    return false;
                };
                live_target(threat).is_some_and(|threat| {
                    threat.species() == Species::Predator
                        && agent.distance_to(threat) <= traits.perception_range
                })
            }
            Action::Hunt { prey } => {
                let Some(traits) = agent.attributes().predator_traits() else {
                    return false;
                };
                agent.hunting_cooldown() == Some(0.0)
                    && agent.energy_ratio() < UTILITY_HUNT_SATIETY
                    && live_target(prey).is_some_and(|prey| {
                        prey.species() == Species::Prey
                            && agent.distance_to(prey) <= traits.hunting_range
                    })
            }
            Action::Compete { native } => {
                agent.competition_cooldown() == Some(0.0)
                    && live_target(native).is_some_and(|native| {
                        native.species().is_native() && agent.can_interact_with(native)
                    })
            }
            Action::Mate { partner } => {
                partner != actor
                    && agent.can_reproduce()
                    && live_target(partner).is_some_and(|partner| {
                        reproduction::is_compatible(agent, partner)
                            && partner.can_reproduce()
                            && agent.can_interact_with(partner)
                    })
            }
            Action::Approach { target } => target != actor && live_target(target).is_some(),
        }
    }

    /// Desirability of the action; higher is better. Returns NaN for unknown agents.
    #[must_use]
    pub fn utility(&self, world: &World, actor: AgentId) -> f64 {
        let Some(agent) = world.agent(actor) else {
            return f64::NAN;
        };
        let target = |id: AgentId| world.agent(id);
        let hunger = 1.0 - agent.energy_ratio();
        match *self {
            Action::Wander | Action::Approach { .. } => WANDER_UTILITY,
            Action::Forage => {
                let urgency = if agent.energy_ratio() < 0.6 { 2.0 } else { 0.5 };
                BASE_UTILITY + hunger * urgency
            }
            Action::Flee { threat } => {
                let (Some(threat), Some(traits)) =
                    (target(threat), agent.attributes().prey_traits())
                else {
                    return f64::NAN;
                };
                let proximity = distance_factor(agent.distance_to(threat), traits.perception_range);
                BASE_UTILITY
                    + 3.0 * proximity * agent.energy_ratio()
                    + (1.0 - agent.health() / 100.0)
            }
            Action::Hunt { prey } => {
                let (Some(prey), Some(traits)) =
                    (target(prey), agent.attributes().predator_traits())
                else {
                    return f64::NAN;
                };
                let vulnerability = 1.0 - (prey.health() / 100.0) * prey.energy_ratio();
                BASE_UTILITY
                    + 2.0 * hunger
                    + 0.5 * vulnerability
                    + distance_factor(agent.distance_to(prey), traits.hunting_range)
            }
            Action::Compete { native } => {
                let Some(native) = target(native) else {
                    return f64::NAN;
                };
                BASE_UTILITY
                    + (1.0 - native.energy_ratio())
                    + distance_factor(
                        agent.distance_to(native),
                        agent.attributes().interaction_range,
                    )
                    + hunger
            }
            Action::Mate { partner } => {
                let Some(partner) = target(partner) else {
                    return f64::NAN;
                };
                BASE_UTILITY + 1.5 + (agent.vitality() + partner.vitality()) / 2.0
            }
        }
    }

    /// Execute the action once.
    pub fn perform(&self, world: &mut World, actor: AgentId) -> Result<bool, WorldError> {
        match *self {
            Action::Wander => interactions::wander(world, actor),
            Action::Forage => interactions::forage(world, actor),
            Action::Flee { threat } => interactions::flee(world, actor, threat),
            Action::Hunt { prey } => interactions::hunt(world, actor, prey),
            Action::Compete { native } => interactions::compete(world, actor, Some(native)),
            Action::Mate { partner } => reproduction::reproduce(world, actor, partner)
                .map(|offspring| !offspring.is_empty()),
            Action::Approach { target } => interactions::approach(world, actor, target),
        }
    }
}

/// Normalised softmax weights; the maximum is subtracted before exponentiation.
#[must_use]
pub fn softmax(utilities: &[f64]) -> Vec<f64> {
    let max = utilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![0.0; utilities.len()];
    }
    let weights: Vec<f64> = utilities.iter().map(|u| (u - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Sample an action with probability proportional to `exp(utility)`.
pub fn select_action<R: Rng + ?Sized>(scored: &[(Action, f64)], rng: &mut R) -> Option<Action> {
    let utilities: Vec<f64> = scored.iter().map(|(_, utility)| *utility).collect();
    let probabilities = softmax(&utilities);
    let roll: f64 = rng.random();
    let mut cumulative = 0.0;
    for ((action, _), probability) in scored.iter().zip(probabilities) {
        cumulative += probability;
        if roll < cumulative {
            return Some(*action);
        }
    }
    scored.last().map(|(action, _)| *action)
}

fn live_neighbors(
    world: &World,
    agent: &Agent,
    actor: AgentId,
    radius: f64,
    species: impl Fn(Species) -> bool,
) -> Vec<AgentId> {
    world.entities_in_range_where(&agent.position(), radius, |id, other| {
        id != actor && other.is_alive() && species(other.species())
    })
}

/// Performable actions for `actor`, with finite utilities.
#[must_use]
pub fn scored_catalog(world: &World, actor: AgentId) -> Vec<(Action, f64)> {
    let Some(agent) = world.agent(actor) else {
        return Vec::new();
    };
    let attrs = agent.attributes();
    let mut candidates = vec![Action::Wander];
    match attrs.species() {
        Species::Prey => {
            candidates.push(Action::Forage);
            if let Some(traits) = attrs.prey_traits() {
                let threats = live_neighbors(world, agent, actor, traits.perception_range, |s| {
                    s == Species::Predator
                });
                candidates.extend(threats.into_iter().map(|threat| Action::Flee { threat }));
            }
        }
        Species::Predator => {
            if let Some(traits) = attrs.predator_traits() {
                let prey = live_neighbors(world, agent, actor, traits.hunting_range, |s| {
                    s == Species::Prey
                });
                candidates.extend(prey.into_iter().map(|prey| Action::Hunt { prey }));
            }
        }
        Species::Invasive => {
            candidates.push(Action::Forage);
            let natives =
                live_neighbors(world, agent, actor, attrs.interaction_range, Species::is_native);
            candidates.extend(natives.into_iter().map(|native| Action::Compete { native }));
        }
    }
    if agent.can_reproduce() {
        let mates = reproduction::find_mates(world, actor, attrs.interaction_range);
        candidates.extend(mates.into_iter().map(|partner| Action::Mate { partner }));
    }

    candidates
        .into_iter()
        .filter(|action| action.can_perform(world, actor))
        .filter_map(|action| {
            let utility = action.utility(world, actor);
            utility.is_finite().then_some((action, utility))
        })
        .collect()
}

fn pick(world: &mut World, ids: &[AgentId]) -> Option<AgentId> {
    ids.choose(world.rng()).copied()
}

fn predator_rule(world: &mut World, actor: AgentId, agent: &Agent) -> Action {
    let attrs = agent.attributes();
    if agent.can_reproduce() {
        let radius = MATE_SEARCH_FACTOR * attrs.interaction_range;
        let mates = reproduction::find_mates(world, actor, radius);
        return match pick(world, &mates) {
            Some(partner) => {
                let far = world
                    .agent(partner)
                    .is_some_and(|mate| agent.distance_to(mate) > attrs.interaction_range);
                if far {
                    Action::Approach { target: partner }
                } else {
                    Action::Mate { partner }
                }
            }
            None => Action::Wander,
        };
    }
    let Some(traits) = attrs.predator_traits() else {
        return Action::Wander;
    };
    if agent.hunting_cooldown().unwrap_or(0.0) > 0.0 {
        return Action::Wander;
    }
    let prey = live_neighbors(world, agent, actor, traits.hunting_range, |s| s == Species::Prey);
    if agent.energy_ratio() < RULES_HUNGER {
        return pick(world, &prey).map_or(Action::Wander, |prey| Action::Hunt { prey });
    }
    // Sated predators still strike at prey already inside interaction range.
    let striking: Vec<AgentId> = prey
        .into_iter()
        .filter(|id| {
            world
                .agent(*id)
                .is_some_and(|prey| agent.can_interact_with(prey))
        })
        .collect();
    pick(world, &striking).map_or(Action::Wander, |prey| Action::Hunt { prey })
}

fn prey_rule(world: &mut World, actor: AgentId, agent: &Agent) -> Action {
    if let Some(traits) = agent.attributes().prey_traits() {
        let threats = live_neighbors(world, agent, actor, traits.perception_range, |s| {
            s == Species::Predator
        });
        let closest = threats.into_iter().min_by_key(|id| {
            OrderedFloat(
                world
                    .agent(*id)
                    .map_or(f64::INFINITY, |other| agent.distance_to(other)),
            )
        });
        if let Some(threat) = closest {
            return Action::Flee { threat };
        }
    }
    if agent.energy_ratio() < RULES_HUNGER && agent.foraging_cooldown() == Some(0.0) {
        return Action::Forage;
    }
    mate_or_wander(world, actor, agent)
}

fn invasive_rule(world: &mut World, actor: AgentId, agent: &Agent) -> Action {
    if agent.energy_ratio() < INVASIVE_HUNGER && agent.foraging_cooldown() == Some(0.0) {
        return Action::Forage;
    }
    if agent.can_reproduce() {
        return mate_or_wander(world, actor, agent);
    }
    if agent.competition_cooldown() == Some(0.0) {
        let natives = live_neighbors(
            world,
            agent,
            actor,
            agent.attributes().interaction_range,
            Species::is_native,
        );
        if let Some(native) = pick(world, &natives) {
            return Action::Compete { native };
        }
    }
    Action::Wander
}

fn mate_or_wander(world: &mut World, actor: AgentId, agent: &Agent) -> Action {
    if !agent.can_reproduce() {
        return Action::Wander;
    }
    reproduction::find_mate(world, actor).map_or(Action::Wander, |partner| Action::Mate { partner })
}

/// Choose an action through the species rule table.
pub fn rule_action(world: &mut World, actor: AgentId) -> Action {
    let Some(agent) = world.agent(actor).cloned() else {
        return Action::Wander;
    };
    match agent.species() {
        Species::Predator => predator_rule(world, actor, &agent),
        Species::Prey => prey_rule(world, actor, &agent),
        Species::Invasive => invasive_rule(world, actor, &agent),
    }
}

/// Choose an action by softmax sampling over the utility catalog.
pub fn utility_action(world: &mut World, actor: AgentId) -> Action {
    let scored = scored_catalog(world, actor);
    select_action(&scored, world.rng()).unwrap_or(Action::Wander)
}

/// Decide and perform one action for `actor`.
///
/// Entity-level failures are logged and count as a no-op; world errors propagate.
pub(crate) fn act(world: &mut World, actor: AgentId) -> Result<bool, WorldError> {
    let Some(strategy) = world.agent(actor).map(Agent::strategy) else {
        return Err(WorldError::UnknownAgent(actor));
    };
    let action = match strategy {
        BehaviorStrategy::Rules => rule_action(world, actor),
        BehaviorStrategy::Utility => utility_action(world, actor),
    };
    trace!(agent = ?actor, action = action.name(), "action selected");
    match action.perform(world, actor) {
        Ok(success) => Ok(success),
        Err(WorldError::Entity(err)) => {
            debug!(agent = ?actor, action = action.name(), error = %err, "action failed");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
