use crate::attributes::{Species, SpeciesAttributes};
use crate::behavior::BehaviorStrategy;
use crate::geometry::Position;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Upper bound for agent health.
pub const MAX_HEALTH: f64 = 100.0;

/// Binary sex used for mate matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Uniformly random gender.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

/// Clamped vital signs shared by every species.
///
/// Death is sticky: once health or energy reaches zero the agent never revives,
/// even if a later write raises either value again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    energy: f64,
    health: f64,
    age: f64,
    alive: bool,
}

impl Vitals {
    /// Build clamped vitals; starting at zero energy or health yields a dead agent.
    #[must_use]
    pub fn new(energy: f64, health: f64, age: f64, max_energy: f64) -> Self {
        let mut vitals = Self {
            energy: 0.0,
            health: 0.0,
            age: 0.0,
            alive: true,
        };
        vitals.set_energy(energy, max_energy);
        vitals.set_health(health);
        vitals.set_age(age);
        vitals
    }

    /// Current energy.
    #[must_use]
    pub const fn energy(&self) -> f64 {
        self.energy
    }

    #[must_use]
    pub const fn health(&self) -> f64 {
        self.health
    }

    #[must_use]
    pub const fn age(&self) -> f64 {
        self.age
    }

    /// Returns true until energy or health is exhausted.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Clamp into `[0, max_energy]`; NaN counts as exhaustion.
    pub fn set_energy(&mut self, value: f64, max_energy: f64) {
        self.energy = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, max_energy)
        };
        if self.energy <= 0.0 {
            self.alive = false;
        }
    }

    /// Clamp into `[0, 100]`; NaN counts as a lethal wound.
    pub fn set_health(&mut self, value: f64) {
        self.health = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, MAX_HEALTH)
        };
        if self.health <= 0.0 {
            self.alive = false;
        }
    }

    pub fn set_age(&mut self, value: f64) {
        self.age = if value.is_nan() { 0.0 } else { value.max(0.0) };
    }

    /// Mark the agent dead without touching the other readings.
    pub fn kill(&mut self) {
        self.alive = false;
    }
}

/// Per-variant timers and state that only some species carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "species", rename_all = "snake_case")]
pub enum SpeciesState {
    Predator {
        hunting_cooldown: f64,
    },
    Prey {
        foraging_cooldown: f64,
    },
    Invasive {
        foraging_cooldown: f64,
        competition_cooldown: f64,
        adaptation_level: f64,
    },
}

impl SpeciesState {
    fn fresh(species: Species) -> Self {
        match species {
            Species::Predator => SpeciesState::Predator {
                hunting_cooldown: 0.0,
            },
            Species::Prey => SpeciesState::Prey {
                foraging_cooldown: 0.0,
            },
            Species::Invasive => SpeciesState::Invasive {
                foraging_cooldown: 0.0,
                competition_cooldown: 0.0,
                adaptation_level: 0.0,
            },
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

/// One simulated individual.
#[derive(Debug, Clone)]
pub struct Agent {
    position: Position,
    gender: Gender,
    vitals: Vitals,
    time_since_reproduction: f64,
    state: SpeciesState,
    strategy: BehaviorStrategy,
    attributes: Arc<SpeciesAttributes>,
}

impl Agent {
    /// Create a newborn-aged agent at full energy and health.
    #[must_use]
    pub fn new(
        attributes: Arc<SpeciesAttributes>,
        position: Position,
        gender: Gender,
        strategy: BehaviorStrategy,
    ) -> Self {
        let vitals = Vitals::new(attributes.max_energy, MAX_HEALTH, 0.0, attributes.max_energy);
        Self {
            position,
            gender,
            vitals,
            time_since_reproduction: 0.0,
            state: SpeciesState::fresh(attributes.species()),
            strategy,
            attributes,
        }
    }

    /// Replace the vitals with clamped values.
    #[must_use]
    pub fn with_vitals(mut self, energy: f64, health: f64, age: f64) -> Self {
        self.vitals = Vitals::new(energy, health, age, self.attributes.max_energy);
        self
    }

    /// Set the time elapsed since the last reproduction.
    #[must_use]
    pub fn with_time_since_reproduction(mut self, elapsed: f64) -> Self {
        self.time_since_reproduction = non_negative(elapsed);
        self
    }

    /// Seed the adaptation level of an invasive agent; ignored for natives.
    #[must_use]
    pub fn with_adaptation(mut self, level: f64) -> Self {
        if let SpeciesState::Invasive {
            adaptation_level, ..
        } = &mut self.state
        {
            *adaptation_level = if level.is_nan() {
                0.0
            } else {
                level.clamp(0.0, 1.0)
            };
        }
        self
    }

    /// Returns the agent's species.
    #[must_use]
    pub fn species(&self) -> Species {
        self.attributes.species()
    }

    /// Returns the agent's species attributes.
    #[must_use]
    pub fn attributes(&self) -> &SpeciesAttributes {
        &self.attributes
    }

    /// Shared handle to the species attributes.
    #[must_use]
    pub fn attributes_handle(&self) -> Arc<SpeciesAttributes> {
        Arc::clone(&self.attributes)
    }

    /// Returns the current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub(crate) fn position_mut(&mut self) -> &mut Position {
        &mut self.position
    }

    /// Returns the agent's gender.
    #[must_use]
    pub const fn gender(&self) -> Gender {
        self.gender
    }

    /// Returns the strategy used to pick actions.
    #[must_use]
    pub const fn strategy(&self) -> BehaviorStrategy {
        self.strategy
    }

    /// Returns the clamped vitals.
    #[must_use]
    pub const fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    /// Returns the species-specific state.
    #[must_use]
    pub const fn state(&self) -> &SpeciesState {
        &self.state
    }

    /// Current energy.
    #[must_use]
    pub const fn energy(&self) -> f64 {
        self.vitals.energy()
    }

    /// Current health in `[0, 100]`.
    #[must_use]
    pub const fn health(&self) -> f64 {
        self.vitals.health()
    }

    /// Age in simulated seconds.
    #[must_use]
    pub const fn age(&self) -> f64 {
        self.vitals.age()
    }

    /// Returns true until energy or health is exhausted.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.vitals.is_alive()
    }

    pub fn set_energy(&mut self, value: f64) {
        self.vitals.set_energy(value, self.attributes.max_energy);
    }

    pub fn set_health(&mut self, value: f64) {
        self.vitals.set_health(value);
    }

    pub fn set_age(&mut self, value: f64) {
        self.vitals.set_age(value);
    }

    /// Mark the agent dead; it is swept at the end of the tick.
    pub fn kill(&mut self) {
        self.vitals.kill();
    }

    /// Energy as a fraction of capacity.
    #[must_use]
    pub fn energy_ratio(&self) -> f64 {
        self.energy() / self.attributes.max_energy
    }

    /// Mean of the health and energy fractions.
    #[must_use]
    pub fn vitality(&self) -> f64 {
        (self.health() / MAX_HEALTH + self.energy_ratio()) / 2.0
    }

    /// Returns true once the agent reaches its species maturity age.
    #[must_use]
    pub fn is_mature(&self) -> bool {
        self.age() >= self.attributes.maturity_age
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(&self, other: &Agent) -> f64 {
        self.position.distance(&other.position)
    }

    /// True when `other` is within this agent's interaction range.
    #[must_use]
    pub fn can_interact_with(&self, other: &Agent) -> bool {
        self.distance_to(other) <= self.attributes.interaction_range
    }

    /// Simulated seconds since the agent last reproduced.
    #[must_use]
    pub const fn time_since_reproduction(&self) -> f64 {
        self.time_since_reproduction
    }

    pub(crate) fn reset_reproduction_timer(&mut self) {
        self.time_since_reproduction = 0.0;
    }

    /// Remaining hunting cooldown; `None` for non-predators.
    #[must_use]
    pub const fn hunting_cooldown(&self) -> Option<f64> {
        match self.state {
            SpeciesState::Predator { hunting_cooldown } => Some(hunting_cooldown),
            _ => None,
        }
    }

    /// Remaining foraging cooldown; `None` for predators.
    #[must_use]
    pub const fn foraging_cooldown(&self) -> Option<f64> {
        match self.state {
            SpeciesState::Prey { foraging_cooldown }
            | SpeciesState::Invasive {
                foraging_cooldown, ..
            } => Some(foraging_cooldown),
            SpeciesState::Predator { .. } => None,
        }
    }

    /// Remaining competition cooldown; `None` for natives.
    #[must_use]
    pub const fn competition_cooldown(&self) -> Option<f64> {
        match self.state {
            SpeciesState::Invasive {
                competition_cooldown,
                ..
            } => Some(competition_cooldown),
            _ => None,
        }
    }

    /// Adaptation level for invasives; natives report zero.
    #[must_use]
    pub const fn adaptation_level(&self) -> f64 {
        match self.state {
            SpeciesState::Invasive {
                adaptation_level, ..
            } => adaptation_level,
            _ => 0.0,
        }
    }

    pub(crate) fn set_hunting_cooldown(&mut self, value: f64) {
        if let SpeciesState::Predator { hunting_cooldown } = &mut self.state {
            *hunting_cooldown = non_negative(value);
        }
    }

    pub(crate) fn set_foraging_cooldown(&mut self, value: f64) {
        match &mut self.state {
            SpeciesState::Prey { foraging_cooldown }
            | SpeciesState::Invasive {
                foraging_cooldown, ..
            } => *foraging_cooldown = non_negative(value),
            SpeciesState::Predator { .. } => {}
        }
    }

    pub(crate) fn set_competition_cooldown(&mut self, value: f64) {
        if let SpeciesState::Invasive {
            competition_cooldown,
            ..
        } = &mut self.state
        {
            *competition_cooldown = non_negative(value);
        }
    }

    /// Species-specific reproduction readiness.
    #[must_use]
    pub fn can_reproduce(&self) -> bool {
        let attrs = &*self.attributes;
        self.is_alive()
            && self.is_mature()
            && self.time_since_reproduction >= attrs.breeding_cycle
            && self.energy() > attrs.energy_threshold(self.adaptation_level()) * attrs.max_energy
            && self.health() > attrs.reproduction_health_floor
    }

    /// Baseline step shared by all species: aging and metabolic decay.
    pub(crate) fn apply_metabolism(&mut self, time_delta: f64) {
        self.set_age(self.age() + time_delta);
        let drained = self.energy() - self.attributes.energy_consumption * time_delta;
        self.set_energy(drained);
    }

    /// Advance reproduction and cooldown timers, and grow adaptation.
    pub(crate) fn advance_timers(&mut self, time_delta: f64) {
        self.time_since_reproduction = non_negative(self.time_since_reproduction + time_delta);
        let adaptation_rate = self
            .attributes
            .invasive_traits()
            .map_or(0.0, |traits| traits.adaptation_rate);
        match &mut self.state {
            SpeciesState::Predator { hunting_cooldown } => {
                *hunting_cooldown = non_negative(*hunting_cooldown - time_delta);
            }
            SpeciesState::Prey { foraging_cooldown } => {
                *foraging_cooldown = non_negative(*foraging_cooldown - time_delta);
            }
            SpeciesState::Invasive {
                foraging_cooldown,
                competition_cooldown,
                adaptation_level,
            } => {
                *foraging_cooldown = non_negative(*foraging_cooldown - time_delta);
                *competition_cooldown = non_negative(*competition_cooldown - time_delta);
                *adaptation_level = (*adaptation_level + adaptation_rate * time_delta).min(1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(species: Species) -> Agent {
        Agent::new(
            Arc::new(SpeciesAttributes::defaults_for(species)),
            Position::new(10.0, 10.0),
            Gender::Female,
            BehaviorStrategy::Rules,
        )
    }

    #[test]
    fn new_agents_start_full() {
        let agent = sample(Species::Prey);
        assert_eq!(agent.energy(), 500.0);
        assert_eq!(agent.health(), MAX_HEALTH);
        assert_eq!(agent.age(), 0.0);
        assert!(agent.is_alive());
        assert_eq!(agent.foraging_cooldown(), Some(0.0));
        assert_eq!(agent.hunting_cooldown(), None);
    }

    #[test]
    fn setters_clamp() {
        let mut agent = sample(Species::Predator);
        agent.set_energy(5_000.0);
        assert_eq!(agent.energy(), 1_000.0);
        agent.set_health(250.0);
        assert_eq!(agent.health(), MAX_HEALTH);
        agent.set_age(-3.0);
        assert_eq!(agent.age(), 0.0);
    }

    #[test]
    fn death_is_monotonic() {
        let mut agent = sample(Species::Prey);
        agent.set_health(0.0);
        assert!(!agent.is_alive());
        agent.set_health(80.0);
        agent.set_energy(400.0);
        assert!(!agent.is_alive());
    }

    #[test]
    fn energy_exhaustion_kills() {
        let mut agent = sample(Species::Invasive);
        agent.set_energy(-1.0);
        assert_eq!(agent.energy(), 0.0);
        assert!(!agent.is_alive());
    }

    #[test]
    fn maturity_and_interaction_range() {
        let mut agent = sample(Species::Prey);
        assert!(!agent.is_mature());
        agent.set_age(180.0);
        assert!(agent.is_mature());

        let mut near = sample(Species::Predator);
        near.set_position(Position::new(40.0, 10.0));
        assert!(agent.can_interact_with(&near));
        near.set_position(Position::new(40.1, 10.0));
        assert!(!agent.can_interact_with(&near));
    }

    #[test]
    fn reproduction_eligibility_checks_every_gate() {
        let base = sample(Species::Prey)
            .with_vitals(400.0, 90.0, 200.0)
            .with_time_since_reproduction(30.0);
        assert!(base.can_reproduce());

        assert!(!base.clone().with_vitals(400.0, 90.0, 10.0).can_reproduce());
        assert!(!base.clone().with_time_since_reproduction(29.0).can_reproduce());
        assert!(!base.clone().with_vitals(300.0, 90.0, 200.0).can_reproduce());
        assert!(!base.clone().with_vitals(400.0, 50.0, 200.0).can_reproduce());
    }

    #[test]
    fn timers_tick_down_and_adaptation_caps() {
        let mut agent = sample(Species::Invasive);
        agent.set_foraging_cooldown(3.0);
        agent.set_competition_cooldown(0.5);
        agent.advance_timers(1.0);
        assert_eq!(agent.foraging_cooldown(), Some(2.0));
        assert_eq!(agent.competition_cooldown(), Some(0.0));
        assert!((agent.adaptation_level() - 0.1).abs() < 1e-12);
        agent.advance_timers(100.0);
        assert_eq!(agent.adaptation_level(), 1.0);
        assert_eq!(agent.time_since_reproduction(), 101.0);
    }

    #[test]
    fn metabolism_ages_and_drains() {
        let mut agent = sample(Species::Predator);
        agent.apply_metabolism(2.0);
        assert_eq!(agent.age(), 2.0);
        assert_eq!(agent.energy(), 999.0);
    }

    #[derive(Debug, Clone)]
    enum Write {
        Energy(f64),
        Health(f64),
        Age(f64),
    }

    fn write_strategy() -> impl Strategy<Value = Write> {
        prop_oneof![
            (-2_000.0f64..2_000.0).prop_map(Write::Energy),
            (-200.0f64..200.0).prop_map(Write::Health),
            (-50.0f64..50.0).prop_map(Write::Age),
        ]
    }

    proptest! {
        #[test]
        fn vitals_stay_clamped(writes in proptest::collection::vec(write_strategy(), 0..64)) {
            let mut agent = sample(Species::Predator);
            let mut ever_exhausted = false;
            for write in writes {
                match write {
                    Write::Energy(v) => agent.set_energy(v),
                    Write::Health(v) => agent.set_health(v),
                    Write::Age(v) => agent.set_age(v),
                }
                ever_exhausted |= agent.energy() == 0.0 || agent.health() == 0.0;
                prop_assert!((0.0..=agent.attributes().max_energy).contains(&agent.energy()));
                prop_assert!((0.0..=MAX_HEALTH).contains(&agent.health()));
                prop_assert!(agent.age() >= 0.0);
                prop_assert_eq!(agent.is_alive(), !ever_exhausted);
            }
        }
    }
}
