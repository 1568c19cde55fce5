use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three populations sharing the world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Predator,
    Prey,
    Invasive,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Predator, Species::Prey, Species::Invasive];

    /// Lowercase species name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Species::Predator => "predator",
            Species::Prey => "prey",
            Species::Invasive => "invasive",
        }
    }

    /// Predators and prey are the natives an invasive competes against.
    #[must_use]
    pub const fn is_native(self) -> bool {
        matches!(self, Species::Predator | Species::Prey)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredatorTraits {
    /// Radius within which prey is noticed and pursued.
    pub hunting_range: f64,
    pub attack_strength: f64,
    /// Fraction of a kill's energy converted into predator energy.
    pub digest_efficiency: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PreyTraits {
    pub flee_range: f64,
    /// Upper bound on energy gained per foraging action.
    pub foraging_efficiency: f64,
    /// Radius within which predators are noticed.
    pub perception_range: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InvasiveTraits {
    pub competition_factor: f64,
    /// Adaptation gained per unit of simulated time.
    pub adaptation_rate: f64,
    /// Upper bound on energy gained per foraging action before adaptation bonus.
    pub resource_consumption: f64,
    /// How strongly adaptation lowers the reproduction energy threshold and cost.
    pub adaptation_discount: f64,
}

/// Species-specific parameters; the variant must agree with the owning species.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "species", rename_all = "snake_case")]
pub enum SpeciesTraits {
    Predator(PredatorTraits),
    Prey(PreyTraits),
    Invasive(InvasiveTraits),
}

impl SpeciesTraits {
    /// Returns the species these traits belong to.
    #[must_use]
    pub const fn species(&self) -> Species {
        match self {
            SpeciesTraits::Predator(_) => Species::Predator,
            SpeciesTraits::Prey(_) => Species::Prey,
            SpeciesTraits::Invasive(_) => Species::Invasive,
        }
    }
}

/// Immutable per-species configuration shared by every individual of that species.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesAttributes {
    pub max_energy: f64,
    /// Baseline energy drained per unit of simulated time.
    pub energy_consumption: f64,
    pub speed: f64,
    pub interaction_range: f64,
    pub maturity_age: f64,
    /// Minimum time between successive reproduction events.
    pub breeding_cycle: f64,
    pub min_offspring: u32,
    pub max_offspring: u32,
    /// Fraction of max energy an agent must exceed before it may reproduce.
    pub reproduction_energy_threshold: f64,
    /// Health an agent must strictly exceed before it may reproduce.
    pub reproduction_health_floor: f64,
    /// Fraction of max energy each parent spends on a reproduction event.
    pub reproduction_cost: f64,
    /// Fraction of max energy newborns start with.
    pub offspring_energy: f64,
    pub traits: SpeciesTraits,
}

impl SpeciesAttributes {
    /// Default predator attributes.
    #[must_use]
    pub fn predator() -> Self {
        Self {
            max_energy: 1_000.0,
            energy_consumption: 0.5,
            speed: 2.0,
            interaction_range: 50.0,
            maturity_age: 730.0,
            breeding_cycle: 180.0,
            min_offspring: 4,
            max_offspring: 7,
            reproduction_energy_threshold: 0.5,
            reproduction_health_floor: 40.0,
            reproduction_cost: 0.25,
            offspring_energy: 0.6,
            traits: SpeciesTraits::Predator(PredatorTraits {
                hunting_range: 75.0,
                attack_strength: 25.0,
                digest_efficiency: 0.7,
            }),
        }
    }

    /// Default prey attributes.
    #[must_use]
    pub fn prey() -> Self {
        Self {
            max_energy: 500.0,
            energy_consumption: 0.3,
            speed: 2.5,
            interaction_range: 30.0,
            maturity_age: 180.0,
            breeding_cycle: 30.0,
            min_offspring: 4,
            max_offspring: 12,
            reproduction_energy_threshold: 0.6,
            reproduction_health_floor: 50.0,
            reproduction_cost: 0.3,
            offspring_energy: 0.5,
            traits: SpeciesTraits::Prey(PreyTraits {
                flee_range: 100.0,
                foraging_efficiency: 15.0,
                perception_range: 80.0,
            }),
        }
    }

    /// Default invasive attributes.
    #[must_use]
    pub fn invasive() -> Self {
        Self {
            max_energy: 800.0,
            energy_consumption: 0.2,
            speed: 3.0,
            interaction_range: 60.0,
            maturity_age: 120.0,
            breeding_cycle: 25.0,
            min_offspring: 6,
            max_offspring: 15,
            reproduction_energy_threshold: 0.6,
            reproduction_health_floor: 40.0,
            reproduction_cost: 0.3,
            offspring_energy: 0.6,
            traits: SpeciesTraits::Invasive(InvasiveTraits {
                competition_factor: 2.0,
                adaptation_rate: 0.1,
                resource_consumption: 1.5,
                adaptation_discount: 0.2,
            }),
        }
    }

    /// Built-in parameters for `species`.
    #[must_use]
    pub fn defaults_for(species: Species) -> Self {
        match species {
            Species::Predator => Self::predator(),
            Species::Prey => Self::prey(),
            Species::Invasive => Self::invasive(),
        }
    }

    /// Returns the species these attributes describe.
    #[must_use]
    pub const fn species(&self) -> Species {
        self.traits.species()
    }

    /// Predator traits, when these attributes describe a predator.
    #[must_use]
    pub const fn predator_traits(&self) -> Option<&PredatorTraits> {
        match &self.traits {
            SpeciesTraits::Predator(traits) => Some(traits),
            _ => None,
        }
    }

    /// Prey traits, when these attributes describe prey.
    #[must_use]
    pub const fn prey_traits(&self) -> Option<&PreyTraits> {
        match &self.traits {
            SpeciesTraits::Prey(traits) => Some(traits),
            _ => None,
        }
    }

    /// Invasive traits, when these attributes describe an invasive species.
    #[must_use]
    pub const fn invasive_traits(&self) -> Option<&InvasiveTraits> {
        match &self.traits {
            SpeciesTraits::Invasive(traits) => Some(traits),
            _ => None,
        }
    }

    fn adaptation_discount(&self, adaptation: f64) -> f64 {
        match &self.traits {
            SpeciesTraits::Invasive(traits) => traits.adaptation_discount * adaptation,
            _ => 0.0,
        }
    }

    /// Energy fraction required to reproduce at the given adaptation level.
    #[must_use]
    pub fn energy_threshold(&self, adaptation: f64) -> f64 {
        (self.reproduction_energy_threshold - self.adaptation_discount(adaptation)).max(0.0)
    }

    /// Energy fraction spent per reproduction at the given adaptation level.
    #[must_use]
    pub fn reproduction_cost_fraction(&self, adaptation: f64) -> f64 {
        (self.reproduction_cost * (1.0 - self.adaptation_discount(adaptation))).clamp(0.0, 1.0)
    }

    /// Validates every field, failing on the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("max_energy", self.max_energy)?;
        positive("energy_consumption", self.energy_consumption)?;
        positive("speed", self.speed)?;
        positive("interaction_range", self.interaction_range)?;
        positive("maturity_age", self.maturity_age)?;
        positive("breeding_cycle", self.breeding_cycle)?;
        if self.min_offspring == 0 {
            return Err(ConfigError::InvalidConfig("min_offspring must be at least 1"));
        }
        if self.min_offspring > self.max_offspring {
            return Err(ConfigError::InvalidConfig(
                "min_offspring cannot exceed max_offspring",
            ));
        }
        fraction(
            "reproduction_energy_threshold",
            self.reproduction_energy_threshold,
        )?;
        within(
            "reproduction_health_floor",
            self.reproduction_health_floor,
            0.0,
            100.0,
        )?;
        fraction("reproduction_cost", self.reproduction_cost)?;
        fraction("offspring_energy", self.offspring_energy)?;
        if self.offspring_energy <= 0.0 {
            return Err(ConfigError::InvalidConfig("offspring_energy must be positive"));
        }

        match &self.traits {
            SpeciesTraits::Predator(traits) => {
                positive("hunting_range", traits.hunting_range)?;
                positive("attack_strength", traits.attack_strength)?;
                fraction("digest_efficiency", traits.digest_efficiency)?;
            }
            SpeciesTraits::Prey(traits) => {
                positive("flee_range", traits.flee_range)?;
                positive("foraging_efficiency", traits.foraging_efficiency)?;
                positive("perception_range", traits.perception_range)?;
            }
            SpeciesTraits::Invasive(traits) => {
                positive("competition_factor", traits.competition_factor)?;
                within("adaptation_rate", traits.adaptation_rate, 0.0, f64::MAX)?;
                positive("resource_consumption", traits.resource_consumption)?;
                fraction("adaptation_discount", traits.adaptation_discount)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

pub(crate) fn within(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

pub(crate) fn fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    within(name, value, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        for species in Species::ALL {
            let attrs = SpeciesAttributes::defaults_for(species);
            attrs.validate().expect("defaults are valid");
            assert_eq!(attrs.species(), species);
        }
    }

    #[test]
    fn non_positive_fields_are_rejected() {
        let mut attrs = SpeciesAttributes::prey();
        attrs.speed = 0.0;
        assert_eq!(
            attrs.validate(),
            Err(ConfigError::NotPositive {
                name: "speed",
                value: 0.0
            })
        );
    }

    #[test]
    fn offspring_bounds_must_be_ordered() {
        let mut attrs = SpeciesAttributes::predator();
        attrs.min_offspring = 9;
        assert!(matches!(
            attrs.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn fractions_outside_unit_interval_are_rejected() {
        let mut attrs = SpeciesAttributes::predator();
        attrs.traits = SpeciesTraits::Predator(PredatorTraits {
            hunting_range: 75.0,
            attack_strength: 25.0,
            digest_efficiency: 1.5,
        });
        assert!(matches!(
            attrs.validate(),
            Err(ConfigError::OutOfRange {
                name: "digest_efficiency",
                ..
            })
        ));
    }

    #[test]
    fn adaptation_lowers_invasive_threshold_and_cost() {
        let attrs = SpeciesAttributes::invasive();
        assert!((attrs.energy_threshold(0.0) - 0.6).abs() < 1e-12);
        assert!((attrs.energy_threshold(1.0) - 0.4).abs() < 1e-12);
        assert!((attrs.reproduction_cost_fraction(1.0) - 0.24).abs() < 1e-12);

        let prey = SpeciesAttributes::prey();
        assert_eq!(prey.energy_threshold(1.0), prey.reproduction_energy_threshold);
    }

    #[test]
    fn attributes_roundtrip_through_json() {
        let attrs = SpeciesAttributes::invasive();
        let json = serde_json::to_string(&attrs).expect("serialize");
        let back: SpeciesAttributes = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, attrs);
    }
}
