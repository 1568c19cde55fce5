use crate::attributes::{Species, SpeciesAttributes, positive};
use crate::behavior::BehaviorStrategy;
use crate::clock::MIN_TIME_SCALE;
use crate::error::ConfigError;
use crate::season::DEFAULT_SEASON_DURATION;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Per-species parameter sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeciesTable {
    pub predator: SpeciesAttributes,
    pub prey: SpeciesAttributes,
    pub invasive: SpeciesAttributes,
}

impl Default for SpeciesTable {
    fn default() -> Self {
        Self {
            predator: SpeciesAttributes::predator(),
            prey: SpeciesAttributes::prey(),
            invasive: SpeciesAttributes::invasive(),
        }
    }
}

impl SpeciesTable {
    /// Returns the attributes configured for `species`.
    #[must_use]
    pub fn get(&self, species: Species) -> &SpeciesAttributes {
        match species {
            Species::Predator => &self.predator,
            Species::Prey => &self.prey,
            Species::Invasive => &self.invasive,
        }
    }

    /// Shared handles, one per species, for agents to reference.
    #[must_use]
    pub fn shared(&self) -> SharedAttributes {
        SharedAttributes {
            predator: Arc::new(self.predator.clone()),
            prey: Arc::new(self.prey.clone()),
            invasive: Arc::new(self.invasive.clone()),
        }
    }
}

/// Reference-counted attribute sets shared by every agent of a species.
#[derive(Debug, Clone)]
pub struct SharedAttributes {
    predator: Arc<SpeciesAttributes>,
    prey: Arc<SpeciesAttributes>,
    invasive: Arc<SpeciesAttributes>,
}

impl SharedAttributes {
    /// Returns the shared attributes for `species`.
    #[must_use]
    pub fn get(&self, species: Species) -> &Arc<SpeciesAttributes> {
        match species {
            Species::Predator => &self.predator,
            Species::Prey => &self.prey,
            Species::Invasive => &self.invasive,
        }
    }
}

/// Static configuration for an ecosystem run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EcosystemConfig {
    /// Width of the world in world units.
    pub world_width: f64,
    /// Height of the world in world units.
    pub world_height: f64,
    /// Edge length of one spatial index cell.
    pub cell_size: f64,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    pub initial_predators: usize,
    pub initial_prey: usize,
    pub initial_invasive: usize,
    /// Decision strategy assigned to every agent at construction.
    pub strategy: BehaviorStrategy,
    /// Simulated seconds per real second.
    pub time_scale: f64,
    /// Length of one season in simulated seconds.
    pub season_duration: f64,
    /// Simulated time between statistics samples.
    pub data_collection_interval: f64,
    /// Number of statistics samples retained in memory.
    pub history_capacity: usize,
    pub species: SpeciesTable,
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            world_width: 1_000.0,
            world_height: 800.0,
            cell_size: 50.0,
            rng_seed: None,
            initial_predators: 10,
            initial_prey: 50,
            initial_invasive: 0,
            strategy: BehaviorStrategy::Rules,
            time_scale: 1.0,
            season_duration: DEFAULT_SEASON_DURATION,
            data_collection_interval: 1.0,
            history_capacity: 10_000,
            species: SpeciesTable::default(),
        }
    }
}

impl EcosystemConfig {
    /// Check every parameter; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("world_width", self.world_width)?;
        positive("world_height", self.world_height)?;
        positive("cell_size", self.cell_size)?;
        positive("season_duration", self.season_duration)?;
        positive("data_collection_interval", self.data_collection_interval)?;
        if !(self.time_scale.is_finite() && self.time_scale >= MIN_TIME_SCALE) {
            return Err(ConfigError::OutOfRange {
                name: "time_scale",
                value: self.time_scale,
                min: MIN_TIME_SCALE,
                max: f64::MAX,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidConfig("history_capacity must be positive"));
        }
        for species in Species::ALL {
            let attrs = self.species.get(species);
            if attrs.species() != species {
                return Err(ConfigError::InvalidConfig(
                    "species table entry carries traits of another species",
                ));
            }
            attrs.validate()?;
        }
        Ok(())
    }

    /// Returns the configured RNG, drawing and logging a seed from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        let seed = self.rng_seed.unwrap_or_else(|| {
            let seed: u64 = rand::random();
            info!(seed, "no rng seed configured; drew one from entropy");
            seed
        });
        SmallRng::seed_from_u64(seed)
    }

    /// Initial population for `species`.
    #[must_use]
    pub const fn initial_count(&self, species: Species) -> usize {
        match species {
            Species::Predator => self.initial_predators,
            Species::Prey => self.initial_prey,
            Species::Invasive => self.initial_invasive,
        }
    }
}
