//! Core types for the predator, prey and invasive species ecosystem.
//!
//! A [`World`] owns every [`Agent`] together with a uniform-grid spatial
//! index; [`Simulation`] drives it with a clock, seasons, and a statistics
//! sink.

pub mod agent;
pub mod arena;
pub mod attributes;
pub mod behavior;
pub mod clock;
pub mod config;
pub mod error;
pub mod geometry;
pub mod interactions;
pub mod reproduction;
pub mod season;
pub mod simulation;
pub mod stats;
pub mod world;

pub use agent::{Agent, Gender, MAX_HEALTH, SpeciesState, Vitals};
pub use arena::{AgentArena, AgentId};
pub use attributes::{
    InvasiveTraits, PredatorTraits, PreyTraits, Species, SpeciesAttributes, SpeciesTraits,
};
pub use behavior::{Action, BehaviorStrategy};
pub use clock::SimulationClock;
pub use config::{EcosystemConfig, SharedAttributes, SpeciesTable};
pub use error::{ConfigError, EntityError, SimulationError, WorldError};
pub use geometry::Position;
pub use season::{Season, SeasonTracker};
pub use simulation::{Simulation, SimulationEvent, StepOutcome};
pub use stats::{
    MemoryCollector, MetricSample, NullSink, PopulationSummary, PopulationTrend, StatisticsSink,
    WorldStatistics,
};
pub use world::{TickReport, World};
