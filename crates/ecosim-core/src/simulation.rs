//! The simulation driver: clock, seasons, events, and statistics collection around a [`World`].

use crate::agent::{Agent, Gender};
use crate::arena::AgentId;
use crate::attributes::Species;
use crate::clock::SimulationClock;
use crate::config::{EcosystemConfig, SharedAttributes};
use crate::error::{SimulationError, WorldError};
use crate::geometry::Position;
use crate::season::{Season, SeasonTracker};
use crate::stats::{MemoryCollector, StatisticsSink, WorldStatistics};
use crate::world::{TickReport, World};
use rand::Rng;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Something noteworthy that happened during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationEvent {
    SeasonChanged { from: Season, to: Season },
    /// A native population dropped to zero.
    Extinction(Species),
    InvasionIntroduced { count: usize },
}

/// Result of one [`Simulation::step`].
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Simulated seconds covered by the step.
    pub sim_delta: f64,
    /// World tick report; `None` when no simulated time elapsed.
    pub tick: Option<TickReport>,
    /// Events processed during the step, in order.
    pub events: Vec<SimulationEvent>,
    /// Whether a statistics sample was recorded.
    pub sampled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InitialCounts {
    predators: usize,
    prey: usize,
    invasive: usize,
}

/// Drives a [`World`] in real time and feeds statistics to a sink.
#[derive(Debug)]
pub struct Simulation<S: StatisticsSink = MemoryCollector> {
    config: EcosystemConfig,
    attributes: SharedAttributes,
    world: World,
    clock: SimulationClock,
    seasons: SeasonTracker,
    sink: S,
    events: VecDeque<SimulationEvent>,
    predators_extinct: bool,
    prey_extinct: bool,
    last_collection: f64,
    initial: InitialCounts,
}

impl Simulation<MemoryCollector> {
    /// Simulation with an in-memory collector sized from the config.
    pub fn with_history(config: EcosystemConfig) -> Result<Self, SimulationError> {
        let sink = MemoryCollector::new(config.history_capacity);
        Self::new(config, sink)
    }
}

impl<S: StatisticsSink> Simulation<S> {
    /// Validate `config` and build an empty, stopped simulation.
    pub fn new(config: EcosystemConfig, sink: S) -> Result<Self, SimulationError> {
        config.validate()?;
        let world = World::new(
            config.world_width,
            config.world_height,
            config.cell_size,
            config.seeded_rng(),
        )?;
        let clock = SimulationClock::new(config.time_scale)?;
        Ok(Self {
            attributes: config.species.shared(),
            seasons: SeasonTracker::new(config.season_duration),
            initial: InitialCounts {
                predators: config.initial_predators,
                prey: config.initial_prey,
                invasive: config.initial_invasive,
            },
            config,
            world,
            clock,
            sink,
            events: VecDeque::new(),
            predators_extinct: false,
            prey_extinct: false,
            last_collection: 0.0,
        })
    }

    /// Returns the validated configuration.
    #[must_use]
    pub fn config(&self) -> &EcosystemConfig {
        &self.config
    }

    /// Returns the world being simulated.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the world, for seeding scenarios.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Returns the simulation clock.
    #[must_use]
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SimulationClock {
        &mut self.clock
    }

    /// Returns the statistics sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the season in effect.
    #[must_use]
    pub const fn current_season(&self) -> Season {
        self.seasons.current()
    }

    /// Aggregate statistics for the current population.
    #[must_use]
    pub fn statistics(&self) -> WorldStatistics {
        self.world.statistics()
    }

    /// Returns true while the clock is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Stop advancing time; returns false when already paused.
    pub fn pause(&mut self) -> bool {
        self.clock.stop()
    }

    /// Resume after [`pause`](Self::pause); returns false when already running.
    pub fn resume(&mut self) -> bool {
        self.clock.start()
    }

    /// Clear everything and populate a fresh world, then start the clock.
    pub fn initialize(
        &mut self,
        predators: usize,
        prey: usize,
        invasive: usize,
    ) -> Result<(), SimulationError> {
        self.world.clear();
        self.clock.reset();
        self.sink.clear();
        self.seasons.reset();
        self.world.set_current_season(self.seasons.current());
        self.events.clear();
        self.predators_extinct = false;
        self.prey_extinct = false;
        self.last_collection = 0.0;
        self.initial = InitialCounts {
            predators,
            prey,
            invasive,
        };

        self.spawn(Species::Predator, predators)?;
        self.spawn(Species::Prey, prey)?;
        self.spawn(Species::Invasive, invasive)?;
        self.clock.start();
        self.collect();
        info!(predators, prey, invasive, "simulation initialized");
        Ok(())
    }

    /// Re-run [`initialize`](Self::initialize) with the last population counts.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        let InitialCounts {
            predators,
            prey,
            invasive,
        } = self.initial;
        self.initialize(predators, prey, invasive)
    }

    /// Add `count` invasive agents at random positions.
    pub fn introduce_invasive_species(
        &mut self,
        count: usize,
    ) -> Result<Vec<AgentId>, SimulationError> {
        let added = self.spawn(Species::Invasive, count)?;
        self.events
            .push_back(SimulationEvent::InvasionIntroduced { count: added.len() });
        Ok(added)
    }

    /// Advance by `real_delta` wall-clock seconds.
    pub fn step(&mut self, real_delta: f64) -> Result<StepOutcome, SimulationError> {
        let sim_delta = self.clock.tick(real_delta)?;
        let tick = if sim_delta > 0.0 {
            Some(self.world.update(sim_delta)?)
        } else {
            None
        };

        if let Some(to) = self.seasons.update(self.world.current_time()) {
            let from = self.world.current_season();
            self.events
                .push_back(SimulationEvent::SeasonChanged { from, to });
        }
        self.check_populations();
        let events = self.process_events();

        let sampled = self.world.current_time() - self.last_collection
            >= self.config.data_collection_interval;
        if sampled {
            self.collect();
            self.last_collection = self.world.current_time();
        }
        Ok(StepOutcome {
            sim_delta,
            tick,
            events,
            sampled,
        })
    }

    fn spawn(&mut self, species: Species, count: usize) -> Result<Vec<AgentId>, WorldError> {
        let attributes = self.attributes.get(species).clone();
        let (width, height) = (self.world.width(), self.world.height());
        let strategy = self.config.strategy;
        let mut added = Vec::with_capacity(count);
        for _ in 0..count {
            let rng = self.world.rng();
            let position =
                Position::new(rng.random_range(0.0..width), rng.random_range(0.0..height));
            let gender = Gender::random(rng);
            let agent = Agent::new(attributes.clone(), position, gender, strategy);
            added.push(self.world.add_entity(agent)?);
        }
        Ok(added)
    }

    fn check_populations(&mut self) {
        let stats = self.world.statistics();
        for (species, extinct) in [
            (Species::Predator, &mut self.predators_extinct),
            (Species::Prey, &mut self.prey_extinct),
        ] {
            let empty = stats.count(species) == 0;
            if empty && !*extinct {
                self.events.push_back(SimulationEvent::Extinction(species));
            }
            *extinct = empty;
        }
    }

    fn process_events(&mut self) -> Vec<SimulationEvent> {
        let events: Vec<SimulationEvent> = self.events.drain(..).collect();
        for event in &events {
            match *event {
                SimulationEvent::SeasonChanged { from, to } => {
                    self.world.set_current_season(to);
                    info!(%from, %to, time = %self.clock.formatted_time(), "season changed");
                }
                SimulationEvent::Extinction(species) => {
                    warn!(%species, time = %self.clock.formatted_time(), "population extinct");
                }
                SimulationEvent::InvasionIntroduced { count } => {
                    info!(
                        count,
                        time = %self.clock.formatted_time(),
                        "invasive species introduced"
                    );
                }
            }
        }
        events
    }

    fn collect(&mut self) {
        let stats = self.world.statistics();
        self.sink.record(self.world.current_time(), &stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::SECONDS_PER_DAY;
    use crate::stats::NullSink;

    fn config() -> EcosystemConfig {
        EcosystemConfig {
            rng_seed: Some(17),
            ..EcosystemConfig::default()
        }
    }

    #[test]
    fn initialize_populates_and_samples() {
        let mut sim = Simulation::with_history(config()).expect("simulation");
        sim.initialize(3, 7, 2).expect("initialize");
        let stats = sim.statistics();
        assert_eq!(
            (stats.predator_count, stats.prey_count, stats.invasive_count),
            (3, 7, 2)
        );
        assert!(sim.is_running());
        assert_eq!(sim.sink().len(), 1);
        assert_eq!(sim.current_season(), Season::Spring);
        for (_, agent) in sim.world().entities() {
            assert!(sim.world().contains_position(&agent.position()));
        }
    }

    #[test]
    fn step_requires_initialization() {
        let mut sim = Simulation::new(config(), NullSink).expect("simulation");
        assert_eq!(sim.step(1.0), Err(SimulationError::ClockStopped));
        sim.initialize(0, 1, 0).expect("initialize");
        assert!(sim.pause());
        assert_eq!(sim.step(1.0), Err(SimulationError::ClockStopped));
        assert!(sim.resume());
        assert!(sim.step(1.0).is_ok());
    }

    #[test]
    fn zero_delta_skips_world_update() {
        let mut sim = Simulation::new(config(), NullSink).expect("simulation");
        sim.initialize(1, 1, 0).expect("initialize");
        let outcome = sim.step(0.0).expect("step");
        assert_eq!(outcome.sim_delta, 0.0);
        assert!(outcome.tick.is_none());
        assert_eq!(sim.world().current_time(), 0.0);
        assert!(matches!(sim.step(-1.0), Err(SimulationError::InvalidDelta(_))));
    }

    #[test]
    fn extinction_is_reported_once() {
        let mut sim = Simulation::new(config(), NullSink).expect("simulation");
        sim.initialize(0, 2, 0).expect("initialize");
        let first = sim.step(1.0).expect("step");
        assert!(first
            .events
            .contains(&SimulationEvent::Extinction(Species::Predator)));
        let second = sim.step(1.0).expect("step");
        assert!(!second
            .events
            .contains(&SimulationEvent::Extinction(Species::Predator)));
    }

    #[test]
    fn season_boundary_updates_world() {
        let config = EcosystemConfig {
            season_duration: 10.0,
            ..config()
        };
        let mut sim = Simulation::new(config, NullSink).expect("simulation");
        sim.initialize(0, 0, 0).expect("initialize");
        let outcome = sim.step(12.0).expect("step");
        assert!(outcome.events.contains(&SimulationEvent::SeasonChanged {
            from: Season::Spring,
            to: Season::Summer
        }));
        assert_eq!(sim.world().current_season(), Season::Summer);
        assert_eq!(sim.current_season(), Season::Summer);
    }

    #[test]
    fn statistics_follow_collection_interval() {
        let config = EcosystemConfig {
            data_collection_interval: 2.0,
            ..config()
        };
        let mut sim = Simulation::with_history(config).expect("simulation");
        sim.initialize(0, 0, 0).expect("initialize");
        let sampled: Vec<bool> = (0..4)
            .map(|_| sim.step(1.0).expect("step").sampled)
            .collect();
        assert_eq!(sampled, vec![false, true, false, true]);
        assert_eq!(sim.sink().len(), 3);
    }

    #[test]
    fn invasion_adds_agents_and_emits_event() {
        let mut sim = Simulation::new(config(), NullSink).expect("simulation");
        sim.initialize(0, 0, 0).expect("initialize");
        let added = sim.introduce_invasive_species(4).expect("introduce");
        assert_eq!(added.len(), 4);
        assert_eq!(sim.world().index().len(), 4);
        let outcome = sim.step(0.0).expect("step");
        assert!(outcome
            .events
            .contains(&SimulationEvent::InvasionIntroduced { count: 4 }));
    }

    #[test]
    fn reset_restores_initial_population() {
        let mut sim = Simulation::with_history(config()).expect("simulation");
        sim.initialize(2, 5, 0).expect("initialize");
        sim.introduce_invasive_species(3).expect("introduce");
        sim.step(1.0).expect("step");
        sim.reset().expect("reset");
        let stats = sim.statistics();
        assert_eq!(stats.invasive_count, 0);
        assert_eq!(stats.predator_count + stats.prey_count, 7);
        assert_eq!(sim.world().current_time(), 0.0);
        assert_eq!(sim.clock().current_time(), 0.0);
        assert_eq!(sim.sink().len(), 1);
    }

    #[test]
    fn default_season_lasts_ninety_days() {
        let sim = Simulation::new(config(), NullSink).expect("simulation");
        assert_eq!(sim.config().season_duration, 90.0 * SECONDS_PER_DAY);
    }
}
