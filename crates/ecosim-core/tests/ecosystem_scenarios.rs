use ecosim_core::reproduction::reproduce;
use ecosim_core::{
    Agent, BehaviorStrategy, EcosystemConfig, Gender, NullSink, Position, Season, Simulation,
    SimulationEvent, Species, SpeciesAttributes, World,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;

fn world(seed: u64) -> World {
    World::new(1_000.0, 800.0, 50.0, SmallRng::seed_from_u64(seed)).expect("world")
}

fn agent(species: Species, x: f64, y: f64, gender: Gender) -> Agent {
    Agent::new(
        Arc::new(SpeciesAttributes::defaults_for(species)),
        Position::new(x, y),
        gender,
        BehaviorStrategy::Rules,
    )
}

#[test]
fn predator_closes_in_on_adjacent_prey() {
    let target = Position::new(10.0, 10.0);
    for seed in 0..32 {
        let mut world = world(seed);
        let predator = world
            .add_entity(agent(Species::Predator, 0.0, 0.0, Gender::Male))
            .expect("predator");
        let prey = world
            .add_entity(agent(Species::Prey, target.x, target.y, Gender::Female))
            .expect("prey");

        let report = world.update(0.1).expect("tick");

        let hunter = world.agent(predator).expect("predator survives");
        assert!(hunter.position().distance(&target) < Position::new(0.0, 0.0).distance(&target));
        let cooldown = hunter.hunting_cooldown().expect("predator cooldown");
        assert!(cooldown == 0.0 || cooldown == 5.0, "cooldown {cooldown}");

        let prey_alive = world.agent(prey).is_some_and(Agent::is_alive);
        assert_eq!(prey_alive, report.deaths == 0);
        assert_eq!(world.index().len(), world.agent_count());
    }
}

#[test]
fn prey_only_world_never_gains_predators() {
    let config = EcosystemConfig {
        rng_seed: Some(2024),
        initial_predators: 0,
        initial_prey: 100,
        ..EcosystemConfig::default()
    };
    let mut sim = Simulation::with_history(config).expect("simulation");
    sim.initialize(0, 100, 0).expect("initialize");

    let mut extinction_events = 0;
    for _ in 0..200 {
        let outcome = sim.step(1.0).expect("step");
        extinction_events += outcome
            .events
            .iter()
            .filter(|event| **event == SimulationEvent::Extinction(Species::Predator))
            .count();
        assert_eq!(sim.statistics().predator_count, 0);
    }
    assert_eq!(extinction_events, 1);
    assert!(sim.sink().history().all(|(_, stats)| stats.predator_count == 0));
    assert!(sim.statistics().prey_count > 0);
}

#[test]
fn eligible_prey_pair_produces_a_bounded_litter() {
    for season in [Season::Spring, Season::Summer] {
        let mut world = world(5);
        world.set_current_season(season);
        let attrs = SpeciesAttributes::prey();
        let ready = |x: f64, gender: Gender| {
            agent(Species::Prey, x, 200.0, gender)
                .with_vitals(0.9 * attrs.max_energy, 90.0, attrs.maturity_age + 10.0)
                .with_time_since_reproduction(attrs.breeding_cycle)
        };
        let a = world.add_entity(ready(200.0, Gender::Male)).expect("a");
        let b = world.add_entity(ready(210.0, Gender::Female)).expect("b");
        let live_before = world.statistics().total_entities;

        let offspring = reproduce(&mut world, a, b).expect("reproduce");

        let count = u32::try_from(offspring.len()).expect("litter size");
        assert!((attrs.min_offspring..=attrs.max_offspring).contains(&count));
        assert_eq!(world.statistics().total_entities, live_before + offspring.len());
        assert!(offspring.iter().all(|id| world.agent(*id).is_some()));
    }
}

#[test]
fn invasive_introduction_registers_with_index() {
    let config = EcosystemConfig {
        rng_seed: Some(8),
        ..EcosystemConfig::default()
    };
    let mut sim = Simulation::new(config, NullSink).expect("simulation");
    sim.initialize(5, 20, 0).expect("initialize");
    sim.step(1.0).expect("step");
    let added = sim.introduce_invasive_species(10).expect("introduce");
    for id in &added {
        let agent = sim.world().agent(*id).expect("registered");
        assert_eq!(agent.species(), Species::Invasive);
        let cell = sim.world().index().cell_of(agent.position().as_tuple());
        assert_eq!(sim.world().index().cell_of_key(*id), Some(cell));
    }
    assert_eq!(sim.world().index().len(), sim.world().agent_count());
}
