use crate::agent::{Agent, Gender};
use crate::attributes::Species;
use crate::season::Season;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::VecDeque;

/// Aggregate snapshot of the population, computed fresh on every call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldStatistics {
    pub time: f64,
    pub predator_count: usize,
    pub prey_count: usize,
    pub invasive_count: usize,
    /// Live agents across all species.
    pub total_entities: usize,
    /// Agents still stored but no longer alive.
    pub dead_count: usize,
    pub male_count: usize,
    pub female_count: usize,
    pub mature_count: usize,
    pub immature_count: usize,
    pub avg_health: f64,
    pub avg_energy: f64,
    pub season: Season,
}

/// Named scalar sample derived from statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: Cow<'static, str>,
    pub value: f64,
}

impl MetricSample {
    /// Creates a named metric sample.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    fn from_count(name: &'static str, count: usize) -> Self {
        Self::new(name, count as f64)
    }
}

impl WorldStatistics {
    /// Aggregate over `agents`; dead agents only contribute to `dead_count`.
    pub fn from_agents<'a>(
        time: f64,
        season: Season,
        agents: impl IntoIterator<Item = &'a Agent>,
    ) -> Self {
        let mut stats = WorldStatistics {
            time,
            season,
            ..WorldStatistics::default()
        };
        let mut health_sum = 0.0;
        let mut energy_sum = 0.0;
        for agent in agents {
            if !agent.is_alive() {
                stats.dead_count += 1;
                continue;
            }
            stats.total_entities += 1;
            match agent.species() {
                Species::Predator => stats.predator_count += 1,
                Species::Prey => stats.prey_count += 1,
                Species::Invasive => stats.invasive_count += 1,
            }
            match agent.gender() {
                Gender::Male => stats.male_count += 1,
                Gender::Female => stats.female_count += 1,
            }
            if agent.is_mature() {
                stats.mature_count += 1;
            } else {
                stats.immature_count += 1;
            }
            health_sum += agent.health();
            energy_sum += agent.energy();
        }
        if stats.total_entities > 0 {
            let live = stats.total_entities as f64;
            stats.avg_health = health_sum / live;
            stats.avg_energy = energy_sum / live;
        }
        stats
    }

    /// Live population of `species`.
    #[must_use]
    pub const fn count(&self, species: Species) -> usize {
        match species {
            Species::Predator => self.predator_count,
            Species::Prey => self.prey_count,
            Species::Invasive => self.invasive_count,
        }
    }

    /// Metric samples in stable key order; the season is reported by ordinal.
    #[must_use]
    pub fn samples(&self) -> Vec<MetricSample> {
        vec![
            MetricSample::new("time", self.time),
            MetricSample::from_count("predator_count", self.predator_count),
            MetricSample::from_count("prey_count", self.prey_count),
            MetricSample::from_count("invasive_count", self.invasive_count),
            MetricSample::from_count("total_entities", self.total_entities),
            MetricSample::from_count("dead_count", self.dead_count),
            MetricSample::from_count("male_count", self.male_count),
            MetricSample::from_count("female_count", self.female_count),
            MetricSample::from_count("mature_count", self.mature_count),
            MetricSample::from_count("immature_count", self.immature_count),
            MetricSample::new("avg_health", self.avg_health),
            MetricSample::new("avg_energy", self.avg_energy),
            MetricSample::new("season", f64::from(self.season.ordinal())),
        ]
    }
}

/// Receives `(time, statistics)` pairs from the simulation driver.
pub trait StatisticsSink: Send {
    fn record(&mut self, time: f64, stats: &WorldStatistics);

    /// Drop anything recorded so far.
    fn clear(&mut self) {}
}

/// Sink that discards every sample.
#[derive(Debug, Default)]
pub struct NullSink;

impl StatisticsSink for NullSink {
    fn record(&mut self, _time: f64, _stats: &WorldStatistics) {}
}

/// Trend of one series across the retained history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationTrend {
    pub initial: f64,
    #[serde(rename = "final")]
    pub last: f64,
    pub max: f64,
    pub min: f64,
    pub average: f64,
    /// Relative change from first to last sample; `None` when starting from zero.
    pub growth_rate: Option<f64>,
}

impl PopulationTrend {
    fn from_series(series: &[f64]) -> Option<Self> {
        let (&initial, &last) = (series.first()?, series.last()?);
        let max = series.iter().copied().fold(f64::MIN, f64::max);
        let min = series.iter().copied().fold(f64::MAX, f64::min);
        let average = series.iter().sum::<f64>() / series.len() as f64;
        let growth_rate = (initial > 0.0).then(|| (last - initial) / initial);
        Some(Self {
            initial,
            last,
            max,
            min,
            average,
            growth_rate,
        })
    }
}

/// Per-species trends plus the predator/prey balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopulationSummary {
    pub samples: usize,
    pub predator: PopulationTrend,
    pub prey: PopulationTrend,
    pub invasive: PopulationTrend,
    /// Predators per prey, with an empty prey population counted as one.
    pub predator_prey_ratio: PopulationTrend,
}

/// In-memory sink with a bounded history.
#[derive(Debug, Clone)]
pub struct MemoryCollector {
    capacity: usize,
    history: VecDeque<(f64, WorldStatistics)>,
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MemoryCollector {
    /// Retain at most `capacity` samples (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity.min(1_024)),
        }
    }

    /// Maximum number of snapshots retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of snapshots currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Returns the most recent snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&WorldStatistics> {
        self.history.back().map(|(_, stats)| stats)
    }

    /// Iterate retained samples oldest first.
    pub fn history(&self) -> impl Iterator<Item = &(f64, WorldStatistics)> {
        self.history.iter()
    }

    /// Summarise the retained history; `None` when nothing was recorded.
    #[must_use]
    pub fn population_summary(&self) -> Option<PopulationSummary> {
        let series = |species: Species| -> Vec<f64> {
            self.history
                .iter()
                .map(|(_, stats)| stats.count(species) as f64)
                .collect()
        };
        let ratio: Vec<f64> = self
            .history
            .iter()
            .map(|(_, stats)| stats.predator_count as f64 / stats.prey_count.max(1) as f64)
            .collect();
        Some(PopulationSummary {
            samples: self.history.len(),
            predator: PopulationTrend::from_series(&series(Species::Predator))?,
            prey: PopulationTrend::from_series(&series(Species::Prey))?,
            invasive: PopulationTrend::from_series(&series(Species::Invasive))?,
            predator_prey_ratio: PopulationTrend::from_series(&ratio)?,
        })
    }
}

impl StatisticsSink for MemoryCollector {
    fn record(&mut self, time: f64, stats: &WorldStatistics) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((time, stats.clone()));
    }

    fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::SpeciesAttributes;
    use crate::behavior::BehaviorStrategy;
    use crate::geometry::Position;
    use std::sync::Arc;

    fn agent(species: Species, gender: Gender, age: f64) -> Agent {
        let attrs = Arc::new(SpeciesAttributes::defaults_for(species));
        let max = attrs.max_energy;
        Agent::new(attrs, Position::default(), gender, BehaviorStrategy::Rules)
            .with_vitals(max / 2.0, 80.0, age)
    }

    fn stats_with(predators: usize, prey: usize) -> WorldStatistics {
        WorldStatistics {
            predator_count: predators,
            prey_count: prey,
            ..WorldStatistics::default()
        }
    }

    #[test]
    fn aggregates_live_agents_only() {
        let mut dead = agent(Species::Prey, Gender::Male, 0.0);
        dead.set_health(0.0);
        let agents = vec![
            agent(Species::Predator, Gender::Male, 1_000.0),
            agent(Species::Prey, Gender::Female, 10.0),
            agent(Species::Invasive, Gender::Female, 200.0),
            dead,
        ];
        let stats = WorldStatistics::from_agents(4.0, Season::Fall, &agents);
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.dead_count, 1);
        assert_eq!(
            (stats.predator_count, stats.prey_count, stats.invasive_count),
            (1, 1, 1)
        );
        assert_eq!((stats.male_count, stats.female_count), (1, 2));
        assert_eq!((stats.mature_count, stats.immature_count), (2, 1));
        assert!((stats.avg_health - 80.0).abs() < 1e-9);
        assert!((stats.avg_energy - (500.0 + 250.0 + 400.0) / 3.0).abs() < 1e-9);
        assert_eq!(stats.season, Season::Fall);
    }

    #[test]
    fn empty_population_reports_zero_averages() {
        let stats = WorldStatistics::from_agents(0.0, Season::Spring, std::iter::empty());
        assert_eq!(stats.total_entities, 0);
        assert_eq!(stats.avg_health, 0.0);
        assert_eq!(stats.avg_energy, 0.0);
    }

    #[test]
    fn sample_keys_are_stable() {
        let names: Vec<_> = WorldStatistics::default()
            .samples()
            .into_iter()
            .map(|sample| sample.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "time",
                "predator_count",
                "prey_count",
                "invasive_count",
                "total_entities",
                "dead_count",
                "male_count",
                "female_count",
                "mature_count",
                "immature_count",
                "avg_health",
                "avg_energy",
                "season",
            ]
        );
    }

    #[test]
    fn collector_is_bounded() {
        let mut collector = MemoryCollector::new(3);
        for t in 0..5 {
            collector.record(f64::from(t), &stats_with(t as usize, 1));
        }
        assert_eq!(collector.len(), 3);
        let times: Vec<f64> = collector.history().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
        assert_eq!(collector.latest().map(|s| s.predator_count), Some(4));
        collector.clear();
        assert!(collector.is_empty());
        assert!(collector.population_summary().is_none());
    }

    #[test]
    fn summary_tracks_peaks_and_growth() {
        let mut collector = MemoryCollector::default();
        collector.record(0.0, &stats_with(2, 10));
        collector.record(1.0, &stats_with(5, 0));
        collector.record(2.0, &stats_with(3, 20));
        let summary = collector.population_summary().expect("summary");
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.predator.max, 5.0);
        assert_eq!(summary.predator.min, 2.0);
        assert_eq!(summary.prey.growth_rate, Some(1.0));
        assert_eq!(summary.invasive.growth_rate, None);
        assert_eq!(summary.predator_prey_ratio.max, 5.0);
    }
}
