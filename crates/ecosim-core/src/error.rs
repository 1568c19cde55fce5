use crate::AgentId;
use ecosim_index::IndexError;
use thiserror::Error;

/// Malformed configuration or constructor parameters. Fatal at setup time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A parameter that must be strictly positive and finite was not.
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    /// A numeric parameter fell outside its permitted range.
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failures scoped to a single agent's action. Recovered locally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EntityError {
    #[error("agent {0:?} is not present in the world")]
    UnknownAgent(AgentId),
    #[error("agent {partner:?} is not a valid partner for {agent:?}")]
    InvalidPartner { agent: AgentId, partner: AgentId },
    #[error("agent {target:?} is not a valid target for {agent:?}")]
    InvalidTarget { agent: AgentId, target: AgentId },
    #[error("agent {agent:?} cannot {action}")]
    UnsupportedAction {
        agent: AgentId,
        action: &'static str,
    },
    #[error("agent {0:?} is not ready to reproduce")]
    NotEligible(AgentId),
    #[error("agent {0:?} is no longer alive")]
    NotAlive(AgentId),
    #[error("agent {0:?} reached a non-finite state")]
    NonFiniteState(AgentId),
}

/// Structural failures of the world: index/list desynchronisation, bad tick input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorldError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent {0:?} is tracked by the agent list but not the spatial index")]
    Desync(AgentId),
    #[error("agent {0:?} is not present in the world")]
    UnknownAgent(AgentId),
    #[error("time delta must be positive and finite, got {0}")]
    InvalidTimeDelta(f64),
    #[error("agent update failed: {0}")]
    Entity(#[from] EntityError),
}

/// Failures raised by the simulation driver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("cannot tick a clock that is not running")]
    ClockStopped,
    #[error("real time delta must be non-negative and finite, got {0}")]
    InvalidDelta(f64),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
