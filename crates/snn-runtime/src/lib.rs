//! Per-tick simulation core for spiking neural networks: Izhikevich
//! regular neurons, Poisson spike generators, delayed synapses with
//! short-term and spike-timing-dependent plasticity, conductance- or
//! current-based current injection, homeostatic weight scaling, and
//! dopamine-modulated learning.
//!
//! This crate is the simulation engine only: network construction is
//! exposed through [`network::NetworkBuilder`], and driving ticks through
//! [`simulation::Simulation`]. Everything outside the per-tick kernels
//! (persistence, distributed execution, visualization) lives elsewhere.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(clippy::all)]

pub use snn_storage::{ConnectionId, GroupId, NeuronId, Result as StorageResult, Spike, StorageError, Time};

pub mod config;
pub mod error;
pub mod firing;
pub mod ispikes;
pub mod neuron;
pub mod network;
pub mod partition;
pub mod plasticity;
pub mod simulation;
pub mod stp;

pub use config::{
    group_type, ConductanceParams, GroupConfig, HomeostasisParams, IzhParams, NetworkConfig,
    StdpCurve, StdpParams, StdpSideParams, StdpType, StpParams,
};
pub use error::{Result, RuntimeError};
pub use firing::FiringTables;
pub use ispikes::IncomingSpikeGrid;
pub use network::{GroupBuilder, Network, NetworkBuilder, SynapseSpec, SynapticMatrix};
pub use neuron::{NeuronPool, PoissonPool, NO_SPIKE, V_MAX, V_MIN};
pub use partition::{build_load_balance, LoadBalanceChunk};
pub use simulation::{PoissonDrive, RunReport, Simulation, TickReport};
pub use stp::StpBuffers;

/// Runtime crate version for compatibility checking.
pub const RUNTIME_VERSION: u32 = 1;

/// Simulation tick resolution: every [`simulation::Simulation::tick`] call
/// advances the network by exactly one millisecond of simulated time.
pub const TICK_DURATION_MS: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_integration() {
        let cfg = NetworkConfig::default();
        let (builder, _) = NetworkBuilder::new(cfg).add_group(GroupBuilder::regular(3));
        let net = builder
            .connect(SynapseSpec {
                pre: 0,
                post: 1,
                weight: 1.0,
                max_syn_wt: 10.0,
                delay: 1,
                conn_id: ConnectionId::new(0),
            })
            .build()
            .unwrap();

        let mut sim = Simulation::new(net, Some(0)).unwrap();
        let report = sim.tick().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(sim.current_tick(), 1);
    }
}
