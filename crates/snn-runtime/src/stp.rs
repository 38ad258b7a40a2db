//! Short-term plasticity ring buffer: per-neuron `u` (release probability)
//! and `x` (resource) state over a `(max_delay+1)`-slot rolling window.

use crate::config::StpParams;

/// `stpu`/`stpx` storage for every STP-enabled neuron, indexed
/// `[t_slot * pitch + n]` with `t_slot = simTime mod (max_delay+1)`.
#[derive(Debug, Clone)]
pub struct StpBuffers {
    pitch: usize,
    slots: usize,
    u: Vec<f32>,
    x: Vec<f32>,
}

impl StpBuffers {
    /// Allocate buffers for `num_neurons` neurons over `max_delay+1` slots.
    /// `x` starts at 1.0 (fully-recovered resource pool) in every slot;
    /// `u` starts at 0.0.
    pub fn new(num_neurons: usize, max_delay: u32) -> Self {
        let slots = max_delay as usize + 1;
        Self {
            pitch: num_neurons,
            slots,
            u: vec![0.0; num_neurons * slots],
            x: vec![1.0; num_neurons * slots],
        }
    }

    #[inline]
    fn index(&self, slot: usize, neuron: usize) -> usize {
        slot * self.pitch + neuron
    }

    /// `t_slot = sim_time mod (max_delay+1)`.
    pub fn slot_for(&self, sim_time: u32) -> usize {
        sim_time as usize % self.slots
    }

    /// `STP_AND_DECAY`'s per-tick ring-buffer advance, run before
    /// `FIND_FIRING` for every neuron in an STP-enabled group.
    pub fn decay_step(&mut self, neuron: usize, sim_time: u32, params: &StpParams) {
        let plus = self.slot_for(sim_time);
        let minus = self.slot_for(sim_time.wrapping_sub(1));
        let u_minus = self.u[self.index(minus, neuron)];
        let x_minus = self.x[self.index(minus, neuron)];

        let plus_idx = self.index(plus, neuron);
        self.u[plus_idx] = u_minus * (1.0 - params.tau_u_inv);
        self.x[plus_idx] = x_minus + (1.0 - x_minus) * params.tau_x_inv;
    }

    /// `FIND_FIRING`'s on-spike augmentation: applied immediately after
    /// `decay_step` for a neuron that fires this tick.
    pub fn on_spike(&mut self, neuron: usize, sim_time: u32, params: &StpParams) {
        let plus = self.slot_for(sim_time);
        let minus = self.slot_for(sim_time.wrapping_sub(1));
        let plus_idx = self.index(plus, neuron);
        let u_minus = self.u[self.index(minus, neuron)];

        self.u[plus_idx] += params.stp_u * (1.0 - u_minus);
        let u_plus = self.u[plus_idx];
        let x_minus = self.x[self.index(minus, neuron)];
        self.x[plus_idx] -= u_plus * x_minus;
    }

    /// `u` value at the given absolute tick slot for a neuron (used by
    /// `CONDUCTANCE_UPDATE`'s STP scaling: `stpu[(simTime-tD) mod …]`).
    pub fn u_at(&self, neuron: usize, sim_time: u32) -> f32 {
        self.u[self.index(self.slot_for(sim_time), neuron)]
    }

    /// `x` value at the given absolute tick slot for a neuron
    /// (`stpx[(simTime-1-tD) mod …]`).
    pub fn x_at(&self, neuron: usize, sim_time: u32) -> f32 {
        self.x[self.index(self.slot_for(sim_time), neuron)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StpParams {
        StpParams::new(0.2, 1.0, 0.05, 0.02).unwrap()
    }

    #[test]
    fn test_initial_state() {
        let buf = StpBuffers::new(4, 3);
        assert_eq!(buf.u_at(0, 0), 0.0);
        assert_eq!(buf.x_at(0, 0), 1.0);
    }

    #[test]
    fn test_decay_without_spikes_moves_toward_steady_state() {
        let p = params();
        let mut buf = StpBuffers::new(1, 3);
        // seed slot 0 with nonzero u to observe decay
        buf.u[0] = 0.5;
        for t in 1..20u32 {
            buf.decay_step(0, t, &p);
        }
        // u should be decaying toward 0, x toward 1.
        assert!(buf.u_at(0, 19) < 0.5);
        assert!(buf.x_at(0, 19) <= 1.0 + 1e-6);
    }

    #[test]
    fn test_on_spike_augments_u_and_depresses_x() {
        let p = params();
        let mut buf = StpBuffers::new(1, 3);
        buf.decay_step(0, 1, &p);
        let u_before = buf.u_at(0, 1);
        let x_before = buf.x_at(0, 1);
        buf.on_spike(0, 1, &p);
        assert!(buf.u_at(0, 1) > u_before);
        assert!(buf.x_at(0, 1) < x_before);
    }
}
