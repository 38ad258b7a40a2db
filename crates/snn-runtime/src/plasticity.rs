//! Spike-timing-dependent plasticity: curve evaluation, LTP (on fire),
//! LTD (on delivery), and the periodic `UPDATE_WEIGHTS` pass.

use crate::config::{HomeostasisParams, StdpCurve, StdpSideParams};

/// Evaluate one STDP side's curve for a given `dt = t_post - t_pre` (ms).
/// `dt` is always `>= 0` at the call sites in this crate (LTP evaluates at
/// fire time with `dt = simTime - synSpikeTime`, LTD with
/// `dt = simTime - lastSpikeTime[post]`), matching the spec's delivery
/// precondition `Δt ≥ 0`.
pub fn eval_curve(side: &StdpSideParams, dt: f32) -> f32 {
    match side.curve {
        StdpCurve::Exponential => {
            let scaled = dt.abs() * side.tau_inv;
            if scaled < 25.0 {
                side.alpha * (-scaled).exp()
            } else {
                0.0
            }
        }
        StdpCurve::TimingBased => {
            if dt < side.gamma {
                side.omega + side.kappa * (-dt * side.tau_inv).exp()
            } else {
                -(-dt * side.tau_inv).exp()
            }
        }
        StdpCurve::Pulse => {
            if dt < side.lambda {
                side.beta_ltp
            } else if dt < side.lambda + side.delta {
                -side.beta_ltd
            } else {
                0.0
            }
        }
    }
}

/// `FIND_FIRING`'s LTP step: for a just-fired post-neuron, accumulate a
/// potentiating increment into `wtChange[p]` for every plastic incoming
/// synapse `p` with `synSpikeTime[p] <= simTime`, using the firing neuron's
/// own group's excitatory or inhibitory curve (selected by the synapse's
/// sign) as appropriate.
pub fn ltp_increment(side: &StdpSideParams, sim_time: u32, syn_spike_time: u32) -> f32 {
    let dt = (sim_time as i64 - syn_spike_time as i64) as f32;
    eval_curve(side, dt)
}

/// Delivery-time LTD step: `Δt = simTime - lastSpikeTime[post]`; applied
/// only when `Δt >= 0` (a post-neuron that has never fired contributes no
/// LTD).
pub fn ltd_increment(side: &StdpSideParams, sim_time: u32, last_spike_time: i64) -> Option<f32> {
    if last_spike_time < 0 {
        return None;
    }
    let dt = sim_time as i64 - last_spike_time;
    if dt < 0 {
        return None;
    }
    Some(-eval_curve(side, dt as f32))
}

/// `UPDATE_WEIGHTS`'s per-synapse weight derivative, folding in
/// homeostatic scaling and dopamine modulation, then clipping the result
/// sign-preservingly to `[0, max_syn_wt]` (excitatory) or
/// `[max_syn_wt, 0]` (inhibitory).
#[allow(clippy::too_many_arguments)]
pub fn apply_weight_update(
    wt: f32,
    wt_change: f32,
    max_syn_wt: f32,
    stdp_scale_factor: u32,
    homeostasis: Option<(&HomeostasisParams, f32)>,
    dopamine_factor: Option<f32>,
) -> f32 {
    let eff = stdp_scale_factor as f32 * wt_change;
    let eff = match dopamine_factor {
        Some(da) => da * eff,
        None => eff,
    };

    let delta = match homeostasis {
        Some((h, avg_firing)) => {
            let diff = 1.0 - avg_firing / h.base_firing;
            let factor = h.base_firing * h.avg_time_scale_inv / (1.0 + 50.0 * diff.abs());
            (diff * wt * h.scale + eff) * factor
        }
        None => eff,
    };

    let new_wt = wt + delta;
    clip_weight(new_wt, max_syn_wt)
}

/// Sign-preserving clip: `wt ∈ [0, max_syn_wt]` if `max_syn_wt > 0`,
/// `wt ∈ [max_syn_wt, 0]` if `max_syn_wt < 0`. `sign(wt) = sign(max_syn_wt)`
/// is an invariant maintained by every caller of this function.
pub fn clip_weight(wt: f32, max_syn_wt: f32) -> f32 {
    if max_syn_wt >= 0.0 {
        wt.clamp(0.0, max_syn_wt)
    } else {
        wt.clamp(max_syn_wt, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdpSideParams;

    #[test]
    fn test_exponential_curve_literal_value() {
        // Scenario 3: ALPHA_PLUS_EXC = 0.01, TAU_PLUS_INV_EXC = 0.05,
        // pre fires at t=100, post at t=110 => dt=10.
        let side = StdpSideParams::exponential(0.01, 0.05);
        let dw = eval_curve(&side, 10.0);
        assert!((dw - 0.01 * (-0.5f32).exp()).abs() < 1e-6);
        assert!((dw - 0.006_065_3).abs() < 1e-4);
    }

    #[test]
    fn test_exponential_curve_gated_beyond_25() {
        let side = StdpSideParams::exponential(0.01, 1.0);
        assert_eq!(eval_curve(&side, 30.0), 0.0);
    }

    #[test]
    fn test_ltd_requires_nonnegative_dt() {
        let side = StdpSideParams::exponential(0.01, 0.05);
        assert!(ltd_increment(&side, 100, -1).is_none());
        assert!(ltd_increment(&side, 50, 100).is_none());
        assert!(ltd_increment(&side, 110, 100).is_some());
    }

    #[test]
    fn test_weight_clamp_inhibitory_literal_scenario() {
        // Scenario 6: maxSynWt = -20, wt = -19.5, delta pushes toward -25.
        let wt = -19.5;
        let max_syn_wt = -20.0;
        let new_wt = apply_weight_update(wt, -500.0, max_syn_wt, 10, None, None);
        assert_eq!(new_wt, -20.0);
    }

    #[test]
    fn test_weight_clamp_excitatory() {
        let new_wt = apply_weight_update(9.9, 500.0, 10.0, 10, None, None);
        assert_eq!(new_wt, 10.0);
    }

    #[test]
    fn test_dopamine_modulation_scales_effective_change() {
        let modulated = apply_weight_update(0.0, 0.01, 10.0, 1, None, Some(2.0));
        let unmodulated = apply_weight_update(0.0, 0.01, 10.0, 1, None, None);
        assert!(modulated > unmodulated);
    }
}
