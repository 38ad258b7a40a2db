//! Network- and group-scoped configuration, validated at construction.
//!
//! Everything here is checked once, before any tick runs — per the
//! error-handling design, configuration mistakes never surface as a tick
//! failure.

use crate::{error::*, GroupId};

/// STDP curve shape, selectable independently for the excitatory and
/// inhibitory side of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdpCurve {
    /// `Δw = A · exp(-|Δt| · τ_inv)`, gated by `|Δt| · τ_inv < 25`.
    Exponential,
    /// Piecewise curve, excitatory synapses only: below `GAMMA`,
    /// `Ω + κ·exp(…)`; above, `-exp(…)`.
    TimingBased,
    /// Step function, inhibitory synapses only, gated by `LAMBDA`/`DELTA`.
    Pulse,
}

/// Whether a group's STDP is modulated by the group's dopamine concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdpType {
    /// Weight derivative applied as computed.
    Standard,
    /// Weight derivative additionally scaled by `grpDA` at `UPDATE_WEIGHTS` time.
    DopamineModulated,
}

/// Group membership/target bitmask (`Type` in the external-interface
/// vocabulary). A group can be a Poisson source and/or drive one or more
/// postsynaptic channels.
pub mod group_type {
    /// Neurons in this group are Poisson spike generators, not Izhikevich.
    pub const POISSON: u32 = 1 << 0;
    /// Outgoing synapses from this group drive AMPA conductance.
    pub const TARGET_AMPA: u32 = 1 << 1;
    /// Outgoing synapses from this group drive NMDA conductance.
    pub const TARGET_NMDA: u32 = 1 << 2;
    /// Outgoing synapses from this group drive GABAa conductance.
    pub const TARGET_GABAA: u32 = 1 << 3;
    /// Outgoing synapses from this group drive GABAb conductance.
    pub const TARGET_GABAB: u32 = 1 << 4;
    /// This group's neurons release dopamine on spike (`TARGET_DA`).
    pub const TARGET_DA: u32 = 1 << 5;
}

/// STDP parameters for one side (excitatory or inhibitory) of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdpSideParams {
    /// Curve shape used by this side.
    pub curve: StdpCurve,
    /// Potentiation/depression amplitude (`ALPHA_PLUS`/`ALPHA_MINUS`).
    pub alpha: f32,
    /// Inverse time constant (`TAU_*_INV`), 1/ms.
    pub tau_inv: f32,
    /// Timing-based curve breakpoint (`GAMMA`), excitatory only.
    pub gamma: f32,
    /// Timing-based curve baseline (`OMEGA`), excitatory only.
    pub omega: f32,
    /// Timing-based curve scale (`KAPPA`), excitatory only.
    pub kappa: f32,
    /// Pulse curve gate width (`LAMBDA`), inhibitory only.
    pub lambda: f32,
    /// Pulse curve gate offset (`DELTA`), inhibitory only.
    pub delta: f32,
    /// Pulse curve LTP step (`BETA_LTP`), inhibitory only.
    pub beta_ltp: f32,
    /// Pulse curve LTD step (`BETA_LTD`), inhibitory only.
    pub beta_ltd: f32,
}

impl StdpSideParams {
    /// Exponential-curve defaults matching the literal-value scenario in
    /// the testable-properties section (`alpha = 0.01`, `tau_inv = 0.05`).
    pub fn exponential(alpha: f32, tau_inv: f32) -> Self {
        Self {
            curve: StdpCurve::Exponential,
            alpha,
            tau_inv,
            gamma: 0.0,
            omega: 0.0,
            kappa: 0.0,
            lambda: 0.0,
            delta: 0.0,
            beta_ltp: 0.0,
            beta_ltd: 0.0,
        }
    }

    fn validate(&self, side: &str) -> Result<()> {
        if self.tau_inv <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                format!("{side}.tau_inv"),
                self.tau_inv.to_string(),
                "> 0.0",
            ));
        }
        match self.curve {
            StdpCurve::TimingBased if self.gamma <= 0.0 => {
                return Err(RuntimeError::invalid_parameter(
                    format!("{side}.gamma"),
                    self.gamma.to_string(),
                    "> 0.0 (required by TimingBased curve)",
                ));
            }
            StdpCurve::Pulse if self.lambda <= 0.0 => {
                return Err(RuntimeError::invalid_parameter(
                    format!("{side}.lambda"),
                    self.lambda.to_string(),
                    "> 0.0 (required by Pulse curve)",
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Per-group STDP configuration: whether it is enabled, and the
/// excitatory/inhibitory side parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdpParams {
    /// Excitatory-synapse STDP enabled.
    pub with_e_stdp: bool,
    /// Inhibitory-synapse STDP enabled.
    pub with_i_stdp: bool,
    /// Dopamine modulation for excitatory side.
    pub e_type: StdpType,
    /// Dopamine modulation for inhibitory side.
    pub i_type: StdpType,
    /// Excitatory-side curve parameters.
    pub e_side: StdpSideParams,
    /// Inhibitory-side curve parameters.
    pub i_side: StdpSideParams,
}

impl StdpParams {
    /// No STDP on either side.
    pub fn disabled() -> Self {
        Self {
            with_e_stdp: false,
            with_i_stdp: false,
            e_type: StdpType::Standard,
            i_type: StdpType::Standard,
            e_side: StdpSideParams::exponential(0.0, 1.0),
            i_side: StdpSideParams::exponential(0.0, 1.0),
        }
    }

    /// Validate the enabled sides.
    pub fn validate(&self) -> Result<()> {
        if self.with_e_stdp {
            self.e_side.validate("e_stdp")?;
        }
        if self.with_i_stdp {
            self.i_side.validate("i_stdp")?;
        }
        Ok(())
    }
}

/// Short-term plasticity parameters for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StpParams {
    /// Release-probability increment on spike (`STP_U`).
    pub stp_u: f32,
    /// STP scaling factor applied in conductance accumulation (`STP_A`).
    pub stp_a: f32,
    /// Inverse facilitation time constant (`STP_tau_u_inv`).
    pub tau_u_inv: f32,
    /// Inverse depression time constant (`STP_tau_x_inv`).
    pub tau_x_inv: f32,
}

impl StpParams {
    /// Standard facilitating-synapse defaults.
    pub fn new(stp_u: f32, stp_a: f32, tau_u_inv: f32, tau_x_inv: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&stp_u) {
            return Err(RuntimeError::invalid_parameter(
                "stp_u",
                stp_u.to_string(),
                "in [0.0, 1.0]",
            ));
        }
        if tau_u_inv <= 0.0 || tau_x_inv <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "stp_tau_inv",
                format!("({tau_u_inv}, {tau_x_inv})"),
                "both > 0.0",
            ));
        }
        Ok(Self {
            stp_u,
            stp_a,
            tau_u_inv,
            tau_x_inv,
        })
    }
}

/// Homeostatic weight-scaling parameters for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeostasisParams {
    /// Target mean firing rate used by the scaling term (`baseFiring`).
    pub base_firing: f32,
    /// Strength of the homeostatic correction (`homeostasisScale`).
    pub scale: f32,
    /// Averaging time constant in ms (`avgTimeScale`).
    pub avg_time_scale: f32,
    /// `1 / avg_time_scale`, carried as a field like the reference
    /// (`avgTimeScaleInv`) rather than recomputed every tick.
    pub avg_time_scale_inv: f32,
    /// Per-tick decay applied to `avgFiring` in `NEURON_STATE_UPDATE`.
    pub avg_time_scale_decay: f32,
}

impl HomeostasisParams {
    /// Construct from a base firing rate and averaging window (ms),
    /// deriving the inverse and decay fields the way the reference network
    /// builder does.
    pub fn new(base_firing: f32, avg_time_scale_ms: f32, scale: f32) -> Result<Self> {
        if base_firing <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "base_firing",
                base_firing.to_string(),
                "> 0.0",
            ));
        }
        if avg_time_scale_ms <= 0.0 {
            return Err(RuntimeError::invalid_parameter(
                "avg_time_scale_ms",
                avg_time_scale_ms.to_string(),
                "> 0.0",
            ));
        }
        Ok(Self {
            base_firing,
            scale,
            avg_time_scale: avg_time_scale_ms,
            avg_time_scale_inv: 1.0 / avg_time_scale_ms,
            avg_time_scale_decay: 1.0 - 1.0 / avg_time_scale_ms,
        })
    }
}

/// Izhikevich parameters shared by every regular neuron of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IzhParams {
    /// Recovery-variable time-scale.
    pub a: f32,
    /// Sensitivity of recovery to sub-threshold voltage fluctuations.
    pub b: f32,
    /// Post-spike reset voltage.
    pub c: f32,
    /// Post-spike recovery reset increment.
    pub d: f32,
}

impl IzhParams {
    /// Classic regular-spiking parameters, used as defaults.
    pub const REGULAR_SPIKING: Self = Self {
        a: 0.02,
        b: 0.2,
        c: -65.0,
        d: 8.0,
    };
}

impl Default for IzhParams {
    fn default() -> Self {
        Self::REGULAR_SPIKING
    }
}

/// Synaptic-conductance decay/rise constants shared by every COBA group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductanceParams {
    /// AMPA decay factor per ms (`dAMPA`).
    pub d_ampa: f32,
    /// NMDA decay factor, used directly when rise dynamics are off (`dNMDA`).
    pub d_nmda: f32,
    /// NMDA rise factor, used only when `sim_with_NMDA_rise` is set (`rNMDA`).
    pub r_nmda: f32,
    /// GABAa decay factor per ms (`dGABAa`).
    pub d_gabaa: f32,
    /// GABAb decay factor, used directly when rise dynamics are off (`dGABAb`).
    pub d_gabab: f32,
    /// GABAb rise factor, used only when `sim_with_GABAb_rise` is set (`rGABAb`).
    pub r_gabab: f32,
    /// NMDA rise/decay normalization constant (`sNMDA`).
    pub s_nmda: f32,
    /// GABAb rise/decay normalization constant (`sGABAb`).
    pub s_gabab: f32,
}

impl Default for ConductanceParams {
    fn default() -> Self {
        Self {
            d_ampa: 0.99,
            d_nmda: 0.995,
            r_nmda: 0.9,
            d_gabaa: 0.98,
            d_gabab: 0.995,
            r_gabab: 0.9,
            s_nmda: 1.0,
            s_gabab: 1.0,
        }
    }
}

/// Per-group configuration.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Group identity.
    pub id: GroupId,
    /// First neuron id belonging to this group.
    pub start_n: u32,
    /// Number of neurons in this group.
    pub size_n: u32,
    /// `Type` bitmask (see [`group_type`]).
    pub kind: u32,
    /// Maximum synaptic delay, in ms, among this group's outgoing synapses.
    /// `max_delay == 1` routes firing into the D1 table, `> 1` into D2.
    pub max_delay: u32,
    /// Izhikevich parameters (unused for Poisson groups).
    pub izh: IzhParams,
    /// STDP configuration.
    pub stdp: StdpParams,
    /// Short-term plasticity; `None` disables it for this group.
    pub stp: Option<StpParams>,
    /// Homeostatic scaling; `None` disables it for this group.
    pub homeostasis: Option<HomeostasisParams>,
    /// Baseline dopamine concentration below which `GROUP_STATE_UPDATE`
    /// stops decaying `grpDA` (`baseDP`).
    pub base_dp: f32,
    /// Per-tick dopamine decay factor (`decayDP`).
    pub decay_dp: f32,
    /// Incoming synapses onto this group never receive weight updates.
    pub fixed_input_wts: bool,
    /// This group's neurons are externally driven (bit-vector or rate
    /// Poisson) rather than integrated.
    pub is_spike_generator: bool,
}

impl GroupConfig {
    /// True if this group is a Poisson source.
    pub fn is_poisson(&self) -> bool {
        self.kind & group_type::POISSON != 0
    }

    /// True if this group's outgoing synapses should be routed to the D1
    /// (unit-delay) firing table.
    pub fn is_d1(&self) -> bool {
        self.max_delay == 1
    }

    /// Validate internal consistency of this group's parameters.
    pub fn validate(&self) -> Result<()> {
        if self.size_n == 0 {
            return Err(RuntimeError::invalid_parameter(
                "size_n",
                "0".into(),
                "> 0",
            ));
        }
        if self.max_delay == 0 {
            return Err(RuntimeError::invalid_parameter(
                "max_delay",
                "0".into(),
                ">= 1",
            ));
        }
        if self.is_poisson() && (self.stdp.with_e_stdp || self.stdp.with_i_stdp) {
            return Err(RuntimeError::invalid_config(
                "a Poisson group cannot itself carry STDP state",
            ));
        }
        self.stdp.validate()?;
        if self.decay_dp < 0.0 || self.decay_dp > 1.0 {
            return Err(RuntimeError::invalid_parameter(
                "decay_dp",
                self.decay_dp.to_string(),
                "in [0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

/// Network-scoped configuration, the non-per-group half of the external
/// interface (`maxDelay`, `numN`, feature flags, decay constants, …).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Largest per-group `max_delay` across the whole network.
    pub max_delay: u32,
    /// D1 firing-table capacity per second (`maxSpikesD1`).
    pub max_spikes_d1: u32,
    /// D2 firing-table capacity per second (`maxSpikesD2`).
    pub max_spikes_d2: u32,
    /// Upper bound on presynaptic fan-in across all neurons
    /// (`maxNumPreSynN`), used to size `I_set` rows.
    pub max_num_pre_syn_n: u32,
    /// COBA (`true`) vs CUBA (`false`) synapses network-wide
    /// (`sim_with_conductances`).
    pub with_conductances: bool,
    /// NMDA rise+decay dynamics enabled (`sim_with_NMDA_rise`).
    pub with_nmda_rise: bool,
    /// GABAb rise+decay dynamics enabled (`sim_with_GABAb_rise`).
    pub with_gabab_rise: bool,
    /// STDP evaluated at all (`sim_with_stdp`); a group can still disable
    /// it locally via `GroupConfig::stdp`.
    pub with_stdp: bool,
    /// STP evaluated at all (`sim_with_stp`).
    pub with_stp: bool,
    /// Homeostasis evaluated at all (`sim_with_homeostasis`).
    pub with_homeostasis: bool,
    /// All synapses are non-plastic network-wide (`sim_with_fixedwts`).
    pub with_fixed_wts: bool,
    /// Testing mode: `FIND_FIRING`/delivery skip STDP accumulation
    /// entirely (`sim_in_testing`), used by the round-trip property tests.
    pub in_testing: bool,
    /// Conductance decay/rise constants.
    pub conductance: ConductanceParams,
    /// `UPDATE_WEIGHTS` cadence in ms (`stdpScaleFactor`).
    pub stdp_scale_factor: u32,
    /// Optional per-update soft decay of `wtChange` (`wtChangeDecay`).
    pub wt_change_decay: f32,
    /// Euler sub-steps per ms in `NEURON_STATE_UPDATE`
    /// (`COND_INTEGRATION_SCALE`).
    pub cond_integration_scale: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_delay: 1,
            max_spikes_d1: 100_000,
            max_spikes_d2: 100_000,
            max_num_pre_syn_n: 1_000,
            with_conductances: false,
            with_nmda_rise: false,
            with_gabab_rise: false,
            with_stdp: false,
            with_stp: false,
            with_homeostasis: false,
            with_fixed_wts: false,
            in_testing: false,
            conductance: ConductanceParams::default(),
            stdp_scale_factor: 1000,
            wt_change_decay: 1.0,
            cond_integration_scale: 2,
        }
    }
}

impl NetworkConfig {
    /// Validate the network-scoped fields.
    pub fn validate(&self) -> Result<()> {
        if self.max_delay == 0 {
            return Err(RuntimeError::invalid_parameter(
                "max_delay",
                "0".into(),
                ">= 1",
            ));
        }
        if self.max_spikes_d1 == 0 || self.max_spikes_d2 == 0 {
            return Err(RuntimeError::invalid_config(
                "maxSpikesD1/maxSpikesD2 must both be > 0",
            ));
        }
        if self.max_num_pre_syn_n == 0 {
            return Err(RuntimeError::invalid_parameter(
                "max_num_pre_syn_n",
                "0".into(),
                "> 0",
            ));
        }
        if self.stdp_scale_factor == 0 {
            return Err(RuntimeError::invalid_parameter(
                "stdp_scale_factor",
                "0".into(),
                "> 0",
            ));
        }
        if self.cond_integration_scale == 0 {
            return Err(RuntimeError::invalid_parameter(
                "cond_integration_scale",
                "0".into(),
                "> 0",
            ));
        }
        Ok(())
    }

    /// Number of 32-bit words per `I_set` row (`⌈maxNumPreSynN / 32⌉`).
    pub fn i_set_length(&self) -> usize {
        (self.max_num_pre_syn_n as usize + 31) / 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_config_defaults_valid() {
        assert!(NetworkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_network_config_rejects_zero_delay() {
        let mut cfg = NetworkConfig::default();
        cfg.max_delay = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_i_set_length_rounds_up() {
        let mut cfg = NetworkConfig::default();
        cfg.max_num_pre_syn_n = 33;
        assert_eq!(cfg.i_set_length(), 2);
        cfg.max_num_pre_syn_n = 32;
        assert_eq!(cfg.i_set_length(), 1);
    }

    #[test]
    fn test_stdp_side_params_exponential_literal() {
        let side = StdpSideParams::exponential(0.01, 0.05);
        assert!(side.validate("e_stdp").is_ok());
        assert_eq!(side.alpha, 0.01);
        assert_eq!(side.tau_inv, 0.05);
    }

    #[test]
    fn test_timing_based_requires_gamma() {
        let mut side = StdpSideParams::exponential(0.01, 0.05);
        side.curve = StdpCurve::TimingBased;
        assert!(side.validate("e_stdp").is_err());
        side.gamma = 10.0;
        assert!(side.validate("e_stdp").is_ok());
    }

    #[test]
    fn test_homeostasis_params_derivation() {
        let h = HomeostasisParams::new(5.0, 10_000.0, 1.0).unwrap();
        assert_eq!(h.avg_time_scale_inv, 1.0 / 10_000.0);
        assert!((h.avg_time_scale_decay - (1.0 - 1.0 / 10_000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_group_config_poisson_rejects_stdp() {
        let cfg = GroupConfig {
            id: GroupId::new(0),
            start_n: 0,
            size_n: 10,
            kind: group_type::POISSON,
            max_delay: 1,
            izh: IzhParams::default(),
            stdp: StdpParams {
                with_e_stdp: true,
                ..StdpParams::disabled()
            },
            stp: None,
            homeostasis: None,
            base_dp: 0.0,
            decay_dp: 0.99,
            fixed_input_wts: true,
            is_spike_generator: true,
        };
        assert!(cfg.validate().is_err());
    }
}
