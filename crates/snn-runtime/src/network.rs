//! Flat CSR-style synaptic matrix and the fluent group/network builders used
//! to construct it, plus the pooled neuron state it is built against.

use std::collections::HashMap;

use crate::config::{GroupConfig, HomeostasisParams, IzhParams, NetworkConfig, StdpParams, StpParams};
use crate::error::*;
use crate::neuron::{NeuronPool, PoissonPool, NO_SPIKE};
use crate::{ConnectionId, GroupId};

/// Allocation headroom the reference builder reserves per neuron's
/// adjacency list beyond its final synapse count, for reasons not recorded
/// in the reference design. Preserved here as a capacity hint only; it has
/// no effect on the final flattened arrays.
const PRE_POST_SYN_SLACK: usize = 10;

/// One synapse as supplied to the builder, before CSR flattening.
#[derive(Debug, Clone, Copy)]
pub struct SynapseSpec {
    /// Source neuron id.
    pub pre: u32,
    /// Target neuron id.
    pub post: u32,
    /// Initial weight; `sign(weight) = sign(max_syn_wt)` is required.
    pub weight: f32,
    /// Sign-matched saturation bound for this synapse.
    pub max_syn_wt: f32,
    /// Synaptic delay in ms, `1 ≤ delay ≤ max_delay`.
    pub delay: u32,
    /// Connection bundle this synapse belongs to, indexing `mulSynFast/Slow`.
    pub conn_id: ConnectionId,
}

/// Flat, struct-of-arrays synaptic matrix: per-synapse state indexed by
/// incoming (post-centric) slot, plus the pre-centric back-pointers and
/// per-delay slices the delivery kernels need.
#[derive(Debug, Clone)]
pub struct SynapticMatrix {
    /// Network-wide maximum delay, sizing `post_delay_start/len`.
    pub max_delay: u32,

    /// Incoming synapse count per post-neuron (`Npre`).
    pub num_pre: Vec<u32>,
    /// Outgoing synapse count per pre-neuron (`Npost`).
    pub num_post: Vec<u32>,
    /// `cumulative_pre[n+1] = cumulative_pre[n] + num_pre[n]`.
    pub cumulative_pre: Vec<u32>,
    /// `cumulative_post[n+1] = cumulative_post[n] + num_post[n]`.
    pub cumulative_post: Vec<u32>,

    /// `pre_synaptic_ids[cumulative_pre[post]+k]` = source neuron id.
    pub pre_synaptic_ids: Vec<u32>,
    /// `post_target[cumulative_post[pre]+j]` = target neuron id.
    pub post_target: Vec<u32>,
    /// `post_presyn_slot[cumulative_post[pre]+j]` = `k`, the synapse's slot
    /// in its post-neuron's incoming arrays.
    pub post_presyn_slot: Vec<u32>,
    /// `(start, length)` into `post_target`/`post_presyn_slot`, indexed
    /// `pre*(max_delay+1)+d`, giving exactly the targets at delay `d`.
    pub post_delay_start: Vec<u32>,
    /// Paired with `post_delay_start`.
    pub post_delay_len: Vec<u32>,

    /// Signed synaptic weight, indexed by incoming slot.
    pub wt: Vec<f32>,
    /// Accumulated weight derivative, indexed by incoming slot.
    pub wt_change: Vec<f32>,
    /// Sign-matched saturation bound, indexed by incoming slot.
    pub max_syn_wt: Vec<f32>,
    /// Tick of last delivery, indexed by incoming slot.
    pub syn_spike_time: Vec<i64>,
    /// Connection bundle id, indexed by incoming slot.
    pub conn_id: Vec<ConnectionId>,

    /// Fast (AMPA/GABAa) scale factor, indexed by `ConnectionId`.
    pub mul_syn_fast: Vec<f32>,
    /// Slow (NMDA/GABAb) scale factor, indexed by `ConnectionId`.
    pub mul_syn_slow: Vec<f32>,
}

impl SynapticMatrix {
    /// Incoming slot range for `post` into `pre_synaptic_ids`/`wt`/etc.
    pub fn incoming_range(&self, post: usize) -> std::ops::Range<usize> {
        self.cumulative_pre[post] as usize..self.cumulative_pre[post + 1] as usize
    }

    /// Outgoing slot range for `pre` into `post_target`/`post_presyn_slot`.
    pub fn outgoing_range(&self, pre: usize) -> std::ops::Range<usize> {
        self.cumulative_post[pre] as usize..self.cumulative_post[pre + 1] as usize
    }

    /// Targets of `pre` at exactly delay `d`, as `(post, presyn_slot)` pairs.
    pub fn targets_at_delay(&self, pre: usize, d: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let row = pre * (self.max_delay as usize + 1) + d as usize;
        let start = self.post_delay_start[row] as usize;
        let len = self.post_delay_len[row] as usize;
        let base = self.cumulative_post[pre] as usize + start;
        (base..base + len).map(move |i| (self.post_target[i], self.post_presyn_slot[i]))
    }

    /// Absolute incoming-slot index of synapse `k` feeding `post`
    /// (`cumulativePre[post] + k`), the index used to read `wt`/`wtChange`.
    pub fn incoming_index(&self, post: usize, k: u32) -> usize {
        self.cumulative_pre[post] as usize + k as usize
    }
}

/// Builder for one [`GroupConfig`], deferring `id`/`start_n`/`size_n`
/// assignment to [`NetworkBuilder::build`].
#[derive(Debug, Clone)]
pub struct GroupBuilder {
    size_n: u32,
    kind: u32,
    max_delay: u32,
    izh: IzhParams,
    stdp: StdpParams,
    stp: Option<StpParams>,
    homeostasis: Option<HomeostasisParams>,
    base_dp: f32,
    decay_dp: f32,
    fixed_input_wts: bool,
    is_spike_generator: bool,
}

impl GroupBuilder {
    /// A group of `size_n` regular Izhikevich neurons.
    pub fn regular(size_n: u32) -> Self {
        Self {
            size_n,
            kind: 0,
            max_delay: 1,
            izh: IzhParams::default(),
            stdp: StdpParams::disabled(),
            stp: None,
            homeostasis: None,
            base_dp: 0.0,
            decay_dp: 1.0,
            fixed_input_wts: false,
            is_spike_generator: false,
        }
    }

    /// A group of `size_n` Poisson spike generators.
    pub fn poisson(size_n: u32) -> Self {
        Self {
            is_spike_generator: true,
            ..Self::regular(size_n).with_kind(crate::config::group_type::POISSON)
        }
    }

    /// Set the `Type` bitmask directly (see [`crate::config::group_type`]).
    pub fn with_kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    /// OR additional target bits into the `Type` bitmask.
    pub fn targets(mut self, mask: u32) -> Self {
        self.kind |= mask;
        self
    }

    /// Set Izhikevich parameters (no-op for Poisson groups).
    pub fn with_izh(mut self, izh: IzhParams) -> Self {
        self.izh = izh;
        self
    }

    /// Set the network max delay among this group's outgoing synapses.
    pub fn with_delay(mut self, max_delay: u32) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enable STDP with the given parameters.
    pub fn with_stdp(mut self, stdp: StdpParams) -> Self {
        self.stdp = stdp;
        self
    }

    /// Enable short-term plasticity.
    pub fn with_stp(mut self, stp: StpParams) -> Self {
        self.stp = Some(stp);
        self
    }

    /// Enable homeostatic weight scaling.
    pub fn with_homeostasis(mut self, h: HomeostasisParams) -> Self {
        self.homeostasis = Some(h);
        self
    }

    /// Set dopamine baseline/decay (only meaningful for DA-releasing or
    /// DA-modulated groups).
    pub fn with_dopamine(mut self, base_dp: f32, decay_dp: f32) -> Self {
        self.base_dp = base_dp;
        self.decay_dp = decay_dp;
        self
    }

    /// Mark incoming synapses onto this group as non-plastic.
    pub fn fixed_input_wts(mut self) -> Self {
        self.fixed_input_wts = true;
        self
    }
}

/// Fluent builder assembling groups and synapses into a runnable
/// [`Network`], the Rust equivalent of the teacher's
/// `NetworkBuilder::build()` step but producing the flat arrays this
/// crate's kernels operate on instead of a `HashMap`-keyed graph.
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    config: NetworkConfig,
    groups: Vec<GroupBuilder>,
    synapses: Vec<SynapseSpec>,
}

impl NetworkBuilder {
    /// Start a new builder with the given network-scoped configuration.
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            groups: Vec::new(),
            synapses: Vec::new(),
        }
    }

    /// Append a group, returning the index to reference it from
    /// [`NetworkBuilder::connect_groups`] or direct neuron-id wiring.
    pub fn add_group(mut self, group: GroupBuilder) -> (Self, usize) {
        let idx = self.groups.len();
        self.groups.push(group);
        (self, idx)
    }

    /// Add a synapse between two absolute neuron ids.
    pub fn connect(mut self, synapse: SynapseSpec) -> Self {
        self.synapses.push(synapse);
        self
    }

    /// Build the neuron pools, per-group configuration, and synaptic matrix.
    ///
    /// Regular groups are assigned the contiguous range `[0, numNReg)` and
    /// Poisson groups `[numNReg, numNReg+numNPois)`, in each case preserving
    /// the relative order groups were added in — independent of how the
    /// caller interleaved `add_group` calls for the two kinds.
    pub fn build(self) -> Result<Network> {
        self.config.validate()?;

        let (poisson_groups, regular_groups): (Vec<_>, Vec<_>) =
            self.groups.into_iter().enumerate().partition(|(_, g)| g.kind & crate::config::group_type::POISSON != 0);

        let num_reg: u32 = regular_groups.iter().map(|(_, g)| g.size_n).sum();
        let num_pois: u32 = poisson_groups.iter().map(|(_, g)| g.size_n).sum();

        let mut configs: Vec<Option<GroupConfig>> = vec![None; regular_groups.len() + poisson_groups.len()];
        let mut offset = 0u32;
        for (orig_idx, g) in &regular_groups {
            let cfg = GroupConfig {
                id: GroupId::new(configs.iter().flatten().count() as u32),
                start_n: offset,
                size_n: g.size_n,
                kind: g.kind,
                max_delay: g.max_delay,
                izh: g.izh,
                stdp: g.stdp,
                stp: g.stp,
                homeostasis: g.homeostasis,
                base_dp: g.base_dp,
                decay_dp: g.decay_dp,
                fixed_input_wts: g.fixed_input_wts,
                is_spike_generator: g.is_spike_generator,
            };
            cfg.validate()?;
            configs[*orig_idx] = Some(cfg);
            offset += g.size_n;
        }
        let mut offset = num_reg;
        for (orig_idx, g) in &poisson_groups {
            let cfg = GroupConfig {
                id: GroupId::new(configs.iter().flatten().count() as u32),
                start_n: offset,
                size_n: g.size_n,
                kind: g.kind,
                max_delay: g.max_delay,
                izh: g.izh,
                stdp: g.stdp,
                stp: g.stp,
                homeostasis: g.homeostasis,
                base_dp: g.base_dp,
                decay_dp: g.decay_dp,
                fixed_input_wts: g.fixed_input_wts,
                is_spike_generator: g.is_spike_generator,
            };
            cfg.validate()?;
            configs[*orig_idx] = Some(cfg);
            offset += g.size_n;
        }
        let groups: Vec<GroupConfig> = configs.into_iter().map(|c| c.unwrap()).collect();

        let mut neurons = NeuronPool::new(num_reg as usize);
        let mut poisson = PoissonPool::new(num_pois as usize);
        for g in &groups {
            for n in g.start_n..(g.start_n + g.size_n) {
                if g.is_poisson() {
                    poisson.group_id[(n - num_reg) as usize] = g.id;
                } else {
                    neurons.group_id[n as usize] = g.id;
                }
            }
        }

        let num_n = (num_reg + num_pois) as usize;
        let matrix = build_matrix(&self.synapses, num_n, self.config.max_delay)?;

        Ok(Network {
            config: self.config,
            groups,
            neurons,
            poisson,
            matrix,
        })
    }
}

fn build_matrix(synapses: &[SynapseSpec], num_n: usize, max_delay: u32) -> Result<SynapticMatrix> {
    for s in synapses {
        if s.post as usize >= num_n || s.pre as usize >= num_n {
            return Err(RuntimeError::network_topology(format!(
                "synapse {}->{} references an out-of-range neuron id",
                s.pre, s.post
            )));
        }
        if s.delay == 0 || s.delay > max_delay {
            return Err(RuntimeError::invalid_parameter(
                "delay",
                s.delay.to_string(),
                format!("in [1, {max_delay}]"),
            ));
        }
        if s.max_syn_wt.signum() != s.weight.signum() && s.weight != 0.0 {
            return Err(RuntimeError::invalid_config(format!(
                "synapse {}->{}: sign(weight) must match sign(max_syn_wt)",
                s.pre, s.post
            )));
        }
    }

    let mut incoming: Vec<Vec<&SynapseSpec>> = (0..num_n)
        .map(|_| Vec::with_capacity(PRE_POST_SYN_SLACK))
        .collect();
    for s in synapses {
        incoming[s.post as usize].push(s);
    }

    let mut num_pre = vec![0u32; num_n];
    let mut cumulative_pre = vec![0u32; num_n + 1];
    let mut pre_synaptic_ids = Vec::with_capacity(synapses.len());
    let mut wt = Vec::with_capacity(synapses.len());
    let mut wt_change = Vec::with_capacity(synapses.len());
    let mut max_syn_wt = Vec::with_capacity(synapses.len());
    let mut syn_spike_time = Vec::with_capacity(synapses.len());
    let mut conn_id = Vec::with_capacity(synapses.len());

    // (pre, post, local_slot, delay) for every synapse, in incoming order;
    // used below to build the pre-centric outgoing arrays.
    let mut outgoing_source: Vec<(u32, u32, u32, u32)> = Vec::with_capacity(synapses.len());

    for post in 0..num_n {
        num_pre[post] = incoming[post].len() as u32;
        cumulative_pre[post + 1] = cumulative_pre[post] + num_pre[post];
        for (k, s) in incoming[post].iter().enumerate() {
            pre_synaptic_ids.push(s.pre);
            wt.push(s.weight);
            wt_change.push(0.0);
            max_syn_wt.push(s.max_syn_wt);
            syn_spike_time.push(NO_SPIKE);
            conn_id.push(s.conn_id);
            outgoing_source.push((s.pre, post as u32, k as u32, s.delay));
        }
    }

    let mut outgoing: Vec<Vec<(u32, u32, u32)>> = (0..num_n)
        .map(|_| Vec::with_capacity(PRE_POST_SYN_SLACK))
        .collect();
    for (pre, post, slot, delay) in outgoing_source {
        outgoing[pre as usize].push((delay, post, slot));
    }

    let mut num_post = vec![0u32; num_n];
    let mut cumulative_post = vec![0u32; num_n + 1];
    let mut post_target = Vec::with_capacity(synapses.len());
    let mut post_presyn_slot = Vec::with_capacity(synapses.len());
    let row_count = num_n * (max_delay as usize + 1);
    let mut post_delay_start = vec![0u32; row_count];
    let mut post_delay_len = vec![0u32; row_count];

    for pre in 0..num_n {
        outgoing[pre].sort_by_key(|&(delay, _, _)| delay);
        num_post[pre] = outgoing[pre].len() as u32;
        cumulative_post[pre + 1] = cumulative_post[pre] + num_post[pre];

        let mut local = 0u32;
        for d in 1..=max_delay {
            let start = local;
            while (local as usize) < outgoing[pre].len() && outgoing[pre][local as usize].0 == d {
                local += 1;
            }
            let row = pre * (max_delay as usize + 1) + d as usize;
            post_delay_start[row] = start;
            post_delay_len[row] = local - start;
        }
        for (_, post, slot) in &outgoing[pre] {
            post_target.push(*post);
            post_presyn_slot.push(*slot);
        }
    }

    let max_conn_id = synapses.iter().map(|s| s.conn_id.raw()).max().map(|m| m + 1).unwrap_or(0);
    let mul_syn_fast = vec![1.0f32; max_conn_id as usize];
    let mul_syn_slow = vec![1.0f32; max_conn_id as usize];

    Ok(SynapticMatrix {
        max_delay,
        num_pre,
        num_post,
        cumulative_pre,
        cumulative_post,
        pre_synaptic_ids,
        post_target,
        post_presyn_slot,
        post_delay_start,
        post_delay_len,
        wt,
        wt_change,
        max_syn_wt,
        syn_spike_time,
        conn_id,
        mul_syn_fast,
        mul_syn_slow,
    })
}

/// A fully built, runnable network: pooled neuron state, per-group
/// configuration, and the flat synaptic matrix — everything a [`Network`]
/// needs to hand to `Simulation::new`.
#[derive(Debug, Clone)]
pub struct Network {
    /// Network-scoped configuration.
    pub config: NetworkConfig,
    /// Per-group configuration, indexed by [`GroupId`].
    pub groups: Vec<GroupConfig>,
    /// Regular (Izhikevich) neuron pool.
    pub neurons: NeuronPool,
    /// Poisson generator pool.
    pub poisson: PoissonPool,
    /// Flat synaptic matrix.
    pub matrix: SynapticMatrix,
}

impl Network {
    /// Group owning neuron `n`, searching regular then Poisson ranges.
    pub fn group_of(&self, n: u32) -> GroupId {
        if (n as usize) < self.neurons.num_reg {
            self.neurons.group_id[n as usize]
        } else {
            self.poisson.group_id[n as usize - self.neurons.num_reg]
        }
    }

    /// Lookup table from [`GroupId`] to its index in `groups`.
    pub fn group_index(&self) -> HashMap<GroupId, usize> {
        self.groups.iter().enumerate().map(|(i, g)| (g.id, i)).collect()
    }
}
