//! Firing tables (D1/D2) and their millisecond-indexed time tables.
//!
//! `firing_table_d{1,2}` are flat, monotonically-appended arrays of neuron
//! ids; `time_table_d{1,2}` record, at index `ms + max_delay + 1`, the
//! cumulative spike count through tick `ms` of the current second. The
//! difference between two consecutive entries is the spike count emitted
//! during that tick.

use crate::error::*;

/// D1/D2 firing tables plus their time-table indices, and the lifetime
/// spike counters the spec requires to be scoped into the simulation
/// context rather than held as process-wide globals.
#[derive(Debug, Clone)]
pub struct FiringTables {
    max_delay: u32,
    max_spikes_d1: u32,
    max_spikes_d2: u32,

    firing_table_d1: Vec<u32>,
    firing_table_d2: Vec<u32>,

    /// `time_table_d{1,2}[0..=1000+max_delay]`; index 0 is always 0.
    time_table_d1: Vec<u32>,
    time_table_d2: Vec<u32>,

    cursor_d1: u32,
    cursor_d2: u32,

    spike_count_d1_sec: u32,
    spike_count_d2_sec: u32,

    /// Total D1 spikes ever recorded, accumulated across seconds.
    pub spike_count_d1_lifetime: u64,
    /// Total D2 spikes ever recorded, accumulated across seconds.
    pub spike_count_d2_lifetime: u64,
}

impl FiringTables {
    /// Allocate empty tables sized for the given per-second capacities and
    /// network-wide maximum delay.
    pub fn new(max_delay: u32, max_spikes_d1: u32, max_spikes_d2: u32) -> Self {
        let table_len = (1001 + max_delay) as usize;
        Self {
            max_delay,
            max_spikes_d1,
            max_spikes_d2,
            firing_table_d1: vec![0; max_spikes_d1 as usize],
            firing_table_d2: vec![0; max_spikes_d2 as usize],
            time_table_d1: vec![0; table_len],
            time_table_d2: vec![0; table_len],
            cursor_d1: 0,
            cursor_d2: 0,
            spike_count_d1_sec: 0,
            spike_count_d2_sec: 0,
            spike_count_d1_lifetime: 0,
            spike_count_d2_lifetime: 0,
        }
    }

    /// Append a fired neuron to the D1 (unit-delay) table.
    pub fn push_d1(&mut self, tick: u32, neuron_id: u32) -> Result<()> {
        if self.cursor_d1 >= self.max_spikes_d1 {
            return Err(RuntimeError::FireUpdateOverflowD1 {
                tick,
                capacity: self.max_spikes_d1,
            });
        }
        self.firing_table_d1[self.cursor_d1 as usize] = neuron_id;
        self.cursor_d1 += 1;
        Ok(())
    }

    /// Append a fired neuron to the D2 (multi-delay) table.
    pub fn push_d2(&mut self, tick: u32, neuron_id: u32) -> Result<()> {
        if self.cursor_d2 >= self.max_spikes_d2 {
            return Err(RuntimeError::FireUpdateOverflowD2 {
                tick,
                capacity: self.max_spikes_d2,
            });
        }
        self.firing_table_d2[self.cursor_d2 as usize] = neuron_id;
        self.cursor_d2 += 1;
        Ok(())
    }

    /// `UPDATE_TIME_TABLE`: record the running totals for tick `ms`
    /// (`simTime mod 1000`) into both time tables.
    pub fn update_time_table(&mut self, ms: u32) {
        let idx = (ms + self.max_delay + 1) as usize;
        self.time_table_d1[idx] = self.cursor_d1;
        self.time_table_d2[idx] = self.cursor_d2;
    }

    /// Spikes recorded into D1 during tick `ms` of the current second.
    pub fn spikes_at_d1(&self, ms: u32) -> &[u32] {
        let lo = self.time_table_d1[(ms + self.max_delay) as usize] as usize;
        let hi = self.time_table_d1[(ms + self.max_delay + 1) as usize] as usize;
        &self.firing_table_d1[lo..hi]
    }

    /// Spikes recorded into D2 with firing tick `ms` of the current second
    /// (the D2 delivery path scans this per active delay).
    pub fn spikes_at_d2(&self, ms: u32) -> &[u32] {
        self.spikes_at_d2_rel(ms as i64)
    }

    /// Spikes recorded into D2 at firing tick `rel` relative to the start of
    /// the current second, where `rel` may be negative (`-max_delay..0`) to
    /// reach into the previous second's carry-over region
    /// (`timeTableD2[0..maxDelay]`, see spec.md §3/§4.3). The D2 delivery
    /// path uses this for `rel = ms - d` when the firing tick of an active
    /// delay `d` falls before the current second started.
    pub fn spikes_at_d2_rel(&self, rel: i64) -> &[u32] {
        let idx = (rel + self.max_delay as i64) as usize;
        let lo = self.time_table_d2[idx] as usize;
        let hi = self.time_table_d2[idx + 1] as usize;
        &self.firing_table_d2[lo..hi]
    }

    /// `SHIFT_FIRING_TABLE` + `SHIFT_TIME_TABLE`: run at the boundary
    /// between seconds (every 1000 ticks). Compacts D2's residual carry-over
    /// to the front of the buffer, shifts both time tables' carry-over
    /// region, resets the per-second counters, and folds the just-finished
    /// second's counts into the lifetime totals.
    pub fn second_boundary_compact(&mut self) {
        let max_delay = self.max_delay as usize;

        let residual_start = self.time_table_d2[999] as usize;
        let residual_end = self.time_table_d2[999 + max_delay + 1] as usize;
        self.firing_table_d2
            .copy_within(residual_start..residual_end, 0);

        for i in 1..=max_delay {
            self.time_table_d2[i] = self.time_table_d2[1000 + i] - self.time_table_d2[1000];
            self.time_table_d1[i] = self.time_table_d1[1000 + i] - self.time_table_d1[1000];
        }

        // Lifetime accumulation uses the pre-reset per-second counts.
        self.spike_count_d1_lifetime += self.cursor_d1 as u64;
        self.spike_count_d2_lifetime += self.cursor_d2 as u64;

        // D1 has no carried-over copy step (see spec §4.8/§9): any D1 spike
        // recorded on the final tick of the second that would have
        // delivered into the next second is dropped, not migrated.
        self.time_table_d1[max_delay] = 0;
        self.spike_count_d1_sec = 0;
        self.spike_count_d2_sec = self.time_table_d2[max_delay];

        self.cursor_d1 = 0;
        self.cursor_d2 = residual_end.saturating_sub(residual_start) as u32;

        for entry in self.time_table_d1.iter_mut().skip(max_delay + 1) {
            *entry = 0;
        }
        for entry in self.time_table_d2.iter_mut().skip(max_delay + 1) {
            *entry = 0;
        }
    }

    /// D1 spikes recorded so far this second.
    pub fn spike_count_d1_sec(&self) -> u32 {
        self.spike_count_d1_sec.max(self.cursor_d1)
    }

    /// D2 spikes recorded so far this second.
    pub fn spike_count_d2_sec(&self) -> u32 {
        self.spike_count_d2_sec.max(self.cursor_d2)
    }

    /// Network-wide maximum delay these tables were sized for.
    pub fn max_delay(&self) -> u32 {
        self.max_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_time_table_single_tick() {
        let mut tables = FiringTables::new(1, 16, 16);
        tables.push_d1(0, 7).unwrap();
        tables.push_d1(0, 9).unwrap();
        tables.update_time_table(0);
        assert_eq!(tables.spikes_at_d1(0), &[7, 9]);
    }

    #[test]
    fn test_d1_overflow() {
        let mut tables = FiringTables::new(1, 4, 16);
        for _ in 0..4 {
            tables.push_d1(0, 1).unwrap();
        }
        let err = tables.push_d1(0, 1).unwrap_err();
        assert!(matches!(err, RuntimeError::FireUpdateOverflowD1 { .. }));
    }

    #[test]
    fn test_d2_overflow() {
        let mut tables = FiringTables::new(5, 16, 2);
        tables.push_d2(0, 1).unwrap();
        tables.push_d2(0, 2).unwrap();
        let err = tables.push_d2(0, 3).unwrap_err();
        assert!(matches!(err, RuntimeError::FireUpdateOverflowD2 { .. }));
    }

    #[test]
    fn test_second_boundary_compaction_literal_scenario() {
        let max_delay = 20;
        let mut tables = FiringTables::new(max_delay, 10_000, 10_000);

        for ms in 0..1000u32 {
            match ms {
                985 => tables.push_d2(ms, 101).unwrap(),
                990 => tables.push_d2(ms, 102).unwrap(),
                995 => tables.push_d2(ms, 103).unwrap(),
                _ => {}
            }
            tables.update_time_table(ms);
        }

        tables.second_boundary_compact();

        assert_eq!(&tables.firing_table_d2[0..3], &[101, 102, 103]);
        for i in 0..max_delay {
            let count = tables.time_table_d2[(i + 1) as usize] - tables.time_table_d2[i as usize];
            assert!(count <= 1);
        }
    }

    #[test]
    fn test_spikes_at_d2_rel_reaches_into_carry_over() {
        let max_delay = 4;
        let mut tables = FiringTables::new(max_delay, 1_000, 1_000);
        for ms in 0..1000u32 {
            match ms {
                998 => tables.push_d2(ms, 998).unwrap(),
                999 => tables.push_d2(ms, 999).unwrap(),
                _ => {}
            }
            tables.update_time_table(ms);
        }
        tables.second_boundary_compact();
        // ms=998 and ms=999 of the finished second are now reachable as
        // rel=-2 and rel=-1 of the new second.
        assert_eq!(tables.spikes_at_d2_rel(-2), &[998]);
        assert_eq!(tables.spikes_at_d2_rel(-1), &[999]);
    }

    #[test]
    fn test_time_table_monotone_nondecreasing_within_second() {
        let mut tables = FiringTables::new(2, 1_000, 1_000);
        for ms in 0..1000u32 {
            if ms % 7 == 0 {
                tables.push_d2(ms, ms).unwrap();
            }
            tables.update_time_table(ms);
        }
        let max_delay = 2usize;
        for i in max_delay..(1000 + max_delay) {
            assert!(tables.time_table_d2[i] <= tables.time_table_d2[i + 1]);
        }
        assert_eq!(tables.time_table_d1[0], 0);
        assert_eq!(tables.time_table_d2[0], 0);
    }
}
