//! Static-load partitioning: maps neurons to fixed-width work chunks.
//!
//! On the accelerator this spec targets, each chunk is one block's worth of
//! work; the sequential host driver in this crate just iterates the chunk
//! list in order (see the REDESIGN note in `simulation.rs`), and the
//! `parallel` feature hands the same list to `rayon` instead of a grid.

use crate::GroupId;

/// One contiguous slice of a single group's neurons, sized to fit in one
/// work chunk (`startNeuron`, `sizeInChunk`, `groupId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadBalanceChunk {
    /// First neuron id in this chunk.
    pub start_neuron: u32,
    /// Number of neurons in this chunk.
    pub size: u32,
    /// Group every neuron in this chunk belongs to.
    pub group_id: GroupId,
}

impl LoadBalanceChunk {
    /// Neuron id range covered by this chunk.
    pub fn range(&self) -> std::ops::Range<u32> {
        self.start_neuron..(self.start_neuron + self.size)
    }
}

/// Build the static-load partition table for a set of `(start, size)` group
/// ranges, given a fixed chunk width. Chunks never cross group boundaries:
/// a group whose size isn't a multiple of `buf_size` ends with a short
/// chunk rather than spilling into the next group.
///
/// `groups` must be given in ascending, non-overlapping neuron-id order;
/// this is the network builder's responsibility, not this function's.
pub fn build_load_balance(
    groups: &[(GroupId, u32, u32)],
    buf_size: u32,
) -> Vec<LoadBalanceChunk> {
    assert!(buf_size > 0, "buf_size must be > 0");

    let mut chunks = Vec::new();
    for &(group_id, start, size) in groups {
        let mut offset = 0;
        while offset < size {
            let chunk_size = buf_size.min(size - offset);
            chunks.push(LoadBalanceChunk {
                start_neuron: start + offset,
                size: chunk_size,
                group_id,
            });
            offset += chunk_size;
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_group_exact_multiple() {
        let groups = vec![(GroupId::new(0), 0, 8)];
        let chunks = build_load_balance(&groups, 4);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_neuron, 0);
        assert_eq!(chunks[0].size, 4);
        assert_eq!(chunks[1].start_neuron, 4);
        assert_eq!(chunks[1].size, 4);
    }

    #[test]
    fn test_group_with_remainder_gets_short_chunk() {
        let groups = vec![(GroupId::new(0), 0, 10)];
        let chunks = build_load_balance(&groups, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].size, 2);
    }

    #[test]
    fn test_chunks_never_cross_group_boundary() {
        let groups = vec![(GroupId::new(0), 0, 5), (GroupId::new(1), 5, 5)];
        let chunks = build_load_balance(&groups, 4);
        for chunk in &chunks {
            assert!(chunk.range().end <= 10);
        }
        assert!(chunks.iter().all(|c| {
            if c.group_id == GroupId::new(0) {
                c.start_neuron + c.size <= 5
            } else {
                c.start_neuron >= 5
            }
        }));
    }

    #[test]
    fn test_covers_every_neuron_exactly_once() {
        let groups = vec![(GroupId::new(0), 0, 7), (GroupId::new(1), 7, 13)];
        let chunks = build_load_balance(&groups, 5);
        let mut covered: Vec<u32> = chunks.iter().flat_map(|c| c.range()).collect();
        covered.sort_unstable();
        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(covered, expected);
    }
}
