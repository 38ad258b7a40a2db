//! Identifier types for neurons, groups and connections

use core::fmt;

/// Unique identifier for a neuron (regular or Poisson generator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeuronId(pub u32);

impl NeuronId {
    /// Create a new neuron ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Get the ID as a `usize` index into flat per-neuron arrays
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl From<u32> for NeuronId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Unique identifier for a neuron group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Create a new group ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Get the ID as a `usize` index
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Invalid group ID constant, used to flag an unresolved lookup
    pub const INVALID: Self = Self(u32::MAX);

    /// Check if this is a valid group ID
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

impl From<u32> for GroupId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for a (pre-group, post-group) connection bundle, used to index
/// `mulSynFast`/`mulSynSlow` scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Create a new connection ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Get the ID as a `usize` index
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use serde::{Deserialize, Serialize};

    macro_rules! serde_newtype_u32 {
        ($ty:ty) => {
            impl Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    self.0.serialize(serializer)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let id = u32::deserialize(deserializer)?;
                    Ok(<$ty>::new(id))
                }
            }
        };
    }

    serde_newtype_u32!(NeuronId);
    serde_newtype_u32!(GroupId);
    serde_newtype_u32!(ConnectionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neuron_id() {
        let id = NeuronId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{}", id), "N42");
    }

    #[test]
    fn test_group_id_invalid() {
        assert!(!GroupId::INVALID.is_valid());
        assert!(GroupId::new(0).is_valid());
    }

    #[test]
    fn test_ordering() {
        let a = NeuronId::new(1);
        let b = NeuronId::new(2);
        assert!(a < b);
    }
}