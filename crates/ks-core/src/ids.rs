use core::fmt;
use core::num::NonZeroU32;

/// Compact, stable identifier for trajectory phases.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Create an Id from a 0-based index by storing index+1.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// Recover the 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

pub type PhaseId = Id;

/// Ordered pair of adjacent phases; a junction sits between `pre`'s last
/// node and `post`'s first node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhasePair {
    pub pre: PhaseId,
    pub post: PhaseId,
}

impl PhasePair {
    pub fn new(pre: PhaseId, post: PhaseId) -> Self {
        Self { pre, post }
    }

    /// Junction between phase `k` and phase `k + 1`.
    pub fn consecutive(pre_index: u32) -> Self {
        Self {
            pre: Id::from_index(pre_index),
            post: Id::from_index(pre_index + 1),
        }
    }
}

impl fmt::Display for PhasePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.pre, self.post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_u32, 1, 2, 42, 10_000] {
            let id = Id::from_index(i);
            assert_eq!(id.index(), i);
        }
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<Id>(),
            core::mem::size_of::<Option<Id>>()
        );
    }

    #[test]
    fn consecutive_pair_display() {
        let pair = PhasePair::consecutive(2);
        assert_eq!(pair.pre.index(), 2);
        assert_eq!(pair.post.index(), 3);
        assert_eq!(pair.to_string(), "2->3");
    }
}
