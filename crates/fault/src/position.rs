//! The position module holds the [Position] type, a node within the binary game tree.

use crate::FaultError;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The deepest depth a [Position] may have while its generalized index still fits within a single
/// 256 bit word.
pub const MAX_POSITION_DEPTH: u64 = 255;

/// The [Position] type represents a node within the game tree as a `(depth, index_at_depth)` pair.
/// Its "Generalized Index" is calculated as `2^{depth} + index_at_depth`.
///
/// A [Position] can only be constructed with `index_at_depth < 2^{depth}`, so the root is always
/// `(0, 0)`. It serializes as its generalized index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "U256", into = "U256")]
pub struct Position {
    depth: u64,
    index_at_depth: U256,
}

impl Position {
    /// Creates a new [Position] at the given depth and index at depth.
    ///
    /// ### Takes
    /// - `depth`: The depth of the position within the tree.
    /// - `index_at_depth`: The index of the position at its depth.
    ///
    /// ### Returns
    /// - `Ok(Position)`: The validated position.
    /// - `Err(FaultError::InvalidPosition)`: The depth is too large or the index does not fit.
    pub fn new(depth: u64, index_at_depth: impl Into<U256>) -> Result<Self, FaultError> {
        let index_at_depth = index_at_depth.into();
        if depth > MAX_POSITION_DEPTH || index_at_depth >= U256::one() << depth {
            return Err(FaultError::InvalidPosition {
                depth,
                index: index_at_depth,
            });
        }
        Ok(Self {
            depth,
            index_at_depth,
        })
    }

    /// Returns the root [Position] of the game tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Decodes a [Position] from its generalized index.
    pub fn from_gindex(gindex: U256) -> Result<Self, FaultError> {
        if gindex.is_zero() {
            return Err(FaultError::InvalidGIndex(gindex));
        }
        let depth = gindex.bits() as u64 - 1;
        Ok(Self {
            depth,
            index_at_depth: gindex - (U256::one() << depth),
        })
    }

    /// Encodes the [Position] as its generalized index, `2^{depth} + index_at_depth`.
    pub fn to_gindex(&self) -> U256 {
        (U256::one() << self.depth) + self.index_at_depth
    }

    /// Returns the depth of the [Position] within the tree.
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Returns the index at depth of the [Position] within the tree.
    pub fn index_at_depth(&self) -> U256 {
        self.index_at_depth
    }

    /// Returns true if the [Position] is the root of the tree.
    pub fn is_root_position(&self) -> bool {
        self.depth == 0 && self.index_at_depth.is_zero()
    }

    /// Returns the parent [Position] relative to the current [Position].
    pub fn parent(&self) -> Result<Self, FaultError> {
        if self.depth == 0 {
            return Err(FaultError::RootHasNoParent);
        }
        Ok(Self {
            depth: self.depth - 1,
            index_at_depth: self.index_at_depth >> 1u32,
        })
    }

    /// Returns the left child [Position] relative to the current [Position].
    pub fn left_child(&self) -> Result<Self, FaultError> {
        if self.depth >= MAX_POSITION_DEPTH {
            return Err(FaultError::DepthOverflow(self.depth));
        }
        Ok(Self {
            depth: self.depth + 1,
            index_at_depth: self.index_at_depth << 1u32,
        })
    }

    /// Returns the right child [Position] relative to the current [Position].
    pub fn right_child(&self) -> Result<Self, FaultError> {
        let left = self.left_child()?;
        Ok(Self {
            index_at_depth: left.index_at_depth | U256::one(),
            ..left
        })
    }

    /// Returns the [Position] to the right of the current one at the same depth.
    pub fn move_right(&self) -> Result<Self, FaultError> {
        Self::new(self.depth, self.index_at_depth + 1u64)
    }

    /// Returns the position of an attack against a claim at the current [Position].
    ///
    /// ### Returns
    /// - `Ok(Position)`: The left child of the current position.
    /// - `Err(FaultError::GameDepthReached)`: The current position is at or below `max_depth`,
    ///   the dispute must be settled with a step.
    pub fn attack(&self, max_depth: u64) -> Result<Self, FaultError> {
        self.check_move(max_depth)?;
        self.left_child()
    }

    /// Returns the position of a defense of a claim at the current [Position]. The defense
    /// always lands one level deeper at an odd index.
    ///
    /// ### Returns
    /// - `Ok(Position)`: The right child of the current position.
    /// - `Err(FaultError::GameDepthReached)`: The current position is at or below `max_depth`,
    ///   the dispute must be settled with a step.
    pub fn defend(&self, max_depth: u64) -> Result<Self, FaultError> {
        self.check_move(max_depth)?;
        self.right_child()
    }

    /// Returns the relative [Position] for an attack or defense move against the current [Position].
    pub fn make_move(&self, is_attack: bool, max_depth: u64) -> Result<Self, FaultError> {
        if is_attack {
            self.attack(max_depth)
        } else {
            self.defend(max_depth)
        }
    }

    /// Returns the rightmost [Position] at `max_depth` that commits to the same trace index as the
    /// current [Position].
    pub fn right_index(&self, max_depth: u64) -> Result<Self, FaultError> {
        if self.depth > max_depth {
            return Err(FaultError::PositionDepthTooLarge {
                depth: self.depth,
                max_depth,
            });
        }
        if max_depth > MAX_POSITION_DEPTH {
            return Err(FaultError::DepthOverflow(max_depth));
        }
        let remaining = max_depth - self.depth;
        Ok(Self {
            depth: max_depth,
            index_at_depth: (self.index_at_depth << remaining)
                | ((U256::one() << remaining) - U256::one()),
        })
    }

    /// Returns the trace index that the current [Position] commits to.
    pub fn trace_index(&self, max_depth: u64) -> Result<U256, FaultError> {
        Ok(self.right_index(max_depth)?.index_at_depth)
    }

    /// Returns the [Position] relative to its ancestor at `ancestor_depth`, as if that ancestor
    /// were the root of its own tree.
    pub fn relative_to_ancestor_at_depth(&self, ancestor_depth: u64) -> Result<Self, FaultError> {
        if ancestor_depth > self.depth {
            return Err(FaultError::PositionDepthTooSmall {
                depth: self.depth,
                ancestor_depth,
            });
        }
        let depth = self.depth - ancestor_depth;
        let nodes_at_depth = U256::one() << depth;
        Ok(Self {
            depth,
            index_at_depth: self.index_at_depth % nodes_at_depth,
        })
    }

    /// Returns the ancestor of the current [Position] at `ancestor_depth`. A position is its own
    /// ancestor at its own depth.
    pub fn ancestor_at_depth(&self, ancestor_depth: u64) -> Result<Self, FaultError> {
        if ancestor_depth > self.depth {
            return Err(FaultError::PositionDepthTooSmall {
                depth: self.depth,
                ancestor_depth,
            });
        }
        Ok(Self {
            depth: ancestor_depth,
            index_at_depth: self.index_at_depth >> (self.depth - ancestor_depth),
        })
    }

    fn check_move(&self, max_depth: u64) -> Result<(), FaultError> {
        if self.depth >= max_depth {
            return Err(FaultError::GameDepthReached {
                depth: self.depth,
                max_depth,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.depth,
            self.index_at_depth,
            self.to_gindex()
        )
    }
}

impl From<Position> for U256 {
    fn from(position: Position) -> Self {
        position.to_gindex()
    }
}

impl TryFrom<U256> for Position {
    type Error = FaultError;

    fn try_from(gindex: U256) -> Result<Self, Self::Error> {
        Self::from_gindex(gindex)
    }
}

#[cfg(test)]
mod test {
    use super::{Position, MAX_POSITION_DEPTH};
    use crate::FaultError;
    use ethers::types::U256;

    /// A helper struct for testing the [Position] arithmetic.
    /// 0. `u64` - `depth`
    /// 1. `u64` - `index_at_depth`
    /// 2. `u64` - `right_index` (generalized index)
    /// 3. `u64` - `trace_index`
    struct PositionMetaData(u64, u64, u64, u64);

    const MAX_DEPTH: u64 = 4;
    const EXPECTED_VALUES: &[PositionMetaData] = &[
        PositionMetaData(0, 0, 31, 15),
        PositionMetaData(1, 0, 23, 7),
        PositionMetaData(1, 1, 31, 15),
        PositionMetaData(2, 0, 19, 3),
        PositionMetaData(2, 1, 23, 7),
        PositionMetaData(2, 2, 27, 11),
        PositionMetaData(2, 3, 31, 15),
        PositionMetaData(3, 0, 17, 1),
        PositionMetaData(3, 1, 19, 3),
        PositionMetaData(3, 2, 21, 5),
        PositionMetaData(3, 3, 23, 7),
        PositionMetaData(3, 4, 25, 9),
        PositionMetaData(3, 5, 27, 11),
        PositionMetaData(3, 6, 29, 13),
        PositionMetaData(3, 7, 31, 15),
        PositionMetaData(4, 0, 16, 0),
        PositionMetaData(4, 1, 17, 1),
        PositionMetaData(4, 2, 18, 2),
        PositionMetaData(4, 3, 19, 3),
        PositionMetaData(4, 4, 20, 4),
        PositionMetaData(4, 5, 21, 5),
        PositionMetaData(4, 6, 22, 6),
        PositionMetaData(4, 7, 23, 7),
        PositionMetaData(4, 8, 24, 8),
        PositionMetaData(4, 9, 25, 9),
        PositionMetaData(4, 10, 26, 10),
        PositionMetaData(4, 11, 27, 11),
        PositionMetaData(4, 12, 28, 12),
        PositionMetaData(4, 13, 29, 13),
        PositionMetaData(4, 14, 30, 14),
        PositionMetaData(4, 15, 31, 15),
    ];

    #[test]
    fn position_correctness_static() {
        for (p, v) in EXPECTED_VALUES.iter().enumerate() {
            let pos = Position::from_gindex(U256::from(p + 1)).unwrap();
            assert_eq!(pos.depth(), v.0);
            assert_eq!(pos.index_at_depth(), U256::from(v.1));
            let r = pos.right_index(MAX_DEPTH).unwrap();
            assert_eq!(r.to_gindex(), U256::from(v.2));
            assert_eq!(pos.trace_index(MAX_DEPTH).unwrap(), U256::from(v.3));
        }
    }

    #[test]
    fn gindex_round_trip() {
        for gindex in 1u64..512 {
            let pos = Position::from_gindex(U256::from(gindex)).unwrap();
            assert_eq!(pos.to_gindex(), U256::from(gindex));
            assert_eq!(Position::new(pos.depth(), pos.index_at_depth()).unwrap(), pos);
        }

        // The deepest representable position still fits in a single word.
        let deepest = Position::new(MAX_POSITION_DEPTH, U256::MAX >> 1).unwrap();
        assert_eq!(deepest.to_gindex(), U256::MAX);
        assert_eq!(Position::from_gindex(U256::MAX).unwrap(), deepest);
    }

    #[test]
    fn gindex_zero_rejected() {
        assert_eq!(
            Position::from_gindex(U256::zero()),
            Err(FaultError::InvalidGIndex(U256::zero()))
        );
    }

    #[test]
    fn invalid_positions_rejected() {
        assert!(Position::new(0, 1).is_err());
        assert!(Position::new(3, 8).is_err());
        assert!(Position::new(MAX_POSITION_DEPTH + 1, 0).is_err());
        assert!(Position::new(3, 7).is_ok());
    }

    #[test]
    fn parent_of_children() {
        for gindex in 1u64..256 {
            let pos = Position::from_gindex(U256::from(gindex)).unwrap();
            assert_eq!(pos.left_child().unwrap().parent().unwrap(), pos);
            assert_eq!(pos.right_child().unwrap().parent().unwrap(), pos);
        }
        assert_eq!(Position::root().parent(), Err(FaultError::RootHasNoParent));
    }

    #[test]
    fn children_at_max_position_depth_overflow() {
        let pos = Position::new(MAX_POSITION_DEPTH, 0).unwrap();
        assert_eq!(
            pos.left_child(),
            Err(FaultError::DepthOverflow(MAX_POSITION_DEPTH))
        );
    }

    #[test]
    fn root_position() {
        assert!(Position::root().is_root_position());
        assert!(Position::new(0, 0).unwrap().is_root_position());
        assert!(!Position::new(1, 0).unwrap().is_root_position());
        assert_eq!(Position::root().to_gindex(), U256::one());
    }

    #[test]
    fn attack_and_defend_root() {
        let root = Position::root();
        let attack = root.attack(MAX_DEPTH).unwrap();
        let defend = root.defend(MAX_DEPTH).unwrap();
        assert_eq!(attack, Position::new(1, 0).unwrap());
        assert_eq!(defend, Position::new(1, 1).unwrap());
        assert_eq!(root.make_move(true, MAX_DEPTH).unwrap(), attack);
        assert_eq!(root.make_move(false, MAX_DEPTH).unwrap(), defend);
    }

    #[test]
    fn attack_and_defend_are_distinct() {
        for gindex in 1u64..16 {
            let pos = Position::from_gindex(U256::from(gindex)).unwrap();
            let attack = pos.attack(MAX_DEPTH).unwrap();
            let defend = pos.defend(MAX_DEPTH).unwrap();
            assert_ne!(attack, defend);
            assert_eq!(defend.depth(), pos.depth() + 1);
            assert!(defend.index_at_depth().bit(0));
        }
    }

    #[test]
    fn move_at_max_depth_fails() {
        let leaf = Position::new(MAX_DEPTH, 5).unwrap();
        let expected = FaultError::GameDepthReached {
            depth: MAX_DEPTH,
            max_depth: MAX_DEPTH,
        };
        assert_eq!(leaf.attack(MAX_DEPTH), Err(expected.clone()));
        assert_eq!(leaf.defend(MAX_DEPTH), Err(expected));
    }

    #[test]
    fn trace_index_below_max_depth_fails() {
        let pos = Position::new(5, 0).unwrap();
        assert!(matches!(
            pos.trace_index(MAX_DEPTH),
            Err(FaultError::PositionDepthTooLarge { .. })
        ));
    }

    #[test]
    fn relative_to_ancestor() {
        let pos = Position::new(4, 13).unwrap();
        assert_eq!(
            pos.relative_to_ancestor_at_depth(2).unwrap(),
            Position::new(2, 1).unwrap()
        );
        assert_eq!(pos.relative_to_ancestor_at_depth(0).unwrap(), pos);
        assert_eq!(
            pos.relative_to_ancestor_at_depth(4).unwrap(),
            Position::root()
        );
        assert!(matches!(
            pos.relative_to_ancestor_at_depth(5),
            Err(FaultError::PositionDepthTooSmall { .. })
        ));
    }

    #[test]
    fn ancestor_at_depth() {
        let pos = Position::new(4, 13).unwrap();
        assert_eq!(pos.ancestor_at_depth(2).unwrap(), Position::new(2, 3).unwrap());
        assert_eq!(pos.ancestor_at_depth(0).unwrap(), Position::root());
        assert_eq!(pos.ancestor_at_depth(4).unwrap(), pos);
        assert_eq!(
            pos.ancestor_at_depth(3).unwrap(),
            pos.parent().unwrap()
        );
        assert!(pos.ancestor_at_depth(5).is_err());
    }

    #[test]
    fn move_right_stays_in_bounds() {
        let pos = Position::new(2, 2).unwrap();
        assert_eq!(pos.move_right().unwrap(), Position::new(2, 3).unwrap());
        assert!(pos.move_right().unwrap().move_right().is_err());
    }
}
