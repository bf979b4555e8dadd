//! The types module contains the claim types of the fault dispute game.

use crate::{FaultError, Position};
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

/// The raw `claimData` tuple returned by the `FaultDisputeGame` contract:
/// `(uint32 parentIndex, bool countered, bytes32 claim, uint128 position, uint128 clock)`.
pub type RawClaimData = (u32, bool, [u8; 32], u128, u128);

/// The parent index stored on-chain for the root claim.
pub const ROOT_PARENT_INDEX: u32 = u32::MAX;

/// The [Clock] struct represents a clock that is used to track the duration and timestamp of a
/// given [Claim] within the game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clock {
    /// The duration accumulated on the chess clock.
    pub duration: u64,
    /// The timestamp at which the clock was last updated.
    pub timestamp: u64,
}

impl Clock {
    /// Unpacks a [Clock] from its on-chain representation, `duration << 64 | timestamp`.
    pub fn from_packed(packed: u128) -> Self {
        Self {
            duration: (packed >> 64) as u64,
            timestamp: packed as u64,
        }
    }

    /// Packs the [Clock] into its on-chain representation.
    pub fn packed(&self) -> u128 {
        ((self.duration as u128) << 64) | self.timestamp as u128
    }
}

/// The [ClaimData] struct is the core of a claim: a commitment at a position in the game tree.
/// A `(value, position)` pair is unique within a single game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimData {
    /// The commitment to the trace at the position.
    pub value: H256,
    /// The position of the claim within the game tree.
    pub position: Position,
}

impl ClaimData {
    /// Creates a new [ClaimData].
    pub fn new(value: H256, position: Position) -> Self {
        Self { value, position }
    }

    /// Returns the claim value as a fixed size byte array.
    pub fn value_bytes(&self) -> [u8; 32] {
        self.value.to_fixed_bytes()
    }
}

/// The [Claim] struct extends [ClaimData] with its relation to the rest of the game. Parent and
/// child relations are indices into the game's claim list rather than references.
///
/// `countered`, `clock` and the contract indices mirror the on-chain game. They are only ever set
/// when a snapshot is read from the contract, see [Claim::from_contract].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    /// The value and position of the claim.
    pub data: ClaimData,
    /// Whether or not the claim has been countered.
    pub countered: bool,
    /// The clock of the claim.
    pub clock: Clock,
    /// The index of the claim within the contract. `None` for claims that have not made it
    /// on-chain.
    pub contract_index: Option<usize>,
    /// The index of the parent claim within the contract. `None` for the root claim, where the
    /// parent is meaningless.
    pub parent_contract_index: Option<usize>,
}

impl Claim {
    /// Creates a local-only [Claim] that has not been posted to the contract.
    pub fn new(value: H256, position: Position) -> Self {
        Self {
            data: ClaimData::new(value, position),
            ..Default::default()
        }
    }

    /// Decodes a [Claim] from the `claimData` tuple stored at `index` within the contract.
    ///
    /// ### Takes
    /// - `index`: The index of the claim within the contract.
    /// - `raw`: The `(parentIndex, countered, claim, position, clock)` tuple.
    ///
    /// ### Returns
    /// - `Ok(Claim)`: The decoded claim.
    /// - `Err(FaultError)`: The position is not a valid generalized index, or the root position
    ///   is paired with a parent (or vice versa).
    pub fn from_contract(index: usize, raw: RawClaimData) -> Result<Self, FaultError> {
        let (parent_index, countered, value, position, clock) = raw;
        let position = Position::from_gindex(U256::from(position))?;
        let parent_contract_index =
            (parent_index != ROOT_PARENT_INDEX).then_some(parent_index as usize);

        if position.is_root_position() != parent_contract_index.is_none() {
            return Err(FaultError::CorruptedGame(format!(
                "claim {index} at position {position} has parent index {parent_index}"
            )));
        }

        Ok(Self {
            data: ClaimData::new(H256::from(value), position),
            countered,
            clock: Clock::from_packed(clock),
            contract_index: Some(index),
            parent_contract_index,
        })
    }

    /// Returns the commitment of the claim.
    pub fn value(&self) -> H256 {
        self.data.value
    }

    /// Returns the position of the claim.
    pub fn position(&self) -> Position {
        self.data.position
    }

    /// Returns the depth of the claim's position.
    pub fn depth(&self) -> u64 {
        self.data.position.depth()
    }

    /// Returns true if this claim is the root claim.
    pub fn is_root(&self) -> bool {
        self.data.position.is_root_position()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clock_packing() {
        let clock = Clock {
            duration: 300,
            timestamp: 1_700_000_000,
        };
        assert_eq!(Clock::from_packed(clock.packed()), clock);
        assert_eq!(clock.packed() >> 64, 300);
    }

    #[test]
    fn root_claim_from_contract() {
        let claim = Claim::from_contract(0, (u32::MAX, false, [0xaa; 32], 1, 5)).unwrap();
        assert!(claim.is_root());
        assert_eq!(claim.parent_contract_index, None);
        assert_eq!(claim.contract_index, Some(0));
        assert_eq!(claim.value(), H256::repeat_byte(0xaa));
        assert_eq!(claim.clock.timestamp, 5);
    }

    #[test]
    fn child_claim_from_contract() {
        let claim = Claim::from_contract(3, (1, true, [0xbb; 32], 5, 0)).unwrap();
        assert!(!claim.is_root());
        assert!(claim.countered);
        assert_eq!(claim.position(), Position::new(2, 1).unwrap());
        assert_eq!(claim.parent_contract_index, Some(1));
    }

    #[test]
    fn inconsistent_root_rejected() {
        // The root position with a parent.
        assert!(matches!(
            Claim::from_contract(1, (0, false, [0; 32], 1, 0)),
            Err(FaultError::CorruptedGame(_))
        ));
        // A non-root position without a parent.
        assert!(matches!(
            Claim::from_contract(1, (u32::MAX, false, [0; 32], 2, 0)),
            Err(FaultError::CorruptedGame(_))
        ));
        // A zero generalized index.
        assert!(matches!(
            Claim::from_contract(0, (u32::MAX, false, [0; 32], 0, 0)),
            Err(FaultError::InvalidGIndex(_))
        ));
    }

    #[test]
    fn is_root_agrees_with_position() {
        let root = Claim::new(H256::repeat_byte(1), Position::root());
        let child = Claim::new(H256::repeat_byte(1), Position::new(1, 1).unwrap());
        assert_eq!(root.is_root(), root.position().is_root_position());
        assert_eq!(child.is_root(), child.position().is_root_position());
        assert!(root.is_root());
        assert!(!child.is_root());
    }
}
