//! The error module contains the [FaultError] type, the set of failures that callers of this crate
//! are expected to match on.

use ethers::types::U256;
use thiserror::Error;

/// The [FaultError] enum represents the recoverable, typed failure cases of the fault dispute game
/// primitives. Async boundaries return [anyhow::Error]; these variants can be recovered from it
/// with [anyhow::Error::downcast_ref].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultError {
    /// A move was requested from a position at the maximum depth of the game. The caller must
    /// perform a step instead of bisecting further.
    #[error("game depth reached: position depth {depth}, max depth {max_depth}")]
    GameDepthReached { depth: u64, max_depth: u64 },
    /// The index at depth does not fit within the depth.
    #[error("invalid position: index {index} at depth {depth}")]
    InvalidPosition { depth: u64, index: U256 },
    /// A generalized index of zero does not describe any node.
    #[error("invalid generalized index: {0}")]
    InvalidGIndex(U256),
    /// The position lies deeper than the depth it is being evaluated at.
    #[error("position depth {depth} exceeds max depth {max_depth}")]
    PositionDepthTooLarge { depth: u64, max_depth: u64 },
    /// The requested ancestor lies deeper than the position itself.
    #[error("position depth {depth} is smaller than ancestor depth {ancestor_depth}")]
    PositionDepthTooSmall { depth: u64, ancestor_depth: u64 },
    /// A child position would no longer fit within a 256 bit generalized index.
    #[error("depth overflow: cannot descend below depth {0}")]
    DepthOverflow(u64),
    /// The root position has no parent.
    #[error("the root position has no parent")]
    RootHasNoParent,
    /// The trace index is outside of the provider's trace.
    #[error("trace index {index} out of range, trace length {len}")]
    IndexOutOfRange { index: U256, len: U256 },
    /// The oracle key is empty and carries no type byte.
    #[error("empty oracle key")]
    EmptyOracleKey,
    /// The oracle key identifier does not fit within a 256 bit word.
    #[error("oracle key identifier is {0} bytes long, max 32")]
    OracleKeyTooLong(usize),
    /// Local oracle data must fit within the single word the oracle stores it in.
    #[error("local oracle data is {0} bytes long, max 32")]
    LocalDataTooLong(usize),
    /// The claim snapshot violates an invariant of the on-chain game.
    #[error("corrupted game state: {0}")]
    CorruptedGame(String),
    /// The parent of a claim is not present within the game.
    #[error("parent claim not found at index {0:?}")]
    ParentNotFound(Option<usize>),
    /// The reference claim sits above the split depth, so no bottom game can be selected.
    #[error("reference claim depth {depth} is above the split depth {split_depth}")]
    RefClaimNotDeepEnough { depth: u64, split_depth: u64 },
    /// No ancestor of the claim commits to the requested trace index.
    #[error("no ancestor commits to trace index {0}")]
    AncestorNotFound(U256),
    /// The position does not belong to the bottom game under the reference claim's top leaf.
    #[error("position {position} is not below the top leaf {top_leaf}")]
    PositionNotInSubGame { position: U256, top_leaf: U256 },
}
