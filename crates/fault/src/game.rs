//! The game module holds the [Game] trait and [GameState], the local mirror of an on-chain fault
//! dispute game's claim tree.

use crate::{Claim, ClaimData, FaultError, RawClaimData};
use ethers::types::U256;
use std::collections::HashSet;

/// The [Game] trait defines the read-only view of a local copy of an on-chain fault dispute game.
pub trait Game: Send + Sync {
    /// Returns all claims of the game, ordered by contract index.
    fn claims(&self) -> &[Claim];

    /// Returns the claim at the given contract index, if it exists.
    fn claim(&self, index: usize) -> Option<&Claim>;

    /// Returns the root claim of the game.
    fn root_claim(&self) -> &Claim;

    /// Fetch the parent of the given [Claim].
    ///
    /// ### Returns
    /// - `Ok(&Claim)`: The parent claim.
    /// - `Err(FaultError)`: The claim is the root claim, or its parent is not part of the game.
    fn get_parent(&self, claim: &Claim) -> Result<&Claim, FaultError>;

    /// Returns true if the [Claim] is a defense of its parent, i.e. it sits at the right child of
    /// its parent's position. The root claim defends nothing.
    fn defends_parent(&self, claim: &Claim) -> Result<bool, FaultError>;

    /// Returns true if a claim with the same value and position already exists in the game.
    fn is_duplicate(&self, claim: &Claim) -> bool;

    /// Returns true if the honest actor agrees with the level of the given [Claim]. When agreeing
    /// with the root claim, the even levels are agreed with; otherwise the odd levels are.
    fn agree_with_claim_level(&self, claim: &Claim, agree_with_root: bool) -> bool;

    /// Returns the maximum depth of the game tree.
    fn max_depth(&self) -> u64;

    /// Returns the depth at which the top game hands over to the bottom games, if the game is
    /// split.
    fn split_depth(&self) -> Option<u64>;

    /// Walks up from `claim` (inclusive) towards the root and returns the first claim at or above
    /// `depth` whose position commits to `trace_index` when evaluated at `depth`.
    fn ancestor_with_trace_index<'a>(
        &'a self,
        claim: &'a Claim,
        trace_index: U256,
        depth: u64,
    ) -> Result<Option<&'a Claim>, FaultError>;

    /// Walks up from `claim` (inclusive) towards the root and returns the claim at `depth`.
    fn ancestor_at_depth<'a>(
        &'a self,
        claim: &'a Claim,
        depth: u64,
    ) -> Result<&'a Claim, FaultError>;
}

/// The [GameState] is an arena of [Claim]s indexed by their contract index. Parent relations are
/// stored as indices into the arena.
///
/// A [GameState] is a snapshot of the contract; it is never mutated in place and is replaced as a
/// whole when the contract state is re-read.
#[derive(Debug, Clone)]
pub struct GameState {
    /// The claims of the game, ordered by contract index.
    claims: Vec<Claim>,
    /// The set of `(value, position)` pairs within the game.
    claim_set: HashSet<ClaimData>,
    /// The maximum depth of the game tree.
    max_depth: u64,
    /// The split depth of the game tree, if the game is split.
    split_depth: Option<u64>,
}

impl GameState {
    /// Creates a new [GameState] from a snapshot of the contract's claims.
    ///
    /// ### Takes
    /// - `claims`: The claims of the game, ordered by contract index.
    /// - `max_depth`: The maximum depth of the game tree.
    ///
    /// ### Returns
    /// - `Ok(GameState)`: The validated game state.
    /// - `Err(FaultError::CorruptedGame)`: The snapshot is not a valid claim tree.
    pub fn new(claims: Vec<Claim>, max_depth: u64) -> Result<Self, FaultError> {
        Self::build(claims, max_depth, None)
    }

    /// Creates a new split [GameState] where the top game ends at `split_depth`.
    pub fn with_split_depth(
        claims: Vec<Claim>,
        max_depth: u64,
        split_depth: u64,
    ) -> Result<Self, FaultError> {
        if split_depth >= max_depth {
            return Err(FaultError::CorruptedGame(format!(
                "split depth {split_depth} must be smaller than max depth {max_depth}"
            )));
        }
        Self::build(claims, max_depth, Some(split_depth))
    }

    /// Decodes a [GameState] from the raw `claimData` tuples of the contract.
    pub fn from_contract(
        raw: impl IntoIterator<Item = RawClaimData>,
        max_depth: u64,
        split_depth: Option<u64>,
    ) -> Result<Self, FaultError> {
        let claims = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| Claim::from_contract(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        match split_depth {
            Some(split_depth) => Self::with_split_depth(claims, max_depth, split_depth),
            None => Self::new(claims, max_depth),
        }
    }

    fn build(
        claims: Vec<Claim>,
        max_depth: u64,
        split_depth: Option<u64>,
    ) -> Result<Self, FaultError> {
        let corrupted = |msg: String| {
            tracing::warn!(target: "game-state", "Rejecting claim snapshot: {}", msg);
            FaultError::CorruptedGame(msg)
        };

        let root = claims
            .first()
            .ok_or_else(|| corrupted("the game has no root claim".to_string()))?;
        if !root.is_root() || root.parent_contract_index.is_some() {
            return Err(corrupted(format!(
                "claim 0 at position {} is not a root claim",
                root.position()
            )));
        }

        let mut claim_set = HashSet::with_capacity(claims.len());
        for (index, claim) in claims.iter().enumerate() {
            if claim.contract_index != Some(index) {
                return Err(corrupted(format!(
                    "claim {index} has contract index {:?}",
                    claim.contract_index
                )));
            }
            if claim.depth() > max_depth {
                return Err(corrupted(format!(
                    "claim {index} at depth {} exceeds max depth {max_depth}",
                    claim.depth()
                )));
            }
            if index > 0 {
                let parent = claim
                    .parent_contract_index
                    .filter(|parent| *parent < index)
                    .and_then(|parent| claims.get(parent))
                    .ok_or_else(|| {
                        corrupted(format!(
                            "claim {index} has invalid parent {:?}",
                            claim.parent_contract_index
                        ))
                    })?;
                if parent.depth() + 1 != claim.depth() {
                    return Err(corrupted(format!(
                        "claim {index} at {} is not one level below its parent at {}",
                        claim.position(),
                        parent.position()
                    )));
                }
                if claim.position().parent().ok() != Some(parent.position()) {
                    return Err(corrupted(format!(
                        "claim {index} at {} is not a child of its parent at {}",
                        claim.position(),
                        parent.position()
                    )));
                }
            }
            if !claim_set.insert(claim.data) {
                return Err(corrupted(format!(
                    "claim {index} duplicates value {:?} at {}",
                    claim.value(),
                    claim.position()
                )));
            }
        }

        tracing::debug!(target: "game-state", "Loaded game state with {} claims, max depth {}", claims.len(), max_depth);
        Ok(Self {
            claims,
            claim_set,
            max_depth,
            split_depth,
        })
    }
}

impl Game for GameState {
    fn claims(&self) -> &[Claim] {
        &self.claims
    }

    fn claim(&self, index: usize) -> Option<&Claim> {
        self.claims.get(index)
    }

    fn root_claim(&self) -> &Claim {
        // The constructor guarantees a root claim at index 0.
        &self.claims[0]
    }

    fn get_parent(&self, claim: &Claim) -> Result<&Claim, FaultError> {
        if claim.is_root() {
            return Err(FaultError::RootHasNoParent);
        }
        claim
            .parent_contract_index
            .and_then(|index| self.claims.get(index))
            .ok_or(FaultError::ParentNotFound(claim.parent_contract_index))
    }

    fn defends_parent(&self, claim: &Claim) -> Result<bool, FaultError> {
        if claim.is_root() {
            return Ok(false);
        }
        self.get_parent(claim)?;
        Ok(claim.position().index_at_depth().bit(0))
    }

    fn is_duplicate(&self, claim: &Claim) -> bool {
        self.claim_set.contains(&claim.data)
    }

    fn agree_with_claim_level(&self, claim: &Claim, agree_with_root: bool) -> bool {
        let is_odd_level = claim.depth() % 2 == 1;
        if agree_with_root {
            !is_odd_level
        } else {
            is_odd_level
        }
    }

    fn max_depth(&self) -> u64 {
        self.max_depth
    }

    fn split_depth(&self) -> Option<u64> {
        self.split_depth
    }

    fn ancestor_with_trace_index<'a>(
        &'a self,
        claim: &'a Claim,
        trace_index: U256,
        depth: u64,
    ) -> Result<Option<&'a Claim>, FaultError> {
        let mut current = claim;
        loop {
            if current.depth() <= depth && current.position().trace_index(depth)? == trace_index {
                return Ok(Some(current));
            }
            if current.is_root() {
                return Ok(None);
            }
            current = self.get_parent(current)?;
        }
    }

    fn ancestor_at_depth<'a>(
        &'a self,
        claim: &'a Claim,
        depth: u64,
    ) -> Result<&'a Claim, FaultError> {
        if claim.depth() < depth {
            return Err(FaultError::PositionDepthTooSmall {
                depth: claim.depth(),
                ancestor_depth: depth,
            });
        }
        let mut current = claim;
        while current.depth() > depth {
            current = self.get_parent(current)?;
        }
        Ok(current)
    }
}
