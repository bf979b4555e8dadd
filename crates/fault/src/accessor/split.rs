//! The split module contains the [SplitTraceAccessor], the accessor of a game whose top layer
//! bisects over one trace and whose bottom layers each bisect over a sub-trace selected by the
//! top layer's claims.

use super::TraceAccessor;
use crate::{
    trace::{StepData, TraceProvider},
    Claim, FaultError, Game, LocalContextPreimage, Position,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{H256, U256};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// The [ProviderCreator] trait creates the [TraceProvider] of a bottom game.
#[async_trait]
pub trait ProviderCreator: Send + Sync {
    /// Creates the provider of the bottom game bracketed by `pre` and `post`.
    ///
    /// ### Takes
    /// - `local_context`: The local context of the bottom game.
    /// - `depth`: The depth of the bottom game's tree.
    /// - `pre`: The top game claim the bottom game starts from. Zero-valued when the bottom game
    ///   starts from the absolute prestate.
    /// - `post`: The top game claim the bottom game ends in.
    async fn create(
        &self,
        local_context: H256,
        depth: u64,
        pre: &Claim,
        post: &Claim,
    ) -> Result<Arc<dyn TraceProvider>>;
}

/// The provider a position resolves to, along with the trace index to query it at.
enum Selection<'a, T> {
    /// A position within the top game.
    Top { provider: &'a T, trace_index: U256 },
    /// A position within a bottom game.
    Bottom {
        provider: Arc<dyn TraceProvider>,
        local_context: H256,
        trace_index: U256,
    },
}

/// The [SplitTraceAccessor] serves positions at or above the split depth from the top provider
/// and positions below it from a bottom provider chosen by the reference claim's ancestor at the
/// split depth.
///
/// Bottom providers are created once per local context and shared between queries.
pub struct SplitTraceAccessor<T, C> {
    /// The provider of the top game.
    top: T,
    /// The creator of the bottom game providers.
    creator: C,
    /// The depth of the top game's leaves.
    split_depth: u64,
    /// The bottom game providers by local context.
    bottom: DashMap<H256, Arc<OnceCell<Arc<dyn TraceProvider>>>>,
}

impl<T, C> SplitTraceAccessor<T, C>
where
    T: TraceProvider,
    C: ProviderCreator,
{
    /// Creates a new [SplitTraceAccessor].
    pub fn new(top: T, creator: C, split_depth: u64) -> Self {
        Self {
            top,
            creator,
            split_depth,
            bottom: DashMap::new(),
        }
    }

    /// Returns the split depth of the accessor.
    pub fn split_depth(&self) -> u64 {
        self.split_depth
    }

    /// Returns the pre and post claims of the top game that bracket the bottom game `position`
    /// belongs to.
    ///
    /// The bottom game hangs below a top leaf, either as its attack (the left child) or as its
    /// defense (the right child). An attacked top leaf is the post state and the pre state is the
    /// closest ancestor committing to an earlier trace index, or the absolute prestate if there is
    /// none. A defended top leaf is the pre state and the post state is the closest ancestor
    /// committing to a later trace index.
    ///
    /// ### Takes
    /// - `game`: The game being played.
    /// - `reference`: A claim at or below the split depth, on the path to `position`.
    /// - `position`: A position below the split depth, below the reference claim's top leaf.
    pub fn bracket(
        &self,
        game: &dyn Game,
        reference: &Claim,
        position: Position,
    ) -> Result<LocalContextPreimage, FaultError> {
        let split_depth = self.split_depth;
        if reference.depth() < split_depth {
            return Err(FaultError::RefClaimNotDeepEnough {
                depth: reference.depth(),
                split_depth,
            });
        }

        let top_leaf = game.ancestor_at_depth(reference, split_depth)?;
        let sub_game_root = position.ancestor_at_depth(split_depth + 1)?;
        if sub_game_root.parent()? != top_leaf.position() {
            return Err(FaultError::PositionNotInSubGame {
                position: position.to_gindex(),
                top_leaf: top_leaf.position().to_gindex(),
            });
        }

        let defends_top_leaf = sub_game_root.index_at_depth().bit(0);
        if defends_top_leaf {
            let next = top_leaf
                .position()
                .trace_index(split_depth)?
                .saturating_add(U256::one());
            let post = nearest_ancestor(game, top_leaf, split_depth, true)?
                .ok_or(FaultError::AncestorNotFound(next))?;
            Ok(LocalContextPreimage::new(*top_leaf, *post))
        } else {
            let pre = nearest_ancestor(game, top_leaf, split_depth, false)?
                .copied()
                .unwrap_or_default();
            Ok(LocalContextPreimage::new(pre, *top_leaf))
        }
    }

    /// Returns the bottom provider for the given bracket, creating it on first use.
    async fn bottom_provider(
        &self,
        local_context: H256,
        depth: u64,
        bracket: &LocalContextPreimage,
    ) -> Result<Arc<dyn TraceProvider>> {
        let cell = Arc::clone(&self.bottom.entry(local_context).or_default());
        let provider = cell
            .get_or_try_init(|| {
                tracing::debug!(target: "trace-accessor", "Creating bottom provider for local context {:?}", local_context);
                self.creator
                    .create(local_context, depth, &bracket.pre, &bracket.post)
            })
            .await?;
        Ok(Arc::clone(provider))
    }

    /// Resolves the provider responsible for `position`.
    async fn select(
        &self,
        game: &dyn Game,
        reference: &Claim,
        position: Position,
    ) -> Result<Selection<'_, T>> {
        let split_depth = self.split_depth;
        let max_depth = game.max_depth();
        if let Some(game_split_depth) = game.split_depth() {
            if game_split_depth != split_depth {
                return Err(anyhow!(
                    "game split depth {} does not match accessor split depth {}",
                    game_split_depth,
                    split_depth
                ));
            }
        }
        if split_depth >= max_depth {
            return Err(anyhow!(
                "split depth {} must be smaller than max depth {}",
                split_depth,
                max_depth
            ));
        }

        if position.depth() <= split_depth {
            return Ok(Selection::Top {
                provider: &self.top,
                trace_index: position.trace_index(split_depth)?,
            });
        }

        let bracket = self.bracket(game, reference, position)?;
        let local_context = bracket.hash();
        let bottom_depth = max_depth - split_depth - 1;
        let trace_index = position
            .relative_to_ancestor_at_depth(split_depth + 1)?
            .trace_index(bottom_depth)?;
        let provider = self
            .bottom_provider(local_context, bottom_depth, &bracket)
            .await?;

        Ok(Selection::Bottom {
            provider,
            local_context,
            trace_index,
        })
    }
}

/// Walks the strict ancestors of `leaf` and returns the closest one committing to a trace index
/// right of the leaf's (`rightwards`) or left of it, picking the index nearest to the leaf's.
fn nearest_ancestor<'a>(
    game: &'a dyn Game,
    leaf: &'a Claim,
    depth: u64,
    rightwards: bool,
) -> Result<Option<&'a Claim>, FaultError> {
    let target = leaf.position().trace_index(depth)?;
    let mut best: Option<(U256, &'a Claim)> = None;
    let mut current = leaf;
    while !current.is_root() {
        current = game.get_parent(current)?;
        let index = current.position().trace_index(depth)?;
        let (candidate, closer) = if rightwards {
            (index > target, best.map_or(true, |(nearest, _)| index < nearest))
        } else {
            (index < target, best.map_or(true, |(nearest, _)| index > nearest))
        };
        if candidate && closer {
            best = Some((index, current));
        }
    }
    Ok(best.map(|(_, claim)| claim))
}

#[async_trait]
impl<T, C> TraceAccessor for SplitTraceAccessor<T, C>
where
    T: TraceProvider,
    C: ProviderCreator,
{
    async fn get(&self, game: &dyn Game, reference: &Claim, position: Position) -> Result<H256> {
        match self.select(game, reference, position).await? {
            Selection::Top {
                provider,
                trace_index,
            } => provider
                .get(trace_index)
                .await
                .with_context(|| {
                    format!(
                        "failed to fetch top claim at position {position}, trace index {trace_index}"
                    )
                }),
            Selection::Bottom {
                provider,
                local_context,
                trace_index,
            } => provider
                .get(trace_index)
                .await
                .with_context(|| {
                    format!(
                        "failed to fetch bottom claim at position {position}, trace index {trace_index}, local context {local_context:?}"
                    )
                }),
        }
    }

    async fn get_step_data(
        &self,
        game: &dyn Game,
        reference: &Claim,
        position: Position,
    ) -> Result<StepData> {
        match self.select(game, reference, position).await? {
            Selection::Top {
                provider,
                trace_index,
            } => provider
                .get_step_data(trace_index)
                .await
                .with_context(|| {
                    format!(
                        "failed to fetch top step data at position {position}, trace index {trace_index}"
                    )
                }),
            Selection::Bottom {
                provider,
                local_context,
                trace_index,
            } => {
                let step = provider
                    .get_step_data(trace_index)
                    .await
                    .with_context(|| {
                        format!(
                            "failed to fetch bottom step data at position {position}, trace index {trace_index}, local context {local_context:?}"
                        )
                    })?;
                tracing::debug!(target: "trace-accessor", "Fetched step data at position {} under local context {:?}", position, local_context);
                Ok(StepData {
                    preimage_data: step
                        .preimage_data
                        .map(|data| data.with_local_context(local_context)),
                    ..step
                })
            }
        }
    }
}
