//! The accessor module holds the [TraceAccessor] trait, which selects and queries the right
//! [TraceProvider](crate::TraceProvider) for a position of a game.

use crate::{trace::StepData, Claim, Game, Position};
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::H256;

mod flat;
pub use flat::FlatTraceAccessor;

mod split;
pub use split::{ProviderCreator, SplitTraceAccessor};

/// The [TraceAccessor] trait requests data from a trace provider with the context of the game
/// position. Lower layers of a split game may hold different values depending on the claims at
/// higher layers.
#[async_trait]
pub trait TraceAccessor: Send + Sync {
    /// Returns the claim value at `position`, evaluated in the context of the `reference` claim.
    ///
    /// ### Takes
    /// - `game`: The game the position belongs to.
    /// - `reference`: The claim being responded to. In split games it selects the bottom game.
    /// - `position`: The position to fetch the claim value of.
    ///
    /// ### Returns
    /// - `Ok(H256)`: The honest claim value at the position.
    /// - `Err(anyhow::Error)`: The position is invalid for the game or the provider failed.
    async fn get(&self, game: &dyn Game, reference: &Claim, position: Position) -> Result<H256>;

    /// Returns the data required to execute the step at `position`, evaluated in the context of
    /// the `reference` claim. Any oracle data is stamped with the local context of the bottom game
    /// the position belongs to.
    async fn get_step_data(
        &self,
        game: &dyn Game,
        reference: &Claim,
        position: Position,
    ) -> Result<StepData>;
}
