//! The flat module contains the [FlatTraceAccessor], the accessor of a game backed by a single
//! trace.

use super::TraceAccessor;
use crate::{
    trace::{StepData, TraceProvider},
    Claim, Game, Position,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::H256;

/// The [FlatTraceAccessor] maps every position of the game onto one [TraceProvider] using the
/// position's trace index at the game's maximum depth. The reference claim is irrelevant.
#[derive(Debug, Clone)]
pub struct FlatTraceAccessor<P> {
    provider: P,
}

impl<P: TraceProvider> FlatTraceAccessor<P> {
    /// Creates a new [FlatTraceAccessor] over `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: TraceProvider> TraceAccessor for FlatTraceAccessor<P> {
    async fn get(&self, game: &dyn Game, _reference: &Claim, position: Position) -> Result<H256> {
        let trace_index = position.trace_index(game.max_depth())?;
        tracing::debug!(target: "trace-accessor", "Fetching claim at position {}, trace index {}", position, trace_index);
        self.provider
            .get(trace_index)
            .await
            .with_context(|| {
                format!(
                    "failed to fetch claim at position {position}, trace index {trace_index}"
                )
            })
    }

    async fn get_step_data(
        &self,
        game: &dyn Game,
        _reference: &Claim,
        position: Position,
    ) -> Result<StepData> {
        let trace_index = position.trace_index(game.max_depth())?;
        tracing::debug!(target: "trace-accessor", "Fetching step data at position {}, trace index {}", position, trace_index);
        self.provider
            .get_step_data(trace_index)
            .await
            .with_context(|| {
                format!(
                    "failed to fetch step data at position {position}, trace index {trace_index}"
                )
            })
    }
}
