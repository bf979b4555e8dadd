//! The trace module holds the [TraceProvider] trait, the leaf data source of a fault dispute game,
//! and its implementations.

use crate::PreimageOracleData;
use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod alphabet;
pub use alphabet::{AlphabetProviderCreator, AlphabetTraceProvider, ALPHABET_LOCAL_IDENT};

mod cache;
pub use cache::CachingTraceProvider;

/// The [StepData] struct contains everything required to execute a single step on-chain.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepData {
    /// The unhashed state being stepped from.
    pub prestate: Bytes,
    /// The proof data required during step execution.
    pub proof: Bytes,
    /// The data to load into the preimage oracle before the step, if any.
    pub preimage_data: Option<PreimageOracleData>,
}

/// The [TraceProvider] trait defines the source of the claim values and step data of an
/// execution trace. Implementations must tolerate concurrent calls.
///
/// Calls may reach an external VM and take a long time; dropping the returned future abandons
/// the query.
#[async_trait]
pub trait TraceProvider: Send + Sync {
    /// Returns the commitment to the state at the given trace index,
    /// `get(i) = keccak256(get_step_data(i + 1).prestate)`.
    ///
    /// ### Returns
    /// - `Ok(H256)`: The commitment.
    /// - `Err(anyhow::Error)`: The index is out of range ([crate::FaultError::IndexOutOfRange]) or
    ///   the trace source failed.
    async fn get(&self, trace_index: U256) -> Result<H256>;

    /// Returns the data required to execute the step at the given trace index. The prestate of
    /// step `i` is the preimage of the commitment at `i - 1`, or of the absolute prestate
    /// commitment for `i = 0`.
    async fn get_step_data(&self, trace_index: U256) -> Result<StepData>;

    /// Returns the commitment of the state preceding trace index 0.
    async fn absolute_prestate_commitment(&self) -> Result<H256>;
}

#[async_trait]
impl<T: TraceProvider + ?Sized> TraceProvider for Arc<T> {
    async fn get(&self, trace_index: U256) -> Result<H256> {
        (**self).get(trace_index).await
    }

    async fn get_step_data(&self, trace_index: U256) -> Result<StepData> {
        (**self).get_step_data(trace_index).await
    }

    async fn absolute_prestate_commitment(&self) -> Result<H256> {
        (**self).absolute_prestate_commitment().await
    }
}
