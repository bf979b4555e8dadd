//! The alphabet module contains the [AlphabetTraceProvider], a trace over a string of letters
//! used as a reference VM for the fault dispute game.

use super::{StepData, TraceProvider};
use crate::{
    accessor::ProviderCreator, Claim, FaultError, PreimageOracleData, LOCAL_KEY_TYPE,
    NO_LOCAL_CONTEXT,
};
use anyhow::Result;
use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    types::{Bytes, H256, U256},
    utils::keccak256,
};
use std::sync::Arc;

/// The local oracle identifier the alphabet VM reads its starting trace index from.
pub const ALPHABET_LOCAL_IDENT: u8 = 4;

/// The [AlphabetTraceProvider] commits to a trace of letters. The state at trace index `i` is
/// `abi.encode(uint256 start + i, uint256 letter)` and its commitment is the keccak256 hash of the
/// state.
///
/// The trace is padded to `2^depth` states by repeating its final state.
#[derive(Debug, Clone)]
pub struct AlphabetTraceProvider {
    /// The letters of the trace.
    trace: Arc<[u8]>,
    /// The depth of the game tree the trace is committed to.
    depth: u64,
    /// The global trace index of the first letter.
    start: U256,
}

impl AlphabetTraceProvider {
    /// Creates a new [AlphabetTraceProvider] over `trace` for a game tree of the given depth.
    pub fn new(trace: impl Into<Arc<[u8]>>, depth: u64) -> Self {
        Self {
            trace: trace.into(),
            depth,
            start: U256::zero(),
        }
    }

    /// Offsets the trace so that its first letter sits at the global trace index `start`.
    pub fn with_start(self, start: U256) -> Self {
        Self { start, ..self }
    }

    /// Returns the letter the absolute prestate commits to: the letter preceding the first letter
    /// of the trace.
    pub fn prestate_letter(&self) -> u8 {
        self.trace.first().copied().unwrap_or_default().wrapping_sub(1)
    }

    /// Returns the number of leaves of the game tree the trace is committed to.
    fn capacity(&self) -> U256 {
        U256::one() << self.depth
    }

    /// Returns the state preimage at the given trace index.
    fn state_at(&self, trace_index: U256) -> Result<Vec<u8>> {
        let out_of_range = || FaultError::IndexOutOfRange {
            index: trace_index,
            len: self.capacity(),
        };
        if self.trace.is_empty() || trace_index >= self.capacity() {
            return Err(out_of_range().into());
        }

        let last = self.trace.len() - 1;
        let letter_index = if trace_index > U256::from(last) {
            last
        } else {
            trace_index.as_usize()
        };
        let index = self
            .start
            .checked_add(U256::from(letter_index))
            .ok_or_else(out_of_range)?;
        Ok(Self::encode_state(index, self.trace[letter_index]))
    }

    /// Returns the absolute prestate preimage.
    fn absolute_prestate(&self) -> Vec<u8> {
        Self::encode_state(self.start, self.prestate_letter())
    }

    fn encode_state(index: U256, letter: u8) -> Vec<u8> {
        abi::encode(&[Token::Uint(index), Token::Uint(U256::from(letter))])
    }

    /// Returns the local oracle data holding the global trace index of the step.
    fn oracle_data(&self, trace_index: U256) -> PreimageOracleData {
        let mut key = [0u8; 32];
        key[0] = LOCAL_KEY_TYPE;
        key[31] = ALPHABET_LOCAL_IDENT;

        let mut data = Vec::with_capacity(40);
        data.extend_from_slice(&32u64.to_be_bytes());
        let mut word = [0u8; 32];
        self.start.saturating_add(trace_index).to_big_endian(&mut word);
        data.extend_from_slice(&word);

        PreimageOracleData::new(NO_LOCAL_CONTEXT, key.to_vec(), data, 0)
    }
}

#[async_trait]
impl TraceProvider for AlphabetTraceProvider {
    async fn get(&self, trace_index: U256) -> Result<H256> {
        let state = self.state_at(trace_index)?;
        tracing::trace!(target: "alphabet-trace", "Computed state at trace index {}", trace_index);
        Ok(H256::from(keccak256(state)))
    }

    async fn get_step_data(&self, trace_index: U256) -> Result<StepData> {
        if trace_index >= self.capacity() {
            return Err(FaultError::IndexOutOfRange {
                index: trace_index,
                len: self.capacity(),
            }
            .into());
        }

        let prestate = if trace_index.is_zero() {
            self.absolute_prestate()
        } else {
            self.state_at(trace_index - U256::one())?
        };

        Ok(StepData {
            prestate: Bytes::from(prestate),
            proof: Bytes::default(),
            preimage_data: Some(self.oracle_data(trace_index)),
        })
    }

    async fn absolute_prestate_commitment(&self) -> Result<H256> {
        Ok(H256::from(keccak256(self.absolute_prestate())))
    }
}

/// The [AlphabetProviderCreator] creates the bottom [AlphabetTraceProvider]s of a split alphabet
/// game. The bottom game below the top leaf committing to top trace index `k` covers the global
/// trace indices starting at `k * 2^depth`.
#[derive(Debug, Clone)]
pub struct AlphabetProviderCreator {
    /// The letters of every bottom trace.
    trace: Arc<[u8]>,
    /// The split depth of the game.
    split_depth: u64,
}

impl AlphabetProviderCreator {
    /// Creates a new [AlphabetProviderCreator].
    pub fn new(trace: impl Into<Arc<[u8]>>, split_depth: u64) -> Self {
        Self {
            trace: trace.into(),
            split_depth,
        }
    }
}

#[async_trait]
impl ProviderCreator for AlphabetProviderCreator {
    async fn create(
        &self,
        local_context: H256,
        depth: u64,
        _pre: &Claim,
        post: &Claim,
    ) -> Result<Arc<dyn TraceProvider>> {
        let start = post.position().trace_index(self.split_depth)? << depth;
        tracing::debug!(target: "alphabet-trace", "Creating bottom alphabet trace at {} for local context {:?}", start, local_context);
        Ok(Arc::new(
            AlphabetTraceProvider::new(Arc::clone(&self.trace), depth).with_start(start),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MAX_DEPTH: u64 = 2;

    fn provider() -> AlphabetTraceProvider {
        AlphabetTraceProvider::new(b"abcd".to_vec(), MAX_DEPTH)
    }

    fn state(index: u64, letter: u8) -> Vec<u8> {
        abi::encode(&[
            Token::Uint(U256::from(index)),
            Token::Uint(U256::from(letter)),
        ])
    }

    #[tokio::test]
    async fn get_commits_to_letters() {
        let provider = provider();
        for (i, letter) in b"abcd".iter().enumerate() {
            let claim = provider.get(U256::from(i)).await.unwrap();
            assert_eq!(claim, H256::from(keccak256(state(i as u64, *letter))));
        }
    }

    #[tokio::test]
    async fn absolute_prestate_precedes_first_letter() {
        let provider = provider();
        assert_eq!(provider.prestate_letter(), b'`');
        assert_eq!(
            provider.absolute_prestate_commitment().await.unwrap(),
            H256::from(keccak256(state(0, b'`')))
        );

        let step = provider.get_step_data(U256::zero()).await.unwrap();
        assert_eq!(
            H256::from(keccak256(&step.prestate)),
            provider.absolute_prestate_commitment().await.unwrap()
        );
    }

    #[tokio::test]
    async fn step_prestate_is_previous_state() {
        let provider = provider();
        for i in 1..4u64 {
            let step = provider.get_step_data(U256::from(i)).await.unwrap();
            assert_eq!(
                H256::from(keccak256(&step.prestate)),
                provider.get(U256::from(i - 1)).await.unwrap()
            );
        }

        let step = provider.get_step_data(U256::one()).await.unwrap();
        assert_eq!(step.prestate.to_vec(), state(0, b'a'));
        assert!(step.proof.is_empty());
    }

    #[tokio::test]
    async fn step_preimage_data_is_local() {
        let provider = provider();
        let step = provider.get_step_data(U256::from(3)).await.unwrap();
        let data = step.preimage_data.unwrap();
        assert!(data.is_local);
        assert_eq!(data.local_context, NO_LOCAL_CONTEXT);
        assert_eq!(data.ident().unwrap(), U256::from(ALPHABET_LOCAL_IDENT));
        assert_eq!(
            U256::from_big_endian(data.preimage_without_size()),
            U256::from(3)
        );
    }

    #[tokio::test]
    async fn out_of_range() {
        let provider = provider();
        let err = provider.get(U256::from(4)).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<FaultError>(),
            Some(&FaultError::IndexOutOfRange {
                index: U256::from(4),
                len: U256::from(4)
            })
        );
        assert!(provider.get_step_data(U256::from(4)).await.is_err());

        let empty = AlphabetTraceProvider::new(Vec::<u8>::new(), MAX_DEPTH);
        assert!(empty.get(U256::zero()).await.is_err());
    }

    #[tokio::test]
    async fn short_trace_is_padded() {
        let provider = AlphabetTraceProvider::new(b"ab".to_vec(), MAX_DEPTH);
        let last = provider.get(U256::one()).await.unwrap();
        assert_eq!(provider.get(U256::from(2)).await.unwrap(), last);
        assert_eq!(provider.get(U256::from(3)).await.unwrap(), last);
    }

    #[tokio::test]
    async fn offset_trace() {
        let provider = provider().with_start(U256::from(8));
        assert_eq!(
            provider.get(U256::one()).await.unwrap(),
            H256::from(keccak256(state(9, b'b')))
        );
        assert_eq!(
            provider.absolute_prestate_commitment().await.unwrap(),
            H256::from(keccak256(state(8, b'`')))
        );
    }
}
