//! The preimage module contains the payloads handed to the preimage oracle and the dispute game
//! contract when settling a step.

use crate::{
    bindings::{AddLocalDataCall, LoadKeccak256PreimagePartCall, LoadLocalDataCall, StepCall},
    Claim, FaultError,
};
use ethers::{
    abi::AbiEncode,
    types::{Bytes, H256, U256},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

/// The local context used when a trace provider is used alone instead of as part of a split game.
pub const NO_LOCAL_CONTEXT: H256 = H256([0u8; 32]);

/// The type byte of a local oracle key.
pub const LOCAL_KEY_TYPE: u8 = 1;

/// The length of the size prefix carried by the oracle data.
const SIZE_PREFIX_LEN: usize = 8;

/// The [LocalContextPreimage] contains the pre and post claims that bracket a bottom game. Its
/// hash is the local context under which that game's local oracle data is stored, so that many
/// sub-games can share one oracle without colliding keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalContextPreimage {
    /// The claim committing to the state the bottom game starts from.
    pub pre: Claim,
    /// The claim committing to the state the bottom game ends in.
    pub post: Claim,
}

impl LocalContextPreimage {
    /// Creates a new [LocalContextPreimage].
    pub fn new(pre: Claim, post: Claim) -> Self {
        Self { pre, post }
    }

    /// Returns true if the dispute starts from the absolute prestate, which is signalled by a
    /// zero-valued pre claim.
    pub fn use_prestate_block(&self) -> bool {
        self.pre == Claim::default()
    }

    /// Returns the local context, `keccak256(preimage)`.
    pub fn hash(&self) -> H256 {
        H256::from(keccak256(self.preimage()))
    }

    /// Returns the preimage of the local context: the encoded pre claim, omitted when the
    /// prestate block is used, followed by the encoded post claim.
    pub fn preimage(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(128);
        if !self.use_prestate_block() {
            data.extend_from_slice(&encode_claim(&self.pre));
        }
        data.extend_from_slice(&encode_claim(&self.post));
        data
    }
}

/// Encodes a claim as its 32 byte value followed by its 32 byte big-endian generalized index.
fn encode_claim(claim: &Claim) -> [u8; 64] {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(claim.value().as_bytes());
    claim.position().to_gindex().to_big_endian(&mut data[32..]);
    data
}

/// The [PreimageOracleData] struct contains the data that must be loaded into the preimage
/// oracle before a step can be executed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreimageOracleData {
    /// Whether or not the key is a local key.
    pub is_local: bool,
    /// The local context the data is stored under.
    pub local_context: H256,
    /// The oracle key. The first byte is the key type.
    pub oracle_key: Bytes,
    /// The oracle data. Local data is prefixed with its 8 byte length.
    pub oracle_data: Bytes,
    /// The offset to read the oracle data from.
    pub oracle_offset: u32,
}

impl PreimageOracleData {
    /// Creates a new [PreimageOracleData], deriving `is_local` from the type byte of the key.
    pub fn new(
        local_context: H256,
        oracle_key: impl Into<Bytes>,
        oracle_data: impl Into<Bytes>,
        oracle_offset: u32,
    ) -> Self {
        let oracle_key = oracle_key.into();
        Self {
            is_local: oracle_key.first() == Some(&LOCAL_KEY_TYPE),
            local_context,
            oracle_key,
            oracle_data: oracle_data.into(),
            oracle_offset,
        }
    }

    /// Returns a copy of the [PreimageOracleData] stored under a different local context.
    pub fn with_local_context(self, local_context: H256) -> Self {
        Self {
            local_context,
            ..self
        }
    }

    /// Returns the identifier of the oracle key: the key without its type byte, read as a
    /// big-endian integer.
    ///
    /// ### Returns
    /// - `Ok(U256)`: The identifier.
    /// - `Err(FaultError::EmptyOracleKey)`: The key has no type byte.
    /// - `Err(FaultError::OracleKeyTooLong)`: The identifier does not fit in 32 bytes.
    pub fn ident(&self) -> Result<U256, FaultError> {
        let (_, ident) = self
            .oracle_key
            .split_first()
            .ok_or(FaultError::EmptyOracleKey)?;
        if ident.len() > 32 {
            return Err(FaultError::OracleKeyTooLong(ident.len()));
        }
        Ok(U256::from_big_endian(ident))
    }

    /// Returns the oracle data without its 8 byte size prefix.
    pub fn preimage_without_size(&self) -> &[u8] {
        self.oracle_data.get(SIZE_PREFIX_LEN..).unwrap_or_default()
    }

    /// Returns the local context as an integer.
    pub fn local_context_u256(&self) -> U256 {
        U256::from_big_endian(self.local_context.as_bytes())
    }

    /// Returns the oracle offset as an integer.
    pub fn oracle_offset_u256(&self) -> U256 {
        U256::from(self.oracle_offset)
    }

    /// Returns the calldata that loads this data into the preimage oracle. Local data is loaded
    /// under its local context; global data is loaded as a keccak256 preimage part.
    pub fn load_calldata(&self) -> Result<Bytes, FaultError> {
        if self.is_local {
            let preimage = self.preimage_without_size();
            if preimage.len() > 32 {
                return Err(FaultError::LocalDataTooLong(preimage.len()));
            }
            let mut word = [0u8; 32];
            word[..preimage.len()].copy_from_slice(preimage);

            let call = LoadLocalDataCall {
                ident: self.ident()?,
                local_context: self.local_context.to_fixed_bytes(),
                word,
                size: U256::from(preimage.len()),
                part_offset: self.oracle_offset_u256(),
            };
            Ok(call.encode().into())
        } else {
            let call = LoadKeccak256PreimagePartCall {
                part_offset: self.oracle_offset_u256(),
                preimage: Bytes::from(self.preimage_without_size().to_vec()),
            };
            Ok(call.encode().into())
        }
    }

    /// Returns the calldata that asks the dispute game to load this local data into the oracle
    /// on its behalf.
    pub fn add_local_data_calldata(&self) -> Result<Bytes, FaultError> {
        let call = AddLocalDataCall {
            ident: self.ident()?,
            part_offset: self.oracle_offset_u256(),
        };
        Ok(call.encode().into())
    }
}

/// The [StepCallData] struct contains the arguments of the on-chain single step check.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCallData {
    /// The index of the claim being stepped against.
    pub claim_index: u64,
    /// Whether the step is an attack or a defense.
    pub is_attack: bool,
    /// The prestate preimage.
    pub state_data: Bytes,
    /// The proof accompanying the prestate.
    pub proof: Bytes,
}

impl StepCallData {
    /// Returns the ABI encoded `step` calldata.
    pub fn calldata(&self) -> Bytes {
        StepCall {
            claim_index: U256::from(self.claim_index),
            is_attack: self.is_attack,
            state_data: self.state_data.clone(),
            proof: self.proof.clone(),
        }
        .encode()
        .into()
    }
}
