//! Data structures, trace providers and oracle payloads for an off-chain mirror of the fault
//! dispute game.
//!
//! A resolver walks the claim tree of a [GameState] and, for a disputed branch, asks a
//! [TraceAccessor] for the honest claim value or the step data at a [Position]. The accessor maps
//! the position to a trace index, delegates to a [TraceProvider] and packages the result with the
//! oracle data required to settle the step on-chain.

mod error;
pub use error::FaultError;

mod position;
pub use position::{Position, MAX_POSITION_DEPTH};

mod types;
pub use types::*;

mod game;
pub use game::{Game, GameState};

mod preimage;
pub use preimage::{
    LocalContextPreimage, PreimageOracleData, StepCallData, LOCAL_KEY_TYPE, NO_LOCAL_CONTEXT,
};

/// Contains the smart contract call encodings used for step payloads.
pub mod bindings;

pub mod trace;
pub use trace::{StepData, TraceProvider};

pub mod accessor;
pub use accessor::TraceAccessor;

mod config;
pub use config::TraceConfig;
