use anyhow::{anyhow, bail, Result};
use clap::{ArgAction, Parser};
use op_challenger_fault::{
    accessor::FlatTraceAccessor,
    trace::{AlphabetTraceProvider, CachingTraceProvider},
    Claim, Game, GameState, Position, StepCallData, TraceAccessor, TraceConfig, TraceProvider,
};
use serde_json::json;
use tracing::Level;

/// Arguments for the `op-challenger-trace` binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count, env = "VERBOSITY")]
    v: u8,

    /// The letters of the alphabet trace.
    #[arg(
        long,
        short,
        help = "The letters of the alphabet trace.",
        env = "OP_CHALLENGER_TRACE"
    )]
    trace: String,

    /// The maximum depth of the game tree.
    #[arg(
        long,
        short,
        help = "The maximum depth of the game tree.",
        env = "OP_CHALLENGER_MAX_DEPTH"
    )]
    max_depth: u64,

    /// The depth of the position to inspect.
    #[arg(long, short, help = "The depth of the position to inspect.")]
    depth: u64,

    /// The index at depth of the position to inspect.
    #[arg(long, short, help = "The index at depth of the position to inspect.")]
    index: u64,

    /// Also print the step payload for the position. Requires a leaf position.
    #[arg(long, help = "Also print the step payload for the position.")]
    step: bool,

    /// The contract index of the claim being stepped against.
    #[arg(long, default_value_t = 0, help = "The contract index of the claim being stepped against.")]
    claim_index: u64,

    /// Whether the step is an attack.
    #[arg(long, help = "Whether the step is an attack.")]
    attack: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse the command arguments
    let Args {
        v,
        trace,
        max_depth,
        depth,
        index,
        step,
        claim_index,
        attack,
    } = Args::parse();

    // Initialize the tracing subscriber
    init_tracing_subscriber(v)?;

    let config = TraceConfig::new(max_depth);
    config.validate()?;
    tracing::info!(target: "op-challenger-trace", "Trace config validated: {:?}", config);

    // Build a flat game whose root claim is the honest commitment to the whole trace.
    let provider = CachingTraceProvider::new(AlphabetTraceProvider::new(
        trace.into_bytes(),
        config.max_depth,
    ));
    let root_position = Position::root();
    let root_value = provider
        .get(root_position.trace_index(config.max_depth)?)
        .await?;
    let root = Claim {
        contract_index: Some(0),
        ..Claim::new(root_value, root_position)
    };
    let game = GameState::new(vec![root], config.max_depth)?;
    let accessor = FlatTraceAccessor::new(provider);
    tracing::debug!(target: "op-challenger-trace", "Game created with root claim {:?}", root_value);

    let position = Position::new(depth, index)?;
    let value = accessor.get(&game, game.root_claim(), position).await?;
    let prestate = accessor.provider().absolute_prestate_commitment().await?;

    let mut output = json!({
        "position": position,
        "traceIndex": position.trace_index(game.max_depth())?,
        "value": value,
        "absolutePrestate": prestate,
    });

    if step {
        if position.depth() != game.max_depth() {
            bail!(
                "step payloads are only available at the max depth {}, got depth {}",
                game.max_depth(),
                position.depth()
            );
        }
        let step_data = accessor
            .get_step_data(&game, game.root_claim(), position)
            .await?;
        let call = StepCallData {
            claim_index,
            is_attack: attack,
            state_data: step_data.prestate.clone(),
            proof: step_data.proof.clone(),
        };
        let load = step_data
            .preimage_data
            .as_ref()
            .map(|data| data.load_calldata())
            .transpose()?;

        output["step"] = json!({
            "data": step_data,
            "stepCalldata": call.calldata(),
            "oracleCalldata": load,
        });
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    tracing::info!(target: "op-challenger-trace", "Inspected position {} (trace index {})", position, position.trace_index(game.max_depth())?);

    Ok(())
}

/// Initializes the tracing subscriber
///
/// # Arguments
/// * `verbosity_level` - The verbosity level (0-4)
///
/// # Returns
/// * `Result<()>` - Ok if successful, Err otherwise.
fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
