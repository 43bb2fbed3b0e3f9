use anyhow::Context;
use clap::{Parser, Subcommand};
use engine_duel::config::{ArenaConfig, EngineConfig};
use engine_duel::json_output;
use engine_duel::match_runner::{Match, MatchRecord, MatchResult};
use engine_duel::session::EngineSession;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engine-duel")]
#[command(about = "Play UCI chess engines against each other")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run matches between two engines (colors are drawn per game)
    Match {
        /// First engine: a name from arena.toml or an executable path
        first: String,
        /// Second engine: a name from arena.toml or an executable path
        second: String,
        /// Number of games to play
        #[arg(short, long, default_value = "1")]
        games: u32,
        /// Half-move ceiling (defaults to arena.toml's max_plies)
        #[arg(long)]
        max_plies: Option<usize>,
        /// Seed for color assignment and randomized parameters
        #[arg(long)]
        seed: Option<u64>,
        /// Games to run at the same time
        #[arg(short = 'j', long, default_value = "1")]
        parallel: usize,
        /// Directory for JSON match records
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run a single search and print the result as JSON
    Analyse {
        /// Engine name from arena.toml or an executable path
        engine: String,
        /// Position to analyse (defaults to the start position)
        #[arg(long)]
        fen: Option<String>,
        /// Moves from the start position
        #[arg(long, num_args = 1.., conflicts_with = "fen")]
        moves: Vec<String>,
        /// Search depth (defaults to the engine's configured depth)
        #[arg(short, long)]
        depth: Option<u32>,
    },
}

struct MatchPlan {
    first: (String, EngineConfig),
    second: (String, EngineConfig),
    games: u32,
    max_plies: usize,
    seed: Option<u64>,
    parallel: usize,
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = ArenaConfig::load().context("loading arena.toml")?;

    match cli.command {
        Commands::Match {
            first,
            second,
            games,
            max_plies,
            seed,
            parallel,
            out,
        } => {
            let (first_name, second_name) = participant_names(&first, &second);
            let plan = MatchPlan {
                first: (first_name, config.resolve(&first)),
                second: (second_name, config.resolve(&second)),
                games,
                max_plies: max_plies.unwrap_or(config.max_plies),
                seed,
                parallel,
                out,
            };
            plan.first.1.validate()?;
            plan.second.1.validate()?;
            run_matches(plan).await
        }
        Commands::Analyse {
            engine,
            fen,
            moves,
            depth,
        } => {
            let mut engine_config = config.resolve(&engine);
            if let Some(d) = depth {
                engine_config.depth = d;
            }
            engine_config.validate()?;
            analyse(&engine_config, fen.as_deref(), &moves).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Keeps the two participants distinct when an engine plays itself.
fn participant_names(first: &str, second: &str) -> (String, String) {
    if first == second {
        (format!("{}#1", first), format!("{}#2", second))
    } else {
        (first.to_string(), second.to_string())
    }
}

async fn run_matches(plan: MatchPlan) -> anyhow::Result<()> {
    if let Some(ref dir) = plan.out {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut rng = match plan.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let permits = Arc::new(Semaphore::new(plan.parallel.max(1)));
    let mut set = JoinSet::new();

    println!(
        "Running {} games: {} vs {}",
        plan.games, plan.first.0, plan.second.0
    );

    for game in 1..=plan.games {
        let permits = permits.clone();
        let first = plan.first.clone();
        let second = plan.second.clone();
        let max_plies = plan.max_plies;
        let game_seed: u64 = rng.gen();
        set.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => play_one(first, second, max_plies, game_seed).await,
                Err(e) => Err(e.into()),
            };
            (game, result)
        });
    }

    let (mut wins, mut draws, mut losses, mut incomplete) = (0, 0, 0, 0);
    while let Some(joined) = set.join_next().await {
        let (game, result) = joined?;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                eprintln!("Game {} error: {:#}", game, e);
                incomplete += 1;
                continue;
            }
        };

        let first_color = if record.white == plan.first.0 {
            MatchResult::White
        } else {
            MatchResult::Black
        };
        match record.result {
            MatchResult::Draw => draws += 1,
            MatchResult::Incomplete => incomplete += 1,
            r if r == first_color => wins += 1,
            _ => losses += 1,
        }

        println!(
            "Game {}: {} (white) vs {} (black): {:?} ({} plies)",
            game,
            record.white,
            record.black,
            record.result,
            record.moves.len()
        );

        if let Some(ref dir) = plan.out {
            let id = json_output::new_match_id();
            let path = dir.join(format!("{}.json", id));
            if let Err(e) = json_output::write_json(&path, &id, &record) {
                eprintln!("Warning: Failed to write JSON: {}", e);
            }
        }
    }

    println!(
        "\n{}: W:{} D:{} L:{} ({} incomplete)",
        plan.first.0, wins, draws, losses, incomplete
    );
    Ok(())
}

async fn play_one(
    first: (String, EngineConfig),
    second: (String, EngineConfig),
    max_plies: usize,
    seed: u64,
) -> anyhow::Result<MatchRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut sessions = BTreeMap::new();
    for (name, engine) in [first, second] {
        let session = EngineSession::start(&engine, &mut rng)
            .await
            .with_context(|| format!("starting {}", name))?;
        sessions.insert(name, session);
    }

    let mut game = Match::new(sessions, max_plies, &mut rng).await?;
    if let Err(e) = game.run().await {
        tracing::warn!(error = %e, "match incomplete");
    }
    let record = game.record();
    if let Err(e) = game.shutdown().await {
        tracing::warn!(error = %e, "engine shutdown failed");
    }
    Ok(record)
}

async fn analyse(engine: &EngineConfig, fen: Option<&str>, moves: &[String]) -> anyhow::Result<()> {
    let mut rng = StdRng::from_entropy();
    let mut session = EngineSession::start(engine, &mut rng)
        .await
        .with_context(|| format!("starting {}", engine.path.display()))?;

    session.new_game().await?;
    match fen {
        Some(fen) => session.set_fen_position(fen).await?,
        None => session.set_position(moves).await?,
    }
    let result = session.search().await?;
    session.quit().await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
