//! Tests against a real Stockfish binary.
//!
//! Run with: `cargo test -p engine-duel --test stockfish -- --ignored`

use engine_duel::config::EngineConfig;
use engine_duel::match_runner::{Match, MatchStatus};
use engine_duel::session::{EngineSession, SessionState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Check if Stockfish is available in PATH.
fn stockfish_available() -> bool {
    std::process::Command::new("stockfish")
        .arg("quit")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

#[tokio::test]
#[ignore = "requires Stockfish"]
async fn test_stockfish_finds_mate_in_one() {
    if !stockfish_available() {
        eprintln!("Skipping test: Stockfish not available");
        return;
    }

    let mut config = EngineConfig::new("stockfish");
    config.depth = 6;
    let mut rng = StdRng::seed_from_u64(1);
    let mut session = EngineSession::start(&config, &mut rng).await.unwrap();
    assert!(session
        .engine_name()
        .is_some_and(|name| name.contains("Stockfish")));

    // 1.e4 e5 2.Qh5 Nc6 3.Bc4 Nf6?? leaves Qxf7# on the board.
    let moves: Vec<String> = ["e2e4", "e7e5", "d1h5", "b8c6", "f1c4", "g8f6"]
        .iter()
        .map(|m| m.to_string())
        .collect();
    session.new_game().await.unwrap();
    session.set_position(&moves).await.unwrap();
    let result = session.search().await.unwrap();

    assert_eq!(result.best_move.as_deref(), Some("h5f7"));
    assert_eq!(result.info.score, Some(uci::Score::Mate(1)));

    session.quit().await.unwrap();
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
#[ignore = "requires Stockfish"]
async fn test_stockfish_self_play_finishes() {
    if !stockfish_available() {
        eprintln!("Skipping test: Stockfish not available");
        return;
    }

    let mut config = EngineConfig::new("stockfish");
    config.depth = 2;
    let mut rng = StdRng::seed_from_u64(5);

    let mut sessions = BTreeMap::new();
    for name in ["left", "right"] {
        let session = EngineSession::start(&config, &mut rng).await.unwrap();
        sessions.insert(name.to_string(), session);
    }

    let mut game = Match::new(sessions, 40, &mut rng).await.unwrap();
    game.run().await.unwrap();
    assert!(matches!(
        game.status(),
        MatchStatus::Drawn | MatchStatus::Decided(_)
    ));
    assert!(game.moves().len() <= 40);
    game.shutdown().await.unwrap();
}
