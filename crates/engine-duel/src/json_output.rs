//! JSON file generation for match records.
//!
//! Each finished (or aborted) match is written as one pretty-printed JSON
//! document holding the players, the result, the move list and the search
//! information behind every ply.

use crate::match_runner::{MatchRecord, MatchResult, PlyRecord};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct MatchJson<'a> {
    id: &'a str,
    white: &'a str,
    black: &'a str,
    /// "white", "black", "draw" or "incomplete".
    result: MatchResult,
    winner: Option<&'a str>,
    max_plies: usize,
    moves: &'a [String],
    plies: &'a [PlyRecord],
    decisive: Option<&'a PlyRecord>,
    /// RFC 3339 timestamp when the file was created.
    created_at: String,
}

/// Writes `record` to `path` as pretty JSON.
///
/// # File Format
///
/// ```json
/// {
///   "id": "0b9c3c9e-...",
///   "white": "stockfish",
///   "black": "lc0",
///   "result": "black",
///   "winner": "lc0",
///   "max_plies": 200,
///   "moves": ["e2e4", "e7e5"],
///   "plies": [
///     {
///       "ply": 0,
///       "color": "white",
///       "engine": "stockfish",
///       "best_move": "e2e4",
///       "info": { "depth": 2, "score": { "cp": 35 }, "pv": ["e2e4", "e7e5"] }
///     }
///   ],
///   "decisive": null,
///   "created_at": "2024-01-15T12:00:00+00:00"
/// }
/// ```
pub fn write_json<P: AsRef<Path>>(path: P, id: &str, record: &MatchRecord) -> std::io::Result<()> {
    let json = MatchJson {
        id,
        white: &record.white,
        black: &record.black,
        result: record.result,
        winner: record.winner.as_deref(),
        max_plies: record.max_plies,
        moves: &record.moves,
        plies: &record.plies,
        decisive: record.decisive.as_ref(),
        created_at: Utc::now().to_rfc3339(),
    };

    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &json)?;
    Ok(())
}

/// A fresh UUID v4 for naming match files.
pub fn new_match_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use uci::InfoBuilder;

    fn sample_record() -> MatchRecord {
        let opening = PlyRecord {
            ply: 0,
            color: Color::White,
            engine: "TestWhite".to_string(),
            best_move: Some("e2e4".to_string()),
            ponder: Some("e7e5".to_string()),
            info: InfoBuilder::new()
                .depth(20)
                .score_cp(35)
                .nodes(1234567)
                .pv(["e2e4", "e7e5"])
                .build(),
        };
        let mate = PlyRecord {
            ply: 1,
            color: Color::Black,
            engine: "TestBlack".to_string(),
            best_move: None,
            ponder: None,
            info: InfoBuilder::new().depth(1).score_mate(0).build(),
        };
        MatchRecord {
            white: "TestWhite".to_string(),
            black: "TestBlack".to_string(),
            result: MatchResult::White,
            winner: Some("TestWhite".to_string()),
            max_plies: 200,
            moves: vec!["e2e4".to_string()],
            plies: vec![opening, mate.clone()],
            decisive: Some(mate),
        }
    }

    #[test]
    fn test_write_json_creates_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("match.json");

        write_json(&json_path, "test-match-id", &sample_record()).expect("Failed to write JSON file");

        let contents = std::fs::read_to_string(&json_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();

        assert_eq!(parsed["id"], "test-match-id");
        assert_eq!(parsed["white"], "TestWhite");
        assert_eq!(parsed["black"], "TestBlack");
        assert_eq!(parsed["result"], "white");
        assert_eq!(parsed["winner"], "TestWhite");
        assert_eq!(parsed["moves"][0], "e2e4");
        assert_eq!(parsed["plies"][0]["info"]["score"]["cp"], 35);
        assert_eq!(parsed["plies"][0]["info"]["pv"][1], "e7e5");
        assert_eq!(parsed["plies"][0]["ponder"], "e7e5");
        assert_eq!(parsed["decisive"]["info"]["score"]["mate"], 0);
        assert!(parsed["decisive"]["best_move"].is_null());
        assert!(parsed["created_at"].is_string());
    }

    #[test]
    fn test_incomplete_result_is_not_a_draw() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("aborted.json");

        let mut record = sample_record();
        record.result = MatchResult::Incomplete;
        record.winner = None;
        record.decisive = None;
        write_json(&json_path, "aborted", &record).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["result"], "incomplete");
        assert!(parsed["winner"].is_null());
        assert!(parsed["decisive"].is_null());
    }

    #[test]
    fn test_created_at_is_rfc3339() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("ts.json");
        write_json(&json_path, "ts", &sample_record()).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        let stamp = parsed["created_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_write_json_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("missing").join("match.json");
        assert!(write_json(&json_path, "x", &sample_record()).is_err());
    }

    #[test]
    fn test_match_ids_are_unique_uuids() {
        let a = new_match_id();
        let b = new_match_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
