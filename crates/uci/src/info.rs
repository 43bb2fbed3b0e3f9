//! UCI info line types.

use crate::command::is_coordinate_move;
use crate::schema::{parse_tokens, FieldValue, Record, Schema};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = engine winning, negative = engine losing).
    Mate(i32),
}

impl Score {
    /// Mate distance, if this is a mate score.
    pub fn mate(self) -> Option<i32> {
        match self {
            Score::Mate(n) => Some(n),
            Score::Cp(_) => None,
        }
    }

    /// Centipawn value, if this is a centipawn score.
    pub fn centipawns(self) -> Option<i32> {
        match self {
            Score::Cp(cp) => Some(cp),
            Score::Mate(_) => None,
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate(m) if *m > 0 => write!(f, "#{}", m),
            Score::Mate(m) => write!(f, "#-{}", m.abs()),
        }
    }
}

/// Whether a score is exact or only a bound from an aspiration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InfoRecord {
    /// Search depth in plies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Selective search depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    /// Index of this line when the engine reports several (MultiPV).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipv: Option<u32>,
    /// Score evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<ScoreBound>,
    /// Nodes searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    /// Nodes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    /// Endgame tablebase hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbhits: Option<u64>,
    /// Time spent in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Current move being searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmove: Option<String>,
    /// Current move number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currmovenumber: Option<u32>,
    /// Hash table usage (per mille).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashfull: Option<u32>,
    /// Arbitrary string info.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

/// Keys recognized on an `info` line.
pub fn info_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new()
            .scalar("depth")
            .scalar("seldepth")
            .scalar("multipv")
            .nested(
                "score",
                Schema::new()
                    .scalar("cp")
                    .scalar("mate")
                    .scalar("lowerbound")
                    .scalar("upperbound"),
            )
            .scalar("nodes")
            .scalar("nps")
            .scalar("tbhits")
            .scalar("time")
            .scalar("hashfull")
            .scalar("cpuload")
            .scalar("currmove")
            .scalar("currmovenumber")
            .list("pv")
    })
}

impl InfoRecord {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as a protocol `info` line.
    pub fn to_uci(&self) -> String {
        self.to_string()
    }

    /// Parse UCI info line. Returns `None` if the line is not an `info` line.
    ///
    /// Fields the engine did not emit stay `None`; in particular a line
    /// without `score` yields `score: None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("info") {
            return None;
        }
        let rest: Vec<&str> = tokens.collect();

        // `string` swallows the remainder of the line, keywords included.
        let (fields, string) = match rest.iter().position(|t| *t == "string") {
            Some(idx) => (&rest[..idx], Some(rest[idx + 1..].join(" "))),
            None => (&rest[..], None),
        };

        let mut info = Self::from_record(&parse_tokens(fields, info_schema()));
        info.string = string;
        Some(info)
    }

    /// Build from a record parsed with [`info_schema`].
    pub fn from_record(record: &Record) -> Self {
        let score = record.record("score");
        InfoRecord {
            depth: count(record, "depth"),
            seldepth: count(record, "seldepth"),
            multipv: count(record, "multipv"),
            score: score.and_then(score_from),
            bound: score.and_then(bound_from),
            nodes: count(record, "nodes"),
            nps: count(record, "nps"),
            tbhits: count(record, "tbhits"),
            time: count(record, "time"),
            pv: record.list("pv").map(leading_moves).unwrap_or_default(),
            currmove: record.get("currmove").and_then(FieldValue::to_token),
            currmovenumber: count(record, "currmovenumber"),
            hashfull: count(record, "hashfull"),
            string: None,
        }
    }

    /// Whether the line carried a score; scoreless lines are progress updates.
    pub fn has_score(&self) -> bool {
        self.score.is_some()
    }
}

impl std::fmt::Display for InfoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("info")?;
        let counts = [
            ("depth", self.depth.map(u64::from)),
            ("seldepth", self.seldepth.map(u64::from)),
            ("multipv", self.multipv.map(u64::from)),
        ];
        for (key, value) in counts {
            if let Some(v) = value {
                write!(f, " {} {}", key, v)?;
            }
        }
        match self.score {
            Some(Score::Cp(cp)) => write!(f, " score cp {}", cp)?,
            Some(Score::Mate(n)) => write!(f, " score mate {}", n)?,
            None => {}
        }
        match (self.score, self.bound) {
            (Some(_), Some(ScoreBound::Lower)) => f.write_str(" lowerbound")?,
            (Some(_), Some(ScoreBound::Upper)) => f.write_str(" upperbound")?,
            _ => {}
        }
        let counts = [
            ("nodes", self.nodes),
            ("nps", self.nps),
            ("tbhits", self.tbhits),
            ("time", self.time),
            ("hashfull", self.hashfull.map(u64::from)),
        ];
        for (key, value) in counts {
            if let Some(v) = value {
                write!(f, " {} {}", key, v)?;
            }
        }
        if let Some(ref mv) = self.currmove {
            write!(f, " currmove {}", mv)?;
        }
        if let Some(n) = self.currmovenumber {
            write!(f, " currmovenumber {}", n)?;
        }
        if !self.pv.is_empty() {
            write!(f, " pv {}", self.pv.join(" "))?;
        }
        if let Some(ref text) = self.string {
            write!(f, " string {}", text)?;
        }
        Ok(())
    }
}

fn count<T: TryFrom<i64>>(record: &Record, key: &str) -> Option<T> {
    record.int(key).and_then(|n| T::try_from(n).ok())
}

fn score_from(score: &Record) -> Option<Score> {
    let narrow = |n: i64| i32::try_from(n).ok();
    if let Some(cp) = score.int("cp").and_then(narrow) {
        return Some(Score::Cp(cp));
    }
    score.int("mate").and_then(narrow).map(Score::Mate)
}

fn bound_from(score: &Record) -> Option<ScoreBound> {
    if score.flag("lowerbound") {
        Some(ScoreBound::Lower)
    } else if score.flag("upperbound") {
        Some(ScoreBound::Upper)
    } else {
        None
    }
}

/// Longest run of coordinate moves at the start of `span`.
fn leading_moves(span: &[String]) -> Vec<String> {
    span.iter()
        .take_while(|t| is_coordinate_move(t))
        .cloned()
        .collect()
}

/// Builder for constructing InfoRecord.
#[derive(Default)]
pub struct InfoBuilder {
    info: InfoRecord,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn seldepth(mut self, d: u32) -> Self {
        self.info.seldepth = Some(d);
        self
    }

    pub fn multipv(mut self, n: u32) -> Self {
        self.info.multipv = Some(n);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn bound(mut self, bound: ScoreBound) -> Self {
        self.info.bound = Some(bound);
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn nps(mut self, n: u64) -> Self {
        self.info.nps = Some(n);
        self
    }

    pub fn tbhits(mut self, n: u64) -> Self {
        self.info.tbhits = Some(n);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.pv = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn currmove(mut self, mv: &str) -> Self {
        self.info.currmove = Some(mv.to_string());
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn build(self) -> InfoRecord {
        self.info
    }
}
