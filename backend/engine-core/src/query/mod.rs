//! Analysis query value objects.
//!
//! A [`Query`] is the unit the reconciler tracks: an opaque, comparable
//! description of one analysis request. Two queries are *equivalent* when
//! their semantic content matches; the generated identifier is ignored, so
//! resubmitting the same position never re-dispatches work.

use crate::version::EngineVersion;

use serde_json::{Value, json};
use uuid::Uuid;

/// Action marker carried by termination requests.
pub const TERMINATE_ACTION: &str = "terminate";

/// Moves the engine should not consider, for one player, down to a depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvoidSpec {
    pub player: String,
    pub moves: Vec<String>,
    pub until_depth: u32,
}

/// Application-side inputs to one analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyseParams {
    pub rules: String,
    pub board_x_size: u8,
    pub board_y_size: u8,
    pub max_visits: u32,
    /// Move history as `(player, location)` pairs.
    pub moves: Vec<(String, String)>,
    pub avoid: Option<AvoidSpec>,
}

/// One analysis request as tracked by the reconciler.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: String,
    pub params: AnalyseParams,
    include_avoid: bool,
}

impl Query {
    /// Build a query from application parameters plus the negotiated engine
    /// version.
    ///
    /// Protocol fields vary by version: releases older than 1.3.0 reject an
    /// avoid-moves list, so it is withheld for them (and while no version
    /// has been negotiated yet).
    pub fn build(params: &AnalyseParams, version: Option<&EngineVersion>) -> Self {
        let include_avoid =
            params.avoid.is_some() && version.is_some_and(EngineVersion::supports_avoid_moves);

        Self {
            id: format!("query_{}", Uuid::new_v4().simple()),
            params: params.clone(),
            include_avoid,
        }
    }

    /// Semantic comparison; identifiers are ignored.
    pub fn equivalent(&self, other: &Query) -> bool {
        self.params == other.params && self.include_avoid == other.include_avoid
    }

    /// Wire encoding of the analysis request.
    pub fn to_message(&self) -> Value {
        let moves: Vec<Value> = self
            .params
            .moves
            .iter()
            .map(|(player, location)| json!([player, location]))
            .collect();

        let mut message = json!({
            "id": self.id,
            "rules": self.params.rules,
            "boardXSize": self.params.board_x_size,
            "boardYSize": self.params.board_y_size,
            "maxVisits": self.params.max_visits,
            "moves": moves,
        });

        if self.include_avoid {
            if let Some(avoid) = &self.params.avoid {
                message["avoidMoves"] = json!([{
                    "player": avoid.player,
                    "moves": avoid.moves,
                    "untilDepth": avoid.until_depth,
                }]);
            }
        }

        message
    }

    /// Termination request referencing this (running) query.
    pub fn termination(&self) -> Value {
        json!({
            "id": format!("stop!{}", self.id),
            "action": TERMINATE_ACTION,
            "terminateId": self.id,
        })
    }
}
