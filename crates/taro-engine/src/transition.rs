//! Turn-handling trait: NODE_BASED vs. EDGE_BASED expansion.

use taro_common::{EdgeId, ReasonCode, RouteError};
use taro_model::TurnTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTrait {
    /// Finite turn penalties are ignored; forbidden turns still apply.
    NodeBased,
    /// All turn penalties apply.
    EdgeBased,
}

impl TransitionTrait {
    pub fn from_id(id: &str) -> Result<Self, RouteError> {
        match id {
            "NODE_BASED" => Ok(TransitionTrait::NodeBased),
            "EDGE_BASED" => Ok(TransitionTrait::EdgeBased),
            other => Err(RouteError::new(ReasonCode::UnknownTransitionTrait)
                .with_message(format!("unknown transition trait '{other}'"))),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            TransitionTrait::NodeBased => "NODE_BASED",
            TransitionTrait::EdgeBased => "EDGE_BASED",
        }
    }

    /// Seconds charged for turning from `from` onto `to`, or `None` when the
    /// turn is forbidden and the successor must be skipped.
    #[inline]
    pub fn turn_penalty(self, turns: &TurnTable, from: EdgeId, to: EdgeId) -> Option<f64> {
        let penalty = turns.penalty(from, to);
        if penalty.is_infinite() {
            return None;
        }
        match self {
            TransitionTrait::EdgeBased => Some(penalty),
            TransitionTrait::NodeBased => Some(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_based_charges_finite_penalties() {
        let turns = TurnTable::new([(EdgeId(0), EdgeId(1), 5.0)]).unwrap();
        assert_eq!(
            TransitionTrait::EdgeBased.turn_penalty(&turns, EdgeId(0), EdgeId(1)),
            Some(5.0)
        );
        assert_eq!(
            TransitionTrait::NodeBased.turn_penalty(&turns, EdgeId(0), EdgeId(1)),
            Some(0.0)
        );
    }

    #[test]
    fn both_modes_skip_forbidden_turns() {
        let turns = TurnTable::new([(EdgeId(0), EdgeId(1), f64::INFINITY)]).unwrap();
        assert_eq!(
            TransitionTrait::EdgeBased.turn_penalty(&turns, EdgeId(0), EdgeId(1)),
            None
        );
        assert_eq!(
            TransitionTrait::NodeBased.turn_penalty(&turns, EdgeId(0), EdgeId(1)),
            None
        );
    }

    #[test]
    fn absent_pairs_are_free_in_both_modes() {
        let turns = TurnTable::empty();
        assert_eq!(
            TransitionTrait::EdgeBased.turn_penalty(&turns, EdgeId(3), EdgeId(4)),
            Some(0.0)
        );
    }

    #[test]
    fn unknown_trait_id_is_rejected() {
        let err = TransitionTrait::from_id("VERTEX_BASED").unwrap_err();
        assert_eq!(err.code, ReasonCode::UnknownTransitionTrait);
    }
}
