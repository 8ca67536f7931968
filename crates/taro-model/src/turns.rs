//! Turn-penalty table.

use rustc_hash::FxHashMap;
use taro_common::{EdgeId, ReasonCode, RouteError};

/// Map from `(from_edge, to_edge)` to a penalty in seconds. `+inf` forbids
/// the turn; an absent pair costs nothing.
#[derive(Debug, Default)]
pub struct TurnTable {
    penalties: FxHashMap<(u32, u32), f64>,
}

impl TurnTable {
    pub fn new(entries: impl IntoIterator<Item = (EdgeId, EdgeId, f64)>) -> Result<Self, RouteError> {
        let mut penalties = FxHashMap::default();
        for (from, to, penalty) in entries {
            if penalty.is_nan() || penalty < 0.0 {
                return Err(RouteError::new(ReasonCode::ModelTurnTableInvalid)
                    .with_message(format!("turn ({from:?}, {to:?}) has penalty {penalty}")));
            }
            penalties.insert((from.0, to.0), penalty);
        }
        Ok(Self { penalties })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Penalty for entering `to` from `from`; 0 when the pair is absent.
    #[inline]
    pub fn penalty(&self, from: EdgeId, to: EdgeId) -> f64 {
        self.penalties.get(&(from.0, to.0)).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.penalties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.penalties.is_empty()
    }
}
