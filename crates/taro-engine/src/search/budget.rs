//! Per-query and per-request work caps.
//!
//! Budget checks are cold branches: breaching one aborts the search with a
//! typed failure immediately. A cap of zero or below means unbounded.

use taro_common::{ReasonCode, RouteError};

/// Raw cap configuration, bound at startup. Values `<= 0` are unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetConfig {
    pub settled: i64,
    pub labels: i64,
    pub frontier: i64,
    pub row_work: i64,
    pub row_labels: i64,
    pub row_frontier: i64,
    pub request_work: i64,
}

fn cap(raw: i64) -> Option<u64> {
    (raw > 0).then_some(raw as u64)
}

/// Effective caps for one search, with the reason code its breaches emit.
#[derive(Debug, Clone, Copy)]
pub struct SearchBudgets {
    settled: Option<u64>,
    labels: Option<u64>,
    frontier: Option<u64>,
    code: ReasonCode,
}

impl SearchBudgets {
    pub fn unbounded() -> Self {
        Self {
            settled: None,
            labels: None,
            frontier: None,
            code: ReasonCode::SearchBudgetExceeded,
        }
    }

    pub fn per_query(config: &BudgetConfig) -> Self {
        Self {
            settled: cap(config.settled),
            labels: cap(config.labels),
            frontier: cap(config.frontier),
            code: ReasonCode::SearchBudgetExceeded,
        }
    }

    pub fn per_row(config: &BudgetConfig) -> Self {
        Self {
            settled: cap(config.row_work),
            labels: cap(config.row_labels),
            frontier: cap(config.row_frontier),
            code: ReasonCode::MatrixSearchBudgetExceeded,
        }
    }

    #[inline]
    pub fn check_settled(&self, settled: u64) -> Result<(), RouteError> {
        match self.settled {
            Some(cap) if settled > cap => Err(self.breach("settled states", settled, cap)),
            _ => Ok(()),
        }
    }

    #[inline]
    pub fn check_labels(&self, labels: u64) -> Result<(), RouteError> {
        match self.labels {
            Some(cap) if labels > cap => Err(self.breach("labels created", labels, cap)),
            _ => Ok(()),
        }
    }

    #[inline]
    pub fn check_frontier(&self, frontier: u64) -> Result<(), RouteError> {
        match self.frontier {
            Some(cap) if frontier > cap => Err(self.breach("frontier size", frontier, cap)),
            _ => Ok(()),
        }
    }

    fn breach(&self, what: &str, used: u64, cap: u64) -> RouteError {
        RouteError::new(self.code).with_message(format!("{what} reached {used}, budget is {cap}"))
    }
}

/// Work accumulated across every row of one matrix request.
#[derive(Debug)]
pub struct RequestWork {
    cap: Option<u64>,
    used: u64,
}

impl RequestWork {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            cap: cap(config.request_work),
            used: 0,
        }
    }

    #[inline]
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn add(&mut self, work: u64) -> Result<(), RouteError> {
        self.used = self.used.saturating_add(work);
        match self.cap {
            Some(cap) if self.used > cap => {
                Err(RouteError::new(ReasonCode::MatrixSearchBudgetExceeded).with_message(
                    format!("request work reached {}, budget is {cap}", self.used),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_caps_are_unbounded() {
        let budgets = SearchBudgets::per_query(&BudgetConfig {
            settled: 0,
            labels: -5,
            ..Default::default()
        });
        assert!(budgets.check_settled(u64::MAX).is_ok());
        assert!(budgets.check_labels(u64::MAX).is_ok());
    }

    #[test]
    fn breaches_emit_the_right_family() {
        let query = SearchBudgets::per_query(&BudgetConfig {
            settled: 10,
            ..Default::default()
        });
        assert!(query.check_settled(10).is_ok());
        let err = query.check_settled(11).unwrap_err();
        assert_eq!(err.code, ReasonCode::SearchBudgetExceeded);

        let row = SearchBudgets::per_row(&BudgetConfig {
            row_work: 3,
            ..Default::default()
        });
        let err = row.check_settled(4).unwrap_err();
        assert_eq!(err.code, ReasonCode::MatrixSearchBudgetExceeded);
    }

    #[test]
    fn request_work_accumulates_across_rows() {
        let mut work = RequestWork::new(&BudgetConfig {
            request_work: 100,
            ..Default::default()
        });
        assert!(work.add(60).is_ok());
        assert!(work.add(40).is_ok());
        let err = work.add(1).unwrap_err();
        assert_eq!(err.code, ReasonCode::MatrixSearchBudgetExceeded);
    }
}
