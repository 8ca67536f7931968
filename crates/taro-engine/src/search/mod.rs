pub mod astar;
pub mod budget;
pub mod evaluator;
pub mod labels;
pub mod matrix;

pub use astar::{RouteOutcome, SearchEnv, plan_route};
pub use budget::{BudgetConfig, SearchBudgets};
pub use evaluator::{PathEvaluation, evaluate_path};
pub use labels::{Label, LabelStore, QueryContext};
pub use matrix::{MatrixCell, MatrixOutcome, MatrixParams, plan_matrix};
