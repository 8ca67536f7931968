pub mod error;
pub mod ids;
pub mod ticks;

pub use error::{ReasonCode, ReasonFamily, RouteError};
pub use ids::{EdgeId, LabelId, NodeId, ProfileId};
pub use ticks::{SECONDS_PER_DAY, Ticks, saturating_advance};
