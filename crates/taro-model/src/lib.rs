pub mod fixture;
pub mod landmarks;
pub mod mapper;
pub mod metadata;
pub mod profiles;
pub mod spatial;
pub mod topology;
pub mod turns;

pub use landmarks::LandmarkArtifact;
pub use mapper::IdMapper;
pub use metadata::{ModelMetadata, TimeUnit};
pub use profiles::{DayMask, Profile, ProfileStore};
pub use spatial::KdTree;
pub use topology::{Coordinate, GraphTopology};
pub use turns::TurnTable;
