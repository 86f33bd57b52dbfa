mod ids;
mod track;

pub use ids::{SourceRef, TrackId};
pub use track::Track;
