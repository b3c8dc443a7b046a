mod exposition;
mod staleness;

pub use exposition::{Exposition, DATABASE_LABEL};
pub use staleness::Staleness;
