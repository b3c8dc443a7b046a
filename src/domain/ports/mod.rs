mod clock;
mod measurement_store;
mod query_source;

pub use clock::{Clock, SystemClock};
pub use measurement_store::MeasurementStore;
pub use query_source::{QueryError, QuerySource};
