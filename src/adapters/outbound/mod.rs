mod connection_registry;
mod dashmap_measurement_store;
mod mysql_source;
mod sqlite_source;

pub use connection_registry::ConnectionRegistry;
pub use dashmap_measurement_store::DashMapMeasurementStore;
pub use mysql_source::MySqlSource;
pub use sqlite_source::SqliteSource;
