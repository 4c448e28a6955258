// Adapters layer: concrete implementations of the domain ports for local
// files, serial devices and recorded landmark streams.

pub mod csv_store;
pub mod replay;
pub mod serial;
pub mod storage;

pub use csv_store::CsvSessionStore;
pub use replay::ReplaySource;
pub use serial::SerialSignal;
pub use storage::LocalStorage;
