pub mod clock;
pub mod day;
pub mod engine;
pub mod export;
pub mod record;
pub mod store;

pub use engine::Engine;

/// Engine wiring used by the HTTP layer.
pub type AppEngine = Engine<store::SqliteStore, clock::SystemClock>;
