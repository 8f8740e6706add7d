pub mod clock;
pub mod driver;
pub mod runner;

pub use clock::ReplayClock;
pub use driver::{load_slices, rows_to_slices, ReplayInputRow};
pub use runner::{ReplayReport, ReplayRunner, DEFAULT_INTENT_SOURCE};
