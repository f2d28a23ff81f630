pub mod counters;
pub mod events;

pub use counters::*;
pub use events::*;
