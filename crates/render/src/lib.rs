pub mod adapter;
pub mod camera;
pub mod engine;
pub mod legend;
pub mod markers;
pub mod recording;

pub use adapter::*;
pub use camera::*;
pub use engine::*;
pub use legend::*;
pub use markers::*;
pub use recording::*;
