pub mod controller;
pub mod dispatch;
pub mod level;
pub mod reconcile;
pub mod selection;

pub use controller::*;
pub use dispatch::*;
pub use level::*;
pub use reconcile::*;
pub use selection::*;
