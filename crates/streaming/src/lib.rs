pub mod boundary;
pub mod request;
pub mod residency;

pub use boundary::*;
pub use request::*;
pub use residency::*;
