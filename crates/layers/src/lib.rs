pub mod layer;
pub mod legend;
pub mod symbology;

pub use layer::*;
pub use legend::*;
pub use symbology::*;
