pub mod codes;
pub mod geojson;
pub mod records;
pub mod topojson;

pub use codes::*;
pub use geojson::*;
pub use records::*;
pub use topojson::*;
