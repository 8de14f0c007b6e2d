pub mod maps;
pub mod scan;
pub mod signatures;
pub mod symbols;
pub mod util;

pub use maps::*;
pub use scan::*;
pub use signatures::*;
pub use symbols::*;
pub use util::*;
