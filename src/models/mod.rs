pub mod identity;
pub mod log;
pub mod metadata;

pub use identity::*;
pub use log::*;
pub use metadata::*;
