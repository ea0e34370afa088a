pub mod cleanup;
pub mod data;
pub mod registry;

pub use cleanup::*;
pub use data::*;
pub use registry::*;
