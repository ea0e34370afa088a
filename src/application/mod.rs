pub mod access_port;
pub mod index_policy;
pub mod state_port;

pub use access_port::{AccessControl, AllowAll, Claims, Decision, Operation};
pub use index_policy::{AllFiltersMatch, AnyFilterMatches, IndexMatchPolicy};
pub use state_port::StateStore;
