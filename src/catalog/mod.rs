//! Каталог ресурсов: цепочка шардов фиксированной ёмкости с постраничным
//! обходом через `ContinuationToken`.

pub mod chain;
pub mod shard;
pub mod token;

pub use chain::CatalogChain;
pub use shard::{AppendOutcome, ShardHandle, ShardState};
pub use token::ContinuationToken;
