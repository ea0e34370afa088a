//! Привязки хранилища состояния акторов.
//!
//! - `memory`: `InMemoryStateStore` на `DashMap`, привязка по умолчанию.

pub mod memory;

pub use memory::*;
