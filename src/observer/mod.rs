//! Наблюдатели, которых акторы регистрируют через аренду.
//!
//! Три вида (`Message`, `Metric`, `Error`), адаптеры поверх каналов tokio
//! для протокольных адаптеров и панелей мониторинга, и рассылка с изоляцией
//! сбоев.

pub mod channel;
pub mod dispatch;
pub mod traits;

pub use channel::*;
pub use dispatch::{deliver_message, push_error, push_metrics};
pub use traits::*;
