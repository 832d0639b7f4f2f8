//! Request handlers.

pub mod accounts;
pub mod records;
pub mod sync;
