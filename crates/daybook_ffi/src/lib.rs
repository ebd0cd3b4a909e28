//! Flutter bridge crate for the Daybook core.

pub mod api;
