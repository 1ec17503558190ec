//! Database queries

pub mod order;
pub mod settings;
