//! Business logic services

pub mod collation;
pub mod geo;
pub mod geocoding;
pub mod openroute;
pub mod optimizer;
pub mod photo_store;
pub mod planner;
pub mod provider;
pub mod routing;
pub mod schedule;
pub mod time_window;
