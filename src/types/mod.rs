//! Type definitions

pub mod messages;
pub mod order;
pub mod route;
pub mod settings;

pub use messages::*;
pub use order::*;
pub use route::*;
pub use settings::*;
