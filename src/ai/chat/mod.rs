mod context;
mod core;
mod models;

pub use self::context::ChatContext;
pub use self::core::ChatBot;
pub use self::models::*;

#[cfg(test)]
pub(crate) mod testing;
