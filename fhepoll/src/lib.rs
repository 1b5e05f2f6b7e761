mod ballot;
mod client;
mod contract;
mod engine;
mod error;
mod events;
mod poll;
mod registry;
mod session;
mod tracker;

pub use ballot::*;
pub use client::*;
pub use contract::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use poll::*;
pub use registry::*;
pub use session::*;
pub use tracker::*;

#[cfg(test)]
mod tests;
