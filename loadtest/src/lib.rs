//! Load generator for the product catalog.
//!
//! Many [`user::ProductUser`]s run concurrently, each picking weighted
//! tasks, pausing a random interval between them, and recording every
//! request into its own [`statistics::Statistics`].

pub mod client;
pub mod config;
pub mod scenario;
pub mod statistics;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;
