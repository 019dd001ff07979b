//! Genetic-algorithm subset recommender for music merchandise.
//!
//! Given a catalog of tagged products, a listener's taste profile, a price range and a
//! preference mode, the engine evolves a binary inclusion vector over the in-range products
//! and returns the subset with the best affinity-minus-penalties fitness. An evaluation
//! harness scores recommendations offline and runs benchmark matrices.

pub mod catalog;
pub mod config;
pub mod evaluation;
pub mod evolution;
pub mod export;
pub mod profile;
pub mod scoring;
