//! The term link graph.

pub mod links;

pub use links::{DetachReport, LinkGraph};
