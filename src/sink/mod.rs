// src/sink/mod.rs

pub mod artifact;
pub mod store;

pub use store::Store;
