//! Loaders for model catalogs and chain documents

mod catalog;
mod chain;
mod format;

pub use catalog::{load_catalog, parse_catalog};
pub use chain::{load_chain, parse_chain};
pub use format::DocumentFormat;
