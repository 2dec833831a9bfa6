//! TribalWars Server - SpacetimeDB Module
//!
//! Village economy running as a SpacetimeDB module. Every reducer performs
//! exactly one economy action through `tribal-logic`; clients read villages,
//! stocks, buildings and units by subscribing to the public tables.

mod reducers;
mod repository;
mod tables;

pub use reducers::*;
pub use tables::*;
