//! Village economy logic for TribalWars.
//!
//! This crate contains the economy rules and the action surface that sits on
//! top of them. It has no database or network dependency: storage is reached
//! through the [`repository::Repository`] trait, time through
//! [`clock::Clock`], so the same code runs inside the SpacetimeDB module, the
//! headless simtest and unit tests.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`clock`] | Injectable time source, microsecond timestamps |
//! | [`config`] | Tunable economy parameters, JSON loading |
//! | [`costs`] | Building upgrade curve (×2.5 per level), unit recruitment |
//! | [`error`] | Typed action failures and repository errors |
//! | [`kinds`] | Resource, building and unit enums with fixed cost tables |
//! | [`ledger`] | Lazy accrual and all-or-nothing debits on a village stock |
//! | [`limits`] | Village cap from the owner's highest townhall |
//! | [`memory`] | In-process repository with per-village locking |
//! | [`production`] | Per-minute output of lumbermill, claypit, ironmine |
//! | [`repository`] | Storage contract: units of work, scopes, row types |
//! | [`resources`] | Wood/clay/iron bundles |
//! | [`service`] | The game actions: resources, buildings, units, villages |

pub mod clock;
pub mod config;
pub mod costs;
pub mod error;
pub mod kinds;
pub mod ledger;
pub mod limits;
pub mod memory;
pub mod production;
pub mod repository;
pub mod resources;
pub mod service;

pub use error::{EconomyError, RepositoryError};
pub use service::EconomyService;
