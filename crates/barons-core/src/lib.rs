//! Water Barons - a bottled-water industry board game engine
//!
//! This crate provides the core game logic for Water Barons, including:
//! - Card data model and deck handling
//! - Card catalog loading from TOML content files
//! - Player dashboards (CredCoin, reputation, owned cards, futures tokens)
//! - Turn and round progression
//! - Water production and sales to demand segments
//! - The whim draft between rounds and whim effects
//! - Round-end cleanup (impact, futures, thresholds) and final scoring
//!
//! # Architecture
//!
//! The engine is platform-agnostic and never performs I/O except in
//! [`Catalog::load`]. It can be compiled to:
//! - Native Rust for server-side match hosting
//! - WebAssembly for client-side hot-seat play
//!
//! # Modules
//!
//! - [`cards`]: Card instances, decks
//! - [`catalog`]: Card templates, rules, metadata and loading
//! - [`player`]: Player state
//! - [`game`]: Match state and the move engine
//! - [`turn`]: Turn controller
//! - [`draft`]: Whim draft state machine
//! - [`effects`]: Whim effect grammar
//! - [`round_end`]: Round-end cleanup
//! - [`scoring`]: End conditions and final standings
//! - [`snapshot`]: Broadcastable read-only view

pub mod actions;
pub mod cards;
pub mod catalog;
pub mod draft;
pub mod effects;
pub mod game;
pub mod player;
pub mod round_end;
pub mod scoring;
pub mod snapshot;
pub mod tracks;
pub mod turn;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{GameEvent, Move};
pub use cards::{CardInstance, Deck, DeckKind, Decks, TrackId};
pub use catalog::{load_catalog, Catalog, ConfigError, Metadata, Rules};
pub use draft::{DraftState, DraftTicket};
pub use effects::{EffectParseError, WhimEffect};
pub use game::{GameError, GameState};
pub use player::{FuturesPosition, FuturesToken, PlayerId, PlayerState};
pub use round_end::PendingFallout;
pub use scoring::{EndReason, FinalScore, GameOutcome};
pub use snapshot::{DeckSizes, DraftView, GameSnapshot};
pub use tracks::{DemandSegment, ImpactTrack};
