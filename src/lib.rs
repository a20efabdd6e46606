//! RankRace State Library
//!
//! This crate provides the game state for RankRace, a two-player race to
//! empty five tableau columns onto two shared foundations. A card may land on
//! a foundation when its rank is one step from the foundation top, with Ace
//! and King adjacent.
//!
//! # Overview
//!
//! - **Deterministic deal** - Both peers shuffle the same deck from a shared
//!   seed, so no deck is ever transmitted.
//!
//! - **Board model** - Every card lives in exactly one stack; cards move only
//!   by popping one stack and pushing another, so the board always holds 52.
//!
//! - **Match phases** - Waiting for peers, dealing, play, stalemate recovery
//!   and the final result, driven by an explicit `tick` plus event handlers.
//!
//! - **Replication** - Each peer is authoritative over its own stacks and
//!   mirrors the opponent's moves as they arrive.
//!
//! # Design Principles
//!
//! 1. **No networking** - The bridge is a trait; the crate never opens sockets.
//!
//! 2. **No hidden scheduling** - Waits are phase data resumed by `tick` or by
//!    an event, never a sleeping task.
//!
//! 3. **Serialization-ready** - Model types derive serde and the orchestrator
//!    renders a JSON snapshot for clients.
//!
//! # Example
//!
//! ```rust
//! use rankrace_state::{pump, GameOrchestrator, LoopbackLink, MatchConfig, MatchPhase, Side};
//!
//! let link = LoopbackLink::new(1234);
//! let mut endpoint = link.endpoint(Side::First);
//! let mut game = GameOrchestrator::new(MatchConfig::default(), Side::First).unwrap();
//!
//! // Nothing happens until the bridge starts the shared countdown
//! pump(&mut game, &mut endpoint, 0.016).unwrap();
//! assert_eq!(game.phase(), MatchPhase::AwaitingPeers);
//!
//! link.start_countdown(3.0);
//! pump(&mut game, &mut endpoint, 0.016).unwrap();
//! assert_eq!(game.phase().as_str(), "dealing");
//! assert_eq!(game.board().total_cards(), 52);
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
