//! State management module for RankRace.
//!
//! - `card` - Cards and the circular rank comparator
//! - `stack` - LIFO card stacks
//! - `deck` - Seeded deterministic shuffle
//! - `board` - Stack topology and the deal
//! - `player` - Per-side selection, move legality and can-act
//! - `game` - Match phase machine
//! - `bridge` - Peer replication
//! - `config` - Match configuration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── GameOrchestrator ────────────────────────────┐
//! │                                                                          │
//! │  phase: AwaitingPeers → Dealing → Playing ⇄ RecoveryPause → Finished     │
//! │                                                                          │
//! │  ┌──────────── Board ─────────────┐   ┌──────────┐  ┌──────────┐         │
//! │  │ main deck                      │   │ Player 0 │  │ Player 1 │         │
//! │  │ draw pile ×2                   │◀──│ StackIds │  │ StackIds │──┐      │
//! │  │ foundation ×2 (shared)         │   └──────────┘  └──────────┘  │      │
//! │  │ tableau ×5 per side            │◀──────────────────────────────┘      │
//! │  └────────────────────────────────┘                                      │
//! │            ▲ outbox / on_move_received / on_ready_received               │
//! └────────────┼─────────────────────────────────────────────────────────────┘
//!              ▼
//!      ReplicationBridge ◀──────── transport ────────▶ peer
//! ```

pub mod board;
pub mod bridge;
pub mod card;
pub mod config;
pub mod deck;
pub mod game;
pub mod player;
pub mod stack;

// Re-export commonly used types
pub use board::{Board, BoardError, Side, StackId, COLUMNS_PER_SIDE, FOUNDATION_COUNT};
pub use bridge::{
    pump, BridgeError, Envelope, LoopbackEndpoint, LoopbackLink, PeerMessage, ReplicationBridge,
};
pub use card::{distance, is_adjacent, Card, InvalidRank, Suit, DECK_SIZE};
pub use config::{ConfigError, MatchConfig};
pub use game::{GameOrchestrator, MatchError, MatchOutcome, MatchPhase, MatchStats, RecoveryStage};
pub use player::{IllegalMove, Move, MoveHint, Player, Selection};
pub use stack::{Stack, StackError};
