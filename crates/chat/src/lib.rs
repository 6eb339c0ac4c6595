//! Chat Integration - gateway bot interface
//!
//! This crate provides the chat-platform surface for brewbot:
//! - **Gateway** (`gateway`) - event stream with reconnection and reply delivery
//! - **Slash Commands** (`commands`) - `/remindme`, `/cancelreminder`, `/coffee-pair`, etc.
//! - **Events** (`events`) - envelope types and handler dispatch
//! - **Platform** (`platform`) - membership lookups and direct messages
//! - **Replies** (`replies`) - every user-facing text the bot sends
//!
//! # Architecture
//!
//! ```text
//! Gateway → EventDispatcher → SlashCommandHandler → CommandRouter → BotCommandService
//!    ↑                                                                    ↓
//!    └──────────────────────────── Reply ────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - event loop with reconnection logic
//! - `EventDispatcher` - routes events to handlers
//! - `BotCommandService` - trait implemented by the scheduler services
//! - `DirectMessenger` / `MembershipDirectory` - outbound platform calls

pub mod commands;
pub mod events;
pub mod gateway;
pub mod platform;
pub mod replies;

pub use commands::{
    BotCommand, BotCommandService, CancelTarget, CommandEnvelope, CommandRouteError,
    CommandRouter, SlashCommandPayload,
};
pub use events::{command_dispatcher, EventDispatcher, GatewayEnvelope, GatewayEvent};
pub use gateway::{GatewayRunner, GatewayTransport, NoopGatewayTransport, TransportError};
pub use platform::{
    ChatError, DirectMessenger, MembershipDirectory, NoopDirectMessenger, NoopMembershipDirectory,
};
pub use replies::Reply;
