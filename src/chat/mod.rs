// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat turn handling
//!
//! [`TurnController`] owns a [`Session`] and runs each utterance through slot
//! extraction, the confirmation gate, the backend call, directive parsing,
//! tool execution and grounding.

pub mod confirmation;
pub mod directive;
pub mod engine;
pub mod grounding;
pub mod intent;
pub mod prompt;
pub mod render;
pub mod session;

pub use confirmation::{ConfirmationState, Decision, PendingCommit};
pub use directive::{parse_directives, ParsedReply};
pub use engine::{EngineDeps, TurnController};
pub use intent::{extract_slots, Slot, SlotSource, Slots};
pub use session::{ChatRole, Message, MessageKind, PageContext, Session, StickyIds};
