// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! bizdesk - conversational tool orchestration for a business dashboard.
//!
//! This crate exposes the runtime used by the `bizdesk` CLI (`src/main.rs`)
//! and by any host that embeds the chat assistant.
//!
//! Architecture highlights:
//! - `chat`: turn controller, session state, directive parsing, confirmation and grounding
//! - `llm`: provider abstraction and implementations (Ollama/OpenAI/Gemini/Anthropic)
//! - `tools`: tool registry, executor and the built-in dashboard tools
//! - `store`: organization, meeting note and knowledge graph collaborators
//! - `context`: retrieval context for the system prompt
//! - `agents`: selectable agent configurations

pub mod agents;
pub mod chat;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod store;
pub mod tools;

pub use error::{BizdeskError, Result};
