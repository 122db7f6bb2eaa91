// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model backend adapter
//!
//! Provides one request/response contract over the supported chat completion
//! providers.

pub mod backend;
pub mod factory;
pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;

pub use backend::{BackendReply, BackendResolver, FixedBackendResolver, ModelBackend};
pub use message::*;
pub use provider::*;
