// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde::de::DeserializeOwned;

use crate::error::{ApiError, BizdeskError, Result};
use crate::llm::message::{PromptMessage, Role};

/// Marker placed before system instructions folded into a user message.
pub(crate) const FOLDED_SYSTEM_PREFIX: &str = "[システム指示]";

/// Map a transport failure, naming the provider for connection errors.
pub(crate) fn send_error(err: reqwest::Error, provider: &str) -> BizdeskError {
    if err.is_connect() {
        BizdeskError::Api(ApiError::Network(format!(
            "Could not connect to {}: {}",
            provider, err
        )))
    } else {
        BizdeskError::Http(err)
    }
}

/// Construct a rejection carrying the raw provider payload.
pub(crate) fn rejected(status: u16, payload: impl Into<String>) -> BizdeskError {
    BizdeskError::Api(ApiError::BackendRejected {
        status: Some(status),
        payload: payload.into(),
    })
}

/// Read a response body, rejecting non-2xx statuses and undecodable payloads.
pub(crate) async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(rejected(status.as_u16(), body));
    }
    serde_json::from_str(&body).map_err(|e| {
        tracing::debug!(target: "bizdesk.llm", error = %e, "undecodable provider payload");
        BizdeskError::malformed_payload(body)
    })
}

/// Fold all system content into the first user message.
///
/// Used for backends that have no system role. When there is no user message
/// the instructions become one.
pub(crate) fn fold_system_into_first_user(messages: &[PromptMessage]) -> Vec<PromptMessage> {
    let (system, mut rest) = crate::llm::message::split_system(messages);
    let Some(system) = system else {
        return rest;
    };
    let folded = format!("{} {}", FOLDED_SYSTEM_PREFIX, system);
    match rest.iter_mut().find(|m| m.role == Role::User) {
        Some(first_user) => {
            first_user.content = format!("{}\n\n{}", folded, first_user.content);
        }
        None => rest.insert(0, PromptMessage::user(folded)),
    }
    rest
}
