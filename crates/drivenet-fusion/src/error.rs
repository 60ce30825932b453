// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ingest error taxonomy
//!
//! A malformed payload is a per-stream, locally-recovered condition: the
//! stream is marked not-fresh and the buffer stays usable. Nothing in this
//! crate is fatal.

use crate::stream::StreamKind;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload could not be reduced to the expected channel shape.
    /// The stream's freshness flag has already been cleared; channels
    /// committed by other streams are untouched.
    #[error("malformed {} payload: {reason}", kind.name())]
    MalformedPayload { kind: StreamKind, reason: String },
}

impl IngestError {
    pub fn malformed(kind: StreamKind, reason: impl Into<String>) -> Self {
        IngestError::MalformedPayload {
            kind,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            IngestError::MalformedPayload { kind, .. } => *kind,
        }
    }
}
