// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared HTTP client construction.

use std::time::Duration;

/// Build a client with a hard per-request deadline.
///
/// Falls back to the library default client when the builder rejects the
/// configuration (it only fails on TLS backend misconfiguration).
pub(crate) fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Whether a transport error was a deadline/abort rather than a failure
/// reported by the remote end.
pub(crate) fn is_timeout(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
