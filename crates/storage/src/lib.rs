// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-storage: store contract, in-memory store, and the mutation ledger

mod ledger;
mod memory;
mod store;

pub use ledger::{result_hash, MutationLedger, RecordOutcome, RESULT_HASH_MAX_BYTES};
pub use memory::MemoryStore;
pub use store::{DdlOptions, Store, StoreError};
