// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage backends.
//!
//! - [`sql`]: SQLite or MySQL through the `sqlx` Any driver
//! - [`memory`]: DashMap-backed store for tests and local runs

pub mod memory;
pub mod sql;
pub mod traits;
