// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Customer reviews ("smiles") and their product references.

mod lookup;

pub use lookup::{product_token, ReviewLookup, ReviewNeighbors, ReviewPage};
