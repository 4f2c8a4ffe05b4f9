// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::env::{EnvName, EnvironmentContext};
use std::path::Path;

/// Build an [`EnvironmentContext`] rooted at a temp directory, for tests that
/// need real (but disposable) filesystem paths.
pub fn test_env_context(root: &Path, env: EnvName) -> EnvironmentContext {
    EnvironmentContext::new(env, &root.join("state"), &root.join("config"))
}

#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::env::EnvName;
    use proptest::prelude::*;

    pub fn arb_env_name() -> impl Strategy<Value = EnvName> {
        prop_oneof![
            Just(EnvName::Development),
            Just(EnvName::Staging),
            Just(EnvName::Production),
        ]
    }
}
