// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::collections::HashMap;

use crate::{File, Job};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for scheduler inputs.
pub mod strategies {
    use proptest::prelude::*;

    /// A sequence of builder loads, as reported by status updates.
    pub fn arb_loads(max_len: usize) -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::vec(0usize..64, 1..max_len)
    }
}

// ── Build graph fixtures ────────────────────────────────────────────────

/// `n` compile jobs (`obj0.o`..) each consuming a shipped source, plus a
/// link job producing `app` from all of them.
pub fn compile_and_link(n: u32) -> (Vec<Job>, HashMap<String, File>) {
    let mut jobs = Vec::new();
    let mut files = HashMap::new();
    for i in 0..n {
        let src = format!("src{i}.c");
        let obj = format!("obj{i}.o");
        files.insert(src.clone(), File::new(src.clone(), format!("int f{i}(void);")));
        jobs.push(Job::new(i, "cc", obj.clone()).with_args(["-c", src.as_str()]).with_deps([src]));
    }
    let objs: Vec<String> = (0..n).map(|i| format!("obj{i}.o")).collect();
    jobs.push(Job::new(n, "ld", "app").with_args(objs.clone()).with_deps(objs));
    (jobs, files)
}
