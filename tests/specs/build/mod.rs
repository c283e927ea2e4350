// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds submitted through the client.

mod failure;
mod forwarding;
mod no_capacity;
mod single_builder;
