//! Sandbox startup for the sbox runtime.
//!
//! Wires the root namespace and the stdio descriptor table into a
//! process-execution engine and runs the initial program to completion.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod engine;
