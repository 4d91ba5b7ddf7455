//! Test helpers para distro-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod fixtures;
pub mod git;

pub use client::{TestClient, TestResponse};
pub use fixtures::{FlakySource, Tree};
