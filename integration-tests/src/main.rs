//! This crate carries no binary of its own; the scenario tests under
//! `tests/` are the actual deliverable (`cargo test -p integration-tests`).

fn main() {}
