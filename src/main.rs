//! Legacy binary entrypoint.
//!
//! The end-to-end registration/verification flow lives in integration tests
//! under `tests/` (see `tests/test_registration_flow.rs`) so it can be run
//! via `cargo test`; the backend index API has its own binary.
//!
//! This binary is intentionally kept minimal to avoid breaking `[[bin]]` wiring in Cargo.toml.

fn main() {
    println!("vibechain: workflows are exercised by the integration tests.");
    println!("Run:");
    println!("  cargo test --test test_registration_flow -- --nocapture");
    println!("or start the backend index API:");
    println!("  cargo run --bin api_server");
}
