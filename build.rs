// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Embeds `PHOCA_VERSION` for `--version` and the startup log line.
//!
//! Release pipelines stamp their run number into the patch segment through
//! `PHOCA_PATCH_VERSION`; local builds keep the patch from Cargo.toml.

use std::env;

const PATCH_OVERRIDE: &str = "PHOCA_PATCH_VERSION";

fn cargo_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("cargo did not set {}", name))
}

fn patch_segment() -> String {
    match env::var(PATCH_OVERRIDE) {
        Ok(patch) if !patch.trim().is_empty() => {
            let patch = patch.trim();
            if !patch.bytes().all(|b| b.is_ascii_digit()) {
                panic!("{} must be a number, got: {}", PATCH_OVERRIDE, patch);
            }
            patch.to_string()
        }
        _ => cargo_var("CARGO_PKG_VERSION_PATCH"),
    }
}

fn main() {
    let version = [
        cargo_var("CARGO_PKG_VERSION_MAJOR"),
        cargo_var("CARGO_PKG_VERSION_MINOR"),
        patch_segment(),
    ]
    .join(".");

    println!("cargo:rustc-env=PHOCA_VERSION={}", version);
    println!("cargo:rerun-if-env-changed={}", PATCH_OVERRIDE);
    println!("cargo:rerun-if-changed=Cargo.toml");
}
