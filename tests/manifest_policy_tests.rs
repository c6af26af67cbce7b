#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests for Blackjack Client.
//!
//! These tests parse Cargo.toml and verify that lints, features and the demo
//! and fuzz wiring conform to project policy. If any test fails, the manifest
//! has drifted from the agreed-upon standards.
//!
//! All checks are synchronous filesystem reads; no network access or async
//! runtime needed.

use std::path::PathBuf;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads a file relative to the project root and returns its contents.
fn read_project_file(relative_path: &str) -> String {
    let path = project_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to read '{}': {}. This file is required by project policy.",
            path.display(),
            e
        )
    })
}

/// Parses a TOML file relative to the project root.
fn read_toml(relative_path: &str) -> toml::Table {
    read_project_file(relative_path)
        .parse::<toml::Table>()
        .unwrap_or_else(|e| panic!("{relative_path} is not valid TOML: {e}"))
}

fn manifest() -> toml::Table {
    read_toml("Cargo.toml")
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: panic_policy
// ─────────────────────────────────────────────────────────────────────────────

mod panic_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_denies_all_panic_prone_lints() {
        let manifest = manifest();
        let clippy = manifest["lints"]["clippy"]
            .as_table()
            .expect("Cargo.toml is missing the [lints.clippy] section");

        for lint in REQUIRED_DENY_LINTS {
            assert_eq!(
                clippy.get(*lint).and_then(|v| v.as_str()),
                Some("deny"),
                "Cargo.toml must set `{lint} = \"deny\"` in [lints.clippy] to \
                 enforce the panic-free policy in library code."
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: feature_policy
// ─────────────────────────────────────────────────────────────────────────────

mod feature_policy {
    use super::*;

    #[test]
    fn both_transports_are_on_by_default() {
        let manifest = manifest();
        let default: Vec<&str> = manifest["features"]["default"]
            .as_array()
            .expect("features.default must be an array")
            .iter()
            .filter_map(|v| v.as_str())
            .collect();

        assert!(default.contains(&"transport-tcp"));
        assert!(default.contains(&"transport-websocket"));
    }

    #[test]
    fn websocket_dependencies_are_optional() {
        let manifest = manifest();
        let deps = manifest["dependencies"].as_table().unwrap();

        for name in ["tokio-tungstenite", "futures-util"] {
            let optional = deps[name]
                .get("optional")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            assert!(
                optional,
                "`{name}` must be optional so `default-features = false` builds \
                 do not pull in the WebSocket stack."
            );
        }
    }

    #[test]
    fn core_tokio_features_stay_minimal() {
        let manifest = manifest();
        let features: Vec<&str> = manifest["dependencies"]["tokio"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();

        assert!(
            !features.contains(&"full"),
            "the library must not enable tokio's `full` feature; transports \
             opt into `net` and `io-util` through their own features."
        );
        for needed in ["sync", "macros", "rt", "time"] {
            assert!(features.contains(&needed), "tokio feature `{needed}` missing");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: wiring_policy
// ─────────────────────────────────────────────────────────────────────────────

mod wiring_policy {
    use super::*;

    #[test]
    fn every_demo_target_points_at_an_existing_file() {
        let manifest = manifest();
        let examples = manifest["example"]
            .as_array()
            .expect("Cargo.toml must declare [[example]] targets");

        for example in examples {
            let path = example["path"].as_str().unwrap();
            assert!(
                project_root().join(path).is_file(),
                "example target `{}` points at missing file {path}",
                example["name"]
            );
        }
    }

    #[test]
    fn fuzz_crate_builds_against_this_crate() {
        let fuzz = read_toml("fuzz/Cargo.toml");
        let dep = fuzz["dependencies"]["blackjack-client"]
            .as_table()
            .expect("fuzz/Cargo.toml must depend on blackjack-client");
        assert_eq!(dep["path"].as_str(), Some(".."));

        for target in fuzz["bin"].as_array().unwrap() {
            let path = target["path"].as_str().unwrap();
            assert!(
                project_root().join("fuzz").join(path).is_file(),
                "fuzz target {path} is missing"
            );
        }
    }
}
