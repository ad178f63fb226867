//! Build script to capture the git commit hash at compile time
//!
//! Container builds usually have no `.git`; they pass `GIT_HASH` instead.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=GIT_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let from_env = std::env::var("GIT_HASH").ok().filter(|h| !h.trim().is_empty());
    let git_hash = from_env.unwrap_or_else(|| {
        match Command::new("git").args(["rev-parse", "--short", "HEAD"]).output() {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            _ => String::from("unknown"),
        }
    });

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
}
