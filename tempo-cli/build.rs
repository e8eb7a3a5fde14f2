use std::process::Command;

// TEMPO_BUILD_SHA: an explicit env value (release builds from tarballs), else `git describe`.
fn main() {
    println!("cargo:rerun-if-env-changed=TEMPO_BUILD_SHA");
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let sha = std::env::var("TEMPO_BUILD_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TEMPO_BUILD_SHA={sha}");
}

fn git_describe() -> Option<String> {
    let root = std::path::Path::new(&std::env::var("CARGO_MANIFEST_DIR").ok()?).join("..");
    let out = Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}
