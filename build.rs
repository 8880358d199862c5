fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let git = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let tagged = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();
    let version = match git(&["rev-parse", "--short", "HEAD"]) {
        _ if tagged => pkg,
        Some(hash) if !hash.is_empty() => format!("{pkg}+{hash}"),
        _ => format!("{pkg}+dev"),
    };

    println!("cargo:rustc-env=DATED_GALLERY_VERSION={version}");
}
