fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let describe = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    let hash = describe(&["rev-parse", "--short", "HEAD"]).unwrap_or_default();
    let on_tag = describe(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();

    println!("cargo:rustc-env=BEHAPPY_GIT_HASH={hash}");
    println!("cargo:rustc-env=BEHAPPY_ON_RELEASE_TAG={on_tag}");
}
