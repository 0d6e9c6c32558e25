use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

fn main() {
    // The crate sits two levels below the repository root, so ask git where its state lives.
    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        println!("cargo:rerun-if-changed={}/HEAD", git_dir);
        println!("cargo:rerun-if-changed={}/index", git_dir);
    }

    let sha = git(&["rev-parse", "--short", "HEAD"]);
    let count = git(&["rev-list", "--count", "HEAD"]).unwrap_or_else(|| "0".to_string());
    // Outside a checkout there is nothing to be dirty against.
    let dirty = match (&sha, Command::new("git").args(["diff", "--quiet"]).status()) {
        (None, _) => "",
        (Some(_), Ok(status)) if status.success() => "",
        (Some(_), _) => ".dirty",
    };

    println!(
        "cargo:rustc-env=SHEETRACK_GIT_SHA={}",
        sha.as_deref().unwrap_or("nogit")
    );
    println!("cargo:rustc-env=SHEETRACK_GIT_COUNT={}", count);
    println!("cargo:rustc-env=SHEETRACK_GIT_DIRTY={}", dirty);
}
