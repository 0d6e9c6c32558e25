/// `<package version>+git.<commit count>.<short sha>[.dirty]`, or `...+git.0.nogit` when built
/// outside a git checkout.
pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("SHEETRACK_GIT_COUNT"),
    ".",
    env!("SHEETRACK_GIT_SHA"),
    env!("SHEETRACK_GIT_DIRTY")
);
