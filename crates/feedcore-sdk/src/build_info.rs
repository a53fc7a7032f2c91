//! Build metadata, pulled from Cargo at compile time rather than generated.

/// Package metadata for the fetcher supervisor binaries.
#[derive(Debug, Clone)]
pub struct PackageInfo;

impl PackageInfo {
    /// The semantic version of the workspace, from `CARGO_PKG_VERSION`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// The commit hash this binary was built from, if set at compile time.
    pub const COMMIT_HASH: &'static str = match option_env!("FETCHER_COMMIT_HASH") {
        Some(h) => h,
        None => "unknown",
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!PackageInfo::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!PackageInfo::COMMIT_HASH.is_empty());
    }
}
