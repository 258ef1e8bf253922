//! Blocked path configuration.
//!
//! Read from the environment once per process:
//! 1. `SANDBOX_BLOCKED_PATHS` - colon-separated prefixes (default `/app:/.apps_data`)
//! 2. `SANDBOX_DEBUG` - `1` enables one diagnostic line per decision

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::normalize::{self, as_path};
use crate::resolve::Resolver;

pub const BLOCKED_PATHS_ENV: &str = "SANDBOX_BLOCKED_PATHS";
pub const DEBUG_ENV: &str = "SANDBOX_DEBUG";
pub const DEFAULT_BLOCKED_PATHS: &str = "/app:/.apps_data";

/// Upper bound on configured prefixes. Exceeding it is a configuration
/// error rather than a silent truncation.
pub const MAX_BLOCKED_PATHS: usize = 64;

/// Prefix-with-boundary match: `path == prefix` or `path` continues with `/`
/// right after `prefix`. Both sides must already be normalized.
///
/// ```
/// use std::path::Path;
/// use sandbox_fs_core::config::is_within;
///
/// assert!(is_within(Path::new("/app/secret"), Path::new("/app")));
/// assert!(!is_within(Path::new("/application"), Path::new("/app")));
/// ```
pub fn is_within(path: &Path, prefix: &Path) -> bool {
    let path = path.as_os_str().as_bytes();
    let prefix = prefix.as_os_str().as_bytes();
    if prefix == b"/" {
        return path.first() == Some(&b'/');
    }
    path.starts_with(prefix) && (path.len() == prefix.len() || path[prefix.len()] == b'/')
}

/// Normalized, absolute prefixes without trailing slashes. Immutable once
/// built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedPathSet {
    prefixes: Vec<PathBuf>,
}

impl BlockedPathSet {
    /// Parse a colon-separated list. Tokens are trimmed and normalized;
    /// empty tokens are discarded.
    pub fn parse(spec: &OsStr) -> Result<Self, ConfigError> {
        let tokens: Vec<&[u8]> = spec
            .as_bytes()
            .split(|&b| b == b':')
            .map(trim_whitespace)
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() > MAX_BLOCKED_PATHS {
            return Err(ConfigError::TooManyPaths {
                count: tokens.len(),
                max: MAX_BLOCKED_PATHS,
            });
        }

        let mut prefixes = Vec::new();
        prefixes.try_reserve_exact(tokens.len())?;
        for token in tokens {
            let token = as_path(token);
            if !normalize::is_absolute(token) {
                return Err(ConfigError::RelativePrefix(
                    token.to_string_lossy().into_owned(),
                ));
            }
            let prefix = normalize::normalize(token);
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
        Ok(Self { prefixes })
    }

    /// Add the canonical form of every prefix that exists and is reached
    /// through a symlink, so that the real location is blocked as well.
    pub fn with_canonical_aliases<R: Resolver + ?Sized>(
        mut self,
        resolver: &R,
    ) -> Result<Self, ConfigError> {
        let mut aliases = Vec::new();
        for prefix in &self.prefixes {
            if let Ok(Some(canonical)) = resolver.canonicalize(prefix) {
                if &canonical != prefix
                    && !self.prefixes.contains(&canonical)
                    && !aliases.contains(&canonical)
                {
                    debug!(prefix = %prefix.display(), alias = %canonical.display(), "blocking canonical alias");
                    aliases.push(canonical);
                }
            }
        }
        self.prefixes.try_reserve(aliases.len())?;
        self.prefixes.extend(aliases);
        Ok(self)
    }

    /// First prefix that `path` falls under.
    pub fn matching(&self, path: &Path) -> Option<&Path> {
        self.prefixes
            .iter()
            .map(PathBuf::as_path)
            .find(|prefix| is_within(path, prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.prefixes.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Parsed environment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub blocked: BlockedPathSet,
    pub debug: bool,
}

impl SandboxConfig {
    /// Read `SANDBOX_BLOCKED_PATHS` and `SANDBOX_DEBUG` from the process
    /// environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let paths = std::env::var_os(BLOCKED_PATHS_ENV);
        let debug = std::env::var_os(DEBUG_ENV);
        Self::from_vars(paths.as_deref(), debug.as_deref())
    }

    pub fn from_vars(paths: Option<&OsStr>, debug: Option<&OsStr>) -> Result<Self, ConfigError> {
        let paths = paths.unwrap_or_else(|| OsStr::new(DEFAULT_BLOCKED_PATHS));
        Ok(Self {
            blocked: BlockedPathSet::parse(paths)?,
            debug: debug_requested(debug),
        })
    }

    pub fn with_canonical_aliases<R: Resolver + ?Sized>(
        self,
        resolver: &R,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            blocked: self.blocked.with_canonical_aliases(resolver)?,
            debug: self.debug,
        })
    }
}

/// `SANDBOX_DEBUG` is on only for the exact value `1`.
pub fn debug_requested(value: Option<&OsStr>) -> bool {
    value.map(OsStr::as_bytes) == Some(b"1")
}

fn trim_whitespace(token: &[u8]) -> &[u8] {
    let start = token
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(token.len());
    let end = token
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &token[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeResolver;

    fn parse(spec: &str) -> Result<BlockedPathSet, ConfigError> {
        BlockedPathSet::parse(OsStr::new(spec))
    }

    fn prefixes(set: &BlockedPathSet) -> Vec<&str> {
        set.iter().map(|p| p.to_str().unwrap()).collect()
    }

    #[test]
    fn test_parse_default() {
        let config = SandboxConfig::from_vars(None, None).unwrap();
        assert_eq!(prefixes(&config.blocked), vec!["/app", "/.apps_data"]);
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_trims_and_strips_trailing_slashes() {
        let set = parse("  /app/ : /data//  ::/x/./y/").unwrap();
        assert_eq!(prefixes(&set), vec!["/app", "/data", "/x/y"]);
    }

    #[test]
    fn test_parse_discards_empty_tokens() {
        let set = parse(":::").unwrap();
        assert!(set.is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_dedupes() {
        let set = parse("/app:/app/:/app//").unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_rejects_relative_prefix() {
        let err = parse("/app:data").unwrap_err();
        assert!(matches!(err, ConfigError::RelativePrefix(ref p) if p == "data"));
    }

    #[test]
    fn test_parse_rejects_too_many() {
        let spec: Vec<String> = (0..=MAX_BLOCKED_PATHS).map(|i| format!("/p{i}")).collect();
        let err = parse(&spec.join(":")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::TooManyPaths { count, max } if count == MAX_BLOCKED_PATHS + 1 && max == MAX_BLOCKED_PATHS
        ));

        let spec: Vec<String> = (0..MAX_BLOCKED_PATHS).map(|i| format!("/p{i}")).collect();
        assert_eq!(parse(&spec.join(":")).unwrap().len(), MAX_BLOCKED_PATHS);
    }

    #[test]
    fn test_debug_flag() {
        assert!(debug_requested(Some(OsStr::new("1"))));
        assert!(!debug_requested(Some(OsStr::new("true"))));
        assert!(!debug_requested(Some(OsStr::new(""))));
        assert!(!debug_requested(None));
    }

    #[test]
    fn test_is_within_boundary() {
        let app = Path::new("/app");
        assert!(is_within(Path::new("/app"), app));
        assert!(is_within(Path::new("/app/secret.txt"), app));
        assert!(!is_within(Path::new("/application"), app));
        assert!(!is_within(Path::new("/ap"), app));
        assert!(!is_within(Path::new("/"), app));
    }

    #[test]
    fn test_is_within_root_prefix() {
        assert!(is_within(Path::new("/"), Path::new("/")));
        assert!(is_within(Path::new("/anything/at/all"), Path::new("/")));
    }

    #[test]
    fn test_trailing_slash_config_equivalent() {
        let plain = parse("/app").unwrap();
        let slashed = parse("/app/").unwrap();
        for path in ["/app", "/app/x", "/application", "/ap"] {
            assert_eq!(
                plain.matching(Path::new(path)).is_some(),
                slashed.matching(Path::new(path)).is_some(),
                "{path}"
            );
        }
    }

    #[test]
    fn test_canonical_aliases() {
        let resolver = FakeResolver::new()
            .dir("/srv/app")
            .symlink("/app", "/srv/app")
            .dir("/.apps_data");
        let set = parse("/app:/.apps_data:/missing")
            .unwrap()
            .with_canonical_aliases(&resolver)
            .unwrap();
        assert_eq!(
            prefixes(&set),
            vec!["/app", "/.apps_data", "/missing", "/srv/app"]
        );
        assert_eq!(set.matching(Path::new("/srv/app/secret")), Some(Path::new("/srv/app")));
    }
}
