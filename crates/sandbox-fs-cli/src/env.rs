//! Environment of the sandboxed command.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use sandbox_fs_core::config::{BLOCKED_PATHS_ENV, DEBUG_ENV};

use crate::profile::{ProfileError, SandboxProfile};

/// Put first in `PATH` so that system interpreters win over project ones.
pub const SYSTEM_PATHS: [&str; 6] = [
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/local/sbin",
    "/usr/sbin",
    "/sbin",
];

/// `PATH` entries containing any of these are dropped.
const PATH_EXCLUDES: [&str; 3] = [".venv", "mise/installs", ".local/share/mise"];

const DEFAULT_PATH: &str = "/usr/bin:/bin";

pub type EnvMap = BTreeMap<OsString, OsString>;

/// Inherited variables adjusted for the sandbox: `HOME` and the Python user
/// base moved to `/tmp`, `PYTHONPATH` dropped, `PATH` cleaned, and the
/// preload variables set. `extra` is applied last.
pub fn build_sandbox_env<I>(
    inherited: I,
    profile: &SandboxProfile,
    extra: &[(String, String)],
) -> Result<EnvMap, ProfileError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: EnvMap = inherited.into_iter().collect();

    env.insert("HOME".into(), "/tmp".into());
    env.insert("PYTHONUSERBASE".into(), "/tmp".into());
    env.remove(OsStr::new("PYTHONPATH"));

    let path = env
        .get(OsStr::new("PATH"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_PATH.into());
    env.insert("PATH".into(), sanitize_path(&path));

    env.insert("LD_PRELOAD".into(), profile.library_path.clone().into());
    env.insert(BLOCKED_PATHS_ENV.into(), profile.blocked_paths_value()?);
    if profile.debug {
        env.insert(DEBUG_ENV.into(), "1".into());
    }

    for (key, value) in extra {
        env.insert(key.into(), value.into());
    }
    Ok(env)
}

/// Drop virtualenv and mise entries, then move the system directories to
/// the front in their canonical order.
pub fn sanitize_path(path: &OsStr) -> OsString {
    let mut parts: Vec<&[u8]> = path
        .as_bytes()
        .split(|&b| b == b':')
        .filter(|part| !PATH_EXCLUDES.iter().any(|ex| contains(part, ex.as_bytes())))
        .filter(|part| !SYSTEM_PATHS.iter().any(|sys| *part == sys.as_bytes()))
        .collect();
    for sys in SYSTEM_PATHS.iter().rev() {
        parts.insert(0, sys.as_bytes());
    }
    OsStr::from_bytes(&parts.join(&b':')).to_os_string()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Parse `KEY=VALUE` from the command line.
pub fn parse_env_pair(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {arg:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn inherited(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs.iter().map(|(k, v)| (k.into(), v.into())).collect()
    }

    fn get<'a>(env: &'a EnvMap, key: &str) -> Option<&'a str> {
        env.get(OsStr::new(key)).and_then(|v| v.to_str())
    }

    #[test]
    fn test_sandbox_variables() {
        let profile = SandboxProfile {
            library_path: PathBuf::from("/opt/sandbox_fs.so"),
            debug: true,
            ..Default::default()
        };
        let env = build_sandbox_env(
            inherited(&[("HOME", "/root"), ("PYTHONPATH", "/app"), ("LANG", "C.UTF-8")]),
            &profile,
            &[],
        )
        .unwrap();

        assert_eq!(get(&env, "HOME"), Some("/tmp"));
        assert_eq!(get(&env, "PYTHONUSERBASE"), Some("/tmp"));
        assert_eq!(get(&env, "PYTHONPATH"), None);
        assert_eq!(get(&env, "LANG"), Some("C.UTF-8"));
        assert_eq!(get(&env, "LD_PRELOAD"), Some("/opt/sandbox_fs.so"));
        assert_eq!(get(&env, "SANDBOX_BLOCKED_PATHS"), Some("/app:/.apps_data"));
        assert_eq!(get(&env, "SANDBOX_DEBUG"), Some("1"));
    }

    #[test]
    fn test_no_debug_variable_by_default() {
        let env = build_sandbox_env(inherited(&[]), &SandboxProfile::default(), &[]).unwrap();
        assert_eq!(get(&env, "SANDBOX_DEBUG"), None);
        assert_eq!(
            get(&env, "PATH"),
            Some("/usr/local/bin:/usr/bin:/bin:/usr/local/sbin:/usr/sbin:/sbin")
        );
    }

    #[test]
    fn test_path_sanitized() {
        let path = OsStr::new(
            "/home/u/.venv/bin:/bin:/home/u/.local/share/mise/shims:/opt/tool/bin:/usr/bin:/x/mise/installs/python/bin",
        );
        assert_eq!(
            sanitize_path(path),
            "/usr/local/bin:/usr/bin:/bin:/usr/local/sbin:/usr/sbin:/sbin:/opt/tool/bin"
        );
    }

    #[test]
    fn test_extra_env_applied_last() {
        let extra = vec![("HOME".to_string(), "/home/sandbox".to_string())];
        let env = build_sandbox_env(inherited(&[]), &SandboxProfile::default(), &extra).unwrap();
        assert_eq!(get(&env, "HOME"), Some("/home/sandbox"));
    }

    #[test]
    fn test_invalid_blocked_path_rejected() {
        let profile = SandboxProfile {
            blocked_paths: vec![PathBuf::from("app")],
            ..Default::default()
        };
        assert!(build_sandbox_env(inherited(&[]), &profile, &[]).is_err());
    }

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }
}
