//! End-to-end tests: real coreutils running with the built library preloaded.
//!
//! The shim crate is built once per test binary through `cargo build
//! --message-format=json`, which reports where the cdylib landed.

#![cfg(target_os = "linux")]

use std::ffi::CString;
use std::io::BufRead;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use tempfile::TempDir;

fn shim_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        let output = Command::new(cargo)
            .args(["build", "-p", "sandbox-fs-shim", "--message-format=json"])
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .output()
            .expect("Failed to run cargo build");
        assert!(
            output.status.success(),
            "building the shim failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        output
            .stdout
            .as_slice()
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(&line).ok())
            .filter(|msg| msg["reason"] == "compiler-artifact")
            .filter(|msg| msg["target"]["name"] == "sandbox_fs")
            .flat_map(|msg| {
                msg["filenames"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|f| f.as_str().map(PathBuf::from))
            })
            .find(|f| f.extension().is_some_and(|ext| ext == "so"))
            .expect("cargo did not report libsandbox_fs.so")
    })
}

/// `tests/fixtures/fs_calls.c`, compiled once with the system compiler.
fn fs_calls() -> &'static Path {
    static HELPER: OnceLock<PathBuf> = OnceLock::new();
    HELPER.get_or_init(|| {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let out = Path::new(env!("CARGO_TARGET_TMPDIR")).join("fs_calls");
        let status = Command::new(std::env::var("CC").unwrap_or_else(|_| "cc".to_string()))
            .arg("-o")
            .arg(&out)
            .arg(manifest.join("tests/fixtures/fs_calls.c"))
            .status()
            .expect("Failed to run the C compiler");
        assert!(status.success(), "compiling fs_calls.c failed");
        out
    })
}

/// 65 prefixes: one more than the library accepts.
fn too_many_prefixes() -> String {
    (0..65)
        .map(|i| format!("/blocked{i}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// `<root>/app/secret.txt` (blocked) and `<root>/workspace/file.txt`.
struct Sandbox {
    _temp: TempDir,
    root: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("app")).unwrap();
        std::fs::create_dir(root.join("workspace")).unwrap();
        std::fs::write(root.join("app/secret.txt"), "top secret\n").unwrap();
        std::fs::write(root.join("workspace/file.txt"), "hello\n").unwrap();
        Self { _temp: temp, root }
    }

    /// `<root>/app/bin/tool` prints its arguments (a copy of echo);
    /// `<root>/workspace/bin/tool` prints nothing (a copy of true).
    fn with_tools(self) -> Self {
        std::fs::create_dir(self.root.join("app/bin")).unwrap();
        std::fs::create_dir(self.root.join("workspace/bin")).unwrap();
        std::fs::copy("/bin/echo", self.root.join("app/bin/tool")).unwrap();
        std::fs::copy("/bin/true", self.root.join("workspace/bin/tool")).unwrap();
        self
    }

    fn blocked_tool(&self) -> String {
        self.root.join("app/bin/tool").display().to_string()
    }

    fn search_path(&self, dirs: &[&str]) -> String {
        let mut entries: Vec<String> = dirs
            .iter()
            .map(|dir| self.root.join(dir).display().to_string())
            .collect();
        entries.extend(["/usr/bin".to_string(), "/bin".to_string()]);
        entries.join(":")
    }

    fn calls(&self) -> Command {
        self.command(fs_calls().to_str().unwrap())
    }

    fn blocked(&self) -> String {
        self.root.join("app").display().to_string()
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.current_dir(self.root.join("workspace"))
            .env("LD_PRELOAD", shim_library())
            .env("SANDBOX_BLOCKED_PATHS", self.blocked())
            .env_remove("SANDBOX_DEBUG");
        cmd
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_blocked_read_fails_with_eacces() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("cat")
        .arg(sandbox.root.join("app/secret.txt"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Permission denied"), "{}", stderr(&output));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_allowed_read_succeeds() {
    let sandbox = Sandbox::new();
    let output = sandbox.command("cat").arg("file.txt").output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(output.stdout, b"hello\n");
}

#[test]
fn test_traversal_blocked() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("cat")
        .arg("../workspace/../app/secret.txt")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Permission denied"));
}

#[test]
fn test_symlink_chain_blocked() {
    let sandbox = Sandbox::new();
    let root = sandbox.root.display().to_string();

    let first = sandbox.command("ln").args(["-s", &root, "link1"]).output().unwrap();
    assert!(first.status.success(), "{}", stderr(&first));

    let second = sandbox
        .command("ln")
        .args(["-s", "link1/app", "link2"])
        .output()
        .unwrap();
    assert!(!second.status.success());
    assert!(stderr(&second).contains("Permission denied"), "{}", stderr(&second));

    let read = sandbox
        .command("cat")
        .arg("link2/secret.txt")
        .output()
        .unwrap();
    assert!(!read.status.success());
    assert!(read.stdout.is_empty());

    // Going through link1 directly is just as blocked.
    let direct = sandbox
        .command("cat")
        .arg("link1/app/secret.txt")
        .output()
        .unwrap();
    assert!(!direct.status.success());
    assert!(stderr(&direct).contains("Permission denied"));
}

#[test]
fn test_blocked_write_and_delete() {
    let sandbox = Sandbox::new();
    let target = sandbox.root.join("app/new.txt");
    let touch = sandbox.command("touch").arg(&target).output().unwrap();
    assert!(!touch.status.success());
    assert!(!target.exists());

    let rm = sandbox
        .command("rm")
        .arg(sandbox.root.join("app/secret.txt"))
        .output()
        .unwrap();
    assert!(!rm.status.success());
    assert!(sandbox.root.join("app/secret.txt").exists());

    let mv = sandbox
        .command("mv")
        .arg("file.txt")
        .arg(sandbox.root.join("app/stolen.txt"))
        .output()
        .unwrap();
    assert!(!mv.status.success());
    assert!(sandbox.root.join("workspace/file.txt").exists());
}

#[test]
fn test_debug_lines_are_tagged() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("cat")
        .arg(sandbox.root.join("app/secret.txt"))
        .env("SANDBOX_DEBUG", "1")
        .output()
        .unwrap();
    let stderr = stderr(&output);
    assert!(stderr.contains("[sandbox_fs] Sandbox filesystem interception active"));
    assert!(stderr.contains(&format!(
        "[sandbox_fs] DENY {}",
        sandbox.root.join("app/secret.txt").display()
    )));
    for line in stderr.lines().filter(|l| l.contains("ALLOW") || l.contains("DENY ")) {
        assert!(line.starts_with("[sandbox_fs] "), "{line}");
    }
}

#[test]
fn test_no_debug_output_by_default() {
    let sandbox = Sandbox::new();
    let output = sandbox.command("cat").arg("file.txt").output().unwrap();
    assert!(!stderr(&output).contains("[sandbox_fs]"));
}

#[test]
fn test_bad_configuration_fails_closed() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .command("cat")
        .arg("file.txt")
        .env("SANDBOX_BLOCKED_PATHS", too_many_prefixes())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(stderr(&output).contains("[sandbox_fs]"));
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_failed_state_denies_calls_without_a_checked_path() {
    let sandbox = Sandbox::new();
    let run = |args: &[&str]| {
        sandbox
            .calls()
            .args(args)
            .env("SANDBOX_BLOCKED_PATHS", too_many_prefixes())
            .output()
            .unwrap()
    };

    let freopen = run(&["freopen-null", "-"]);
    assert_eq!(stdout(&freopen), "freopen: EACCES\n", "{}", stderr(&freopen));

    let spawnp = run(&["spawnp", "true"]);
    assert_eq!(stdout(&spawnp), "posix_spawnp: ret=EACCES errno=0\n");

    let spawn = run(&["spawn", "/bin/true"]);
    assert_eq!(stdout(&spawn), "posix_spawn: ret=EACCES errno=0\n");

    let execv = run(&["execv", "/bin/echo", "ran"]);
    assert_eq!(stdout(&execv), "execv: EACCES\n");
}

#[test]
fn test_freopen_null_allowed_when_ready() {
    let sandbox = Sandbox::new();
    let output = sandbox.calls().args(["freopen-null", "-"]).output().unwrap();
    assert!(!stdout(&output).contains("EACCES"), "{}", stdout(&output));
}

#[test]
fn test_posix_spawn_reports_denial_as_return_value() {
    let sandbox = Sandbox::new().with_tools();
    let blocked = sandbox
        .calls()
        .args(["spawn", &sandbox.blocked_tool(), "ran"])
        .output()
        .unwrap();
    assert_eq!(stdout(&blocked), "posix_spawn: ret=EACCES errno=0\n");

    let allowed = sandbox
        .calls()
        .args(["spawn", "bin/tool"])
        .output()
        .unwrap();
    assert!(stdout(&allowed).starts_with("posix_spawn: ret=0 "), "{}", stdout(&allowed));
}

#[test]
fn test_posix_spawnp_skips_blocked_candidates() {
    let sandbox = Sandbox::new().with_tools();
    let output = sandbox
        .calls()
        .args(["spawnp", "tool", "ran"])
        .env("PATH", sandbox.search_path(&["app/bin", "workspace/bin"]))
        .output()
        .unwrap();
    // The allowed copy of true ran; the blocked echo did not.
    assert!(stdout(&output).starts_with("posix_spawnp: ret=0 "), "{}", stdout(&output));
    assert!(!stdout(&output).contains("ran"));

    let only_blocked = sandbox
        .calls()
        .args(["spawnp", "tool", "ran"])
        .env("PATH", sandbox.search_path(&["app/bin"]))
        .output()
        .unwrap();
    assert_eq!(stdout(&only_blocked), "posix_spawnp: ret=EACCES errno=0\n");
}

#[test]
fn test_exec_family_denies_blocked_binary() {
    let sandbox = Sandbox::new().with_tools();
    let tool = sandbox.blocked_tool();

    for call in ["execv", "execl", "execvp"] {
        let output = sandbox.calls().args([call, &tool, "ran"]).output().unwrap();
        assert_eq!(stdout(&output), format!("{call}: EACCES\n"));
        assert!(!output.status.success());
    }

    let searched = sandbox
        .calls()
        .args(["execvp", "tool", "ran"])
        .env("PATH", sandbox.search_path(&["app/bin"]))
        .output()
        .unwrap();
    assert_eq!(stdout(&searched), "execvp: EACCES\n");

    // Search moves past the blocked candidate and execs the allowed one.
    let fallback = sandbox
        .calls()
        .args(["execvp", "tool", "ran"])
        .env("PATH", sandbox.search_path(&["app/bin", "workspace/bin"]))
        .output()
        .unwrap();
    assert!(fallback.status.success(), "{}", stderr(&fallback));
    assert_eq!(stdout(&fallback), "");
}

#[test]
fn test_exec_of_allowed_binary_passes_through() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .calls()
        .args(["execl", "/bin/echo"])
        .output()
        .unwrap();
    assert_eq!(stdout(&output), "from-execl\n");
}

#[test]
fn test_fchdir_on_blocked_descriptor() {
    let sandbox = Sandbox::new();
    let open_dir = |dir: &str| {
        let path = CString::new(sandbox.root.join(dir).into_os_string().into_vec()).unwrap();
        // Inherited by the child: no O_CLOEXEC.
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY) };
        assert!(fd >= 0);
        fd
    };

    let blocked = open_dir("app");
    let allowed = open_dir("workspace");
    let denied = sandbox
        .calls()
        .args(["fchdir", &blocked.to_string()])
        .output()
        .unwrap();
    let passed = sandbox
        .calls()
        .args(["fchdir", &allowed.to_string()])
        .output()
        .unwrap();
    unsafe {
        libc::close(blocked);
        libc::close(allowed);
    }
    assert_eq!(stdout(&denied), "fchdir: EACCES\n");
    assert_eq!(stdout(&passed), "fchdir: ok\n");
}

#[test]
fn test_cli_run_under_sandbox() {
    let sandbox = Sandbox::new();
    let output = Command::new(env!("CARGO_BIN_EXE_sandbox-fs"))
        .arg("run")
        .arg("--library")
        .arg(shim_library())
        .args(["--blocked", &sandbox.blocked()])
        .arg("--workdir")
        .arg(sandbox.root.join("workspace"))
        .args(["--", "cat file.txt; cat ../app/secret.txt"])
        .output()
        .unwrap();
    assert_eq!(output.stdout, b"hello\n");
    assert!(stderr(&output).contains("Permission denied"));
    assert!(!output.status.success());
}

#[test]
fn test_cli_run_json_outcome() {
    let sandbox = Sandbox::new();
    let output = Command::new(env!("CARGO_BIN_EXE_sandbox-fs"))
        .arg("run")
        .arg("--json")
        .arg("--library")
        .arg(shim_library())
        .args(["--blocked", &sandbox.blocked()])
        .arg("--workdir")
        .arg(sandbox.root.join("workspace"))
        .args(["--", "cat file.txt"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["stdout"], "hello\n");
    assert_eq!(outcome["return_code"], 0);
    assert_eq!(outcome["timed_out"], false);
}

#[test]
fn test_cli_timeout() {
    let sandbox = Sandbox::new();
    let output = Command::new(env!("CARGO_BIN_EXE_sandbox-fs"))
        .arg("run")
        .arg("--library")
        .arg(shim_library())
        .args(["--timeout", "1"])
        .arg("--workdir")
        .arg(sandbox.root.join("workspace"))
        .args(["--", "echo started; sleep 30"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(124));
    assert_eq!(output.stdout, b"started\n");
    assert!(stderr(&output).contains("timed out"));
}

#[test]
fn test_cli_refuses_without_library() {
    let sandbox = Sandbox::new();
    let marker = sandbox.root.join("workspace/ran");
    let output = Command::new(env!("CARGO_BIN_EXE_sandbox-fs"))
        .arg("run")
        .arg("--library")
        .arg(sandbox.root.join("missing.so"))
        .arg("--workdir")
        .arg(sandbox.root.join("workspace"))
        .args(["--", "touch ran"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Refusing to execute"));
    assert!(!marker.exists());
}

#[test]
fn test_cli_check() {
    let sandbox = Sandbox::new();
    let secret = sandbox.root.join("app/secret.txt");
    let allowed = sandbox.root.join("workspace/file.txt");
    let output = Command::new(env!("CARGO_BIN_EXE_sandbox-fs"))
        .arg("check")
        .args(["--blocked", &sandbox.blocked()])
        .arg(&secret)
        .arg(&allowed)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("DENY {}", secret.display())));
    assert!(stdout.contains(&format!("ALLOW {}", allowed.display())));
}
