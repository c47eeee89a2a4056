//! The three sandboxed operations behind the agent's tools.
//!
//! | Operation | Tool name | Purpose |
//! |-----------|-----------|---------|
//! | [`read_file`] | `read_file` | Read a UTF-8 text file |
//! | [`write_file`] | `write_file` | Create or overwrite a text file |
//! | [`execute_command`] | `execute_command` | Run a screened shell command |
//!
//! None of them return `Err`. Every failure, including a sandbox violation,
//! comes back as a descriptive string so the model can read it and adjust.

use std::path::{MAIN_SEPARATOR, Path};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::sandbox::{DRIVE_SEPARATOR, PARENT_DIR_TOKEN, PathSandbox};

/// Result string when a command produced nothing on either stream.
pub const NO_OUTPUT_MESSAGE: &str = "Command executed successfully with no output.";

// ── File operations ─────────────────────────────────────────────────

/// Read a file under the sandbox root.
pub async fn read_file(sandbox: &PathSandbox, file_path: &str) -> String {
    let path = match sandbox.resolve(file_path) {
        Ok(p) => p,
        Err(e) => return format!("Error reading file: {e}"),
    };
    match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => format!("Error reading file: {e}"),
    }
}

/// Create or truncate a file under the sandbox root and write `content`
/// verbatim. Parent directories are not created.
pub async fn write_file(sandbox: &PathSandbox, file_path: &str, content: &str) -> String {
    let path = match sandbox.resolve(file_path) {
        Ok(p) => p,
        Err(e) => return format!("Error writing file: {e}"),
    };
    match fs::write(&path, content).await {
        Ok(()) => format!("File '{file_path}' written successfully."),
        Err(e) => format!("Error writing file: {e}"),
    }
}

// ── Command screening ───────────────────────────────────────────────

/// Why a command was refused before anything ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    /// A path-like token resolves outside the sandbox.
    #[error("Command blocked: '{0}' is outside the allowed directory.")]
    TokenOutside(String),
    /// The raw command string references a parent directory, starts at an
    /// absolute root, or names a drive in its program token.
    #[error("Command blocked: Outside directory access is not allowed.")]
    OutsideAccess,
    /// The command line could not be split into words.
    #[error("Error executing command: {0}")]
    Malformed(String),
}

/// Screen a command line against the sandbox without running it.
///
/// Path-like tokens (those containing a separator) must each pass
/// [`PathSandbox::is_within`]. The raw string is then checked as a whole.
pub fn screen_command(sandbox: &PathSandbox, command: &str) -> Result<(), CommandRejection> {
    let tokens =
        shell_words::split(command).map_err(|e| CommandRejection::Malformed(e.to_string()))?;

    if let Some(token) = tokens
        .iter()
        .filter(|t| is_path_like(t))
        .find(|t| !sandbox.is_within(t))
    {
        return Err(CommandRejection::TokenOutside(token.clone()));
    }

    let Some(program) = tokens.first() else {
        return Err(CommandRejection::Malformed("empty command".to_string()));
    };

    if command.contains(PARENT_DIR_TOKEN)
        || command.starts_with('/')
        || command.starts_with('\\')
        || program.contains(DRIVE_SEPARATOR)
    {
        return Err(CommandRejection::OutsideAccess);
    }
    Ok(())
}

fn is_path_like(token: &str) -> bool {
    token.contains('/') || token.contains(MAIN_SEPARATOR)
}

// ── Command execution ───────────────────────────────────────────────

/// Screen `command` and, if it passes, run it in the sandbox root.
pub async fn execute_command(sandbox: &PathSandbox, command: &str) -> String {
    if let Err(rejection) = screen_command(sandbox, command) {
        debug!("Command refused: {rejection}");
        return rejection.to_string();
    }
    run_shell(sandbox.root(), command).await
}

/// Run a command line through the platform shell in `workdir`.
///
/// The child inherits the environment, gets no stdin, and has stdout and
/// stderr captured separately. The exit status is not reported.
pub async fn run_shell(workdir: &Path, command: &str) -> String {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C");
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c");
        c
    };

    match cmd
        .arg(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => {
            debug!("Command exited with {}", output.status);
            format_output(&output.stdout, &output.stderr)
        }
        Err(e) => format!("Error executing command: {e}"),
    }
}

/// Label the captured streams. Each stream is trimmed first; an empty
/// stream is omitted.
fn format_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", "") => NO_OUTPUT_MESSAGE.to_string(),
        (out, "") => format!("Stdout:\n{out}"),
        ("", err) => format!("Stderr:\n{err}"),
        (out, err) => format!("Stdout:\n{out}\n\nStderr:\n{err}"),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, PathSandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (_dir, sandbox) = sandbox();
        let result = write_file(&sandbox, "notes.txt", "line one\nline two\n").await;
        assert_eq!(result, "File 'notes.txt' written successfully.");
        assert_eq!(
            read_file(&sandbox, "notes.txt").await,
            "line one\nline two\n"
        );
    }

    #[tokio::test]
    async fn write_truncates_existing_file() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("a.txt"), "a much longer original").unwrap();
        write_file(&sandbox, "a.txt", "short").await;
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "short");
    }

    #[tokio::test]
    async fn write_does_not_create_parent_directories() {
        let (dir, sandbox) = sandbox();
        let result = write_file(&sandbox, "missing/dir/file.txt", "x").await;
        assert!(result.starts_with("Error writing file: "), "{result}");
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn read_missing_file_reports_error() {
        let (_dir, sandbox) = sandbox();
        let result = read_file(&sandbox, "nope.txt").await;
        assert!(result.starts_with("Error reading file: "), "{result}");
    }

    #[tokio::test]
    async fn read_non_utf8_file_reports_error() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("bin.dat"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let result = read_file(&sandbox, "bin.dat").await;
        assert!(result.starts_with("Error reading file: "), "{result}");
    }

    #[tokio::test]
    async fn file_operations_refuse_escapes() {
        let (dir, sandbox) = sandbox();
        assert_eq!(
            read_file(&sandbox, "../etc/passwd").await,
            "Error reading file: Access outside the working directory is not allowed."
        );
        assert_eq!(
            write_file(&sandbox, "/tmp/evil.txt", "x").await,
            "Error writing file: Access outside the working directory is not allowed."
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn command_stdout_only() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
        assert_eq!(
            execute_command(&sandbox, "cat notes.txt").await,
            "Stdout:\nhello"
        );
    }

    #[tokio::test]
    async fn command_runs_in_sandbox_root() {
        let (dir, sandbox) = sandbox();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "inner").unwrap();
        assert_eq!(
            execute_command(&sandbox, "cat sub/inner.txt").await,
            "Stdout:\ninner"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_stderr_only() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            execute_command(&sandbox, "echo problem >&2").await,
            "Stderr:\nproblem"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_both_streams() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(
            execute_command(&sandbox, "echo out; echo err >&2").await,
            "Stdout:\nout\n\nStderr:\nerr"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_without_output() {
        let (_dir, sandbox) = sandbox();
        assert_eq!(execute_command(&sandbox, "true").await, NO_OUTPUT_MESSAGE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_still_reports_streams() {
        let (_dir, sandbox) = sandbox();
        let result = execute_command(&sandbox, "cat missing.txt").await;
        assert!(result.starts_with("Stderr:\n"), "{result}");
    }

    #[tokio::test]
    async fn blocked_token_is_named_and_nothing_runs() {
        let (dir, sandbox) = sandbox();
        assert_eq!(
            execute_command(&sandbox, "ls ../").await,
            "Command blocked: '../' is outside the allowed directory."
        );
        assert_eq!(
            execute_command(&sandbox, "touch created.txt /etc/hosts").await,
            "Command blocked: '/etc/hosts' is outside the allowed directory."
        );
        assert!(!dir.path().join("created.txt").exists());
    }

    #[tokio::test]
    async fn whole_string_checks_block_without_separator() {
        let (_dir, sandbox) = sandbox();
        for command in ["cat ..secret", "C:evil.exe", "cd .. ; ls"] {
            assert_eq!(
                execute_command(&sandbox, command).await,
                "Command blocked: Outside directory access is not allowed.",
                "{command}"
            );
        }
    }

    #[tokio::test]
    async fn malformed_command_is_an_execution_error() {
        let (_dir, sandbox) = sandbox();
        let result = execute_command(&sandbox, "echo 'unbalanced").await;
        assert!(result.starts_with("Error executing command: "), "{result}");
        assert_eq!(
            execute_command(&sandbox, "   ").await,
            "Error executing command: empty command"
        );
    }

    #[test]
    fn quoted_tokens_are_screened_as_one_word() {
        let (_dir, sandbox) = sandbox();
        assert!(screen_command(&sandbox, "grep 'a b' docs/readme.md").is_ok());
        assert_eq!(
            screen_command(&sandbox, "cat '../my notes/a.txt'"),
            Err(CommandRejection::TokenOutside("../my notes/a.txt".into()))
        );
    }

    #[test]
    fn output_labels() {
        assert_eq!(format_output(b"  a\n", b""), "Stdout:\na");
        assert_eq!(format_output(b"", b"\tb\n"), "Stderr:\nb");
        assert_eq!(format_output(b"a", b"b"), "Stdout:\na\n\nStderr:\nb");
        assert_eq!(format_output(b"\n", b" "), NO_OUTPUT_MESSAGE);
    }
}
