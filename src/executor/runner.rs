//! Deploy script staging and subprocess launch
//!
//! The deploy script and its shared helpers are staged into a temp
//! directory (CRLF-normalized, made executable) and run through a login
//! shell in the target folder. On Windows the invocation goes through WSL;
//! hosts with neither bash nor WSL cannot launch at all.

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Builds and starts deployment subprocesses
pub struct ProcessRunner {
    config: DeployConfig,
}

/// A started deployment subprocess
///
/// Holds the staged script files alive for the lifetime of the process;
/// they are removed when this handle is dropped.
#[derive(Debug)]
pub struct LaunchedProcess {
    child: Child,
    _staging: ScriptStaging,
}

#[derive(Debug)]
struct ScriptStaging {
    dir: tempfile::TempDir,
    script_path: PathBuf,
}

impl ProcessRunner {
    pub fn new(config: DeployConfig) -> Self {
        Self { config }
    }

    /// Stage the script for the target folder and spawn the subprocess
    ///
    /// Fails with [`Error::Launch`] when the platform has no viable
    /// execution path or the process cannot be spawned.
    pub fn launch(&self, folder_path: &Path) -> Result<LaunchedProcess> {
        let staging = self.stage_script(folder_path)?;
        let mut command = self.build_command(&staging.script_path, folder_path)?;

        let child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Launch(format!(
                    "Failed to start deployment in {}: {}",
                    folder_path.display(),
                    e
                ))
            })?;

        tracing::info!(
            pid = ?child.id(),
            folder = %folder_path.display(),
            script = %staging.script_path.display(),
            "Deployment subprocess started"
        );

        Ok(LaunchedProcess {
            child,
            _staging: staging,
        })
    }

    /// Write the selected script and its shared helpers to a temp directory
    fn stage_script(&self, folder_path: &Path) -> Result<ScriptStaging> {
        let script_name = self.script_for(folder_path);
        let source = self.config.scripts_dir.join(script_name);
        let content = std::fs::read_to_string(&source).map_err(|e| {
            Error::Launch(format!(
                "failed to read deploy script {}: {}",
                source.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix("deploydeck_")
            .tempdir()
            .map_err(|e| Error::Launch(format!("failed to create temp dir: {}", e)))?;

        let script_path = dir.path().join(script_name);
        write_staged(&script_path, &content, true)?;

        // Shared helpers are sourced by the script relative to its own dir
        let shared_source = self.config.scripts_dir.join("shared");
        if shared_source.is_dir() {
            let shared_dir = dir.path().join("shared");
            std::fs::create_dir_all(&shared_dir)
                .map_err(|e| Error::Launch(format!("failed to create shared dir: {}", e)))?;
            for entry in std::fs::read_dir(&shared_source)
                .map_err(|e| Error::Launch(format!("failed to read shared dir: {}", e)))?
            {
                let entry = entry.map_err(|e| Error::Launch(e.to_string()))?;
                let name = entry.file_name();
                if !name.to_string_lossy().ends_with(".sh") {
                    continue;
                }
                let helper = std::fs::read_to_string(entry.path()).map_err(|e| {
                    Error::Launch(format!(
                        "failed to read shared helper {}: {}",
                        entry.path().display(),
                        e
                    ))
                })?;
                write_staged(&shared_dir.join(name), &helper, false)?;
            }
        }

        Ok(ScriptStaging { dir, script_path })
    }

    /// Customization projects use their own script variant
    fn script_for(&self, folder_path: &Path) -> &str {
        if folder_path.to_string_lossy().contains("customization") {
            &self.config.customization_script_name
        } else {
            &self.config.script_name
        }
    }

    fn build_command(&self, script_path: &Path, folder_path: &Path) -> Result<Command> {
        if cfg!(any(target_os = "linux", target_os = "macos")) {
            let line =
                self.shell_line(&script_path.to_string_lossy(), &folder_path.to_string_lossy());
            let mut command = Command::new("bash");
            command.args(["-l", "-c", line.as_str()]);
            self.apply_env(&mut command);
            Ok(command)
        } else if cfg!(target_os = "windows") {
            if !wsl_available() {
                return Err(Error::Launch(
                    "WSL not available on Windows. Install WSL to run deployments".to_string(),
                ));
            }
            let line = self.shell_line(
                &to_wsl_path(&script_path.to_string_lossy()),
                &to_wsl_path(&folder_path.to_string_lossy()),
            );
            let mut command = Command::new("wsl");
            command.args([
                "--user",
                self.config.wsl_user.as_str(),
                "bash",
                "-l",
                "-c",
                line.as_str(),
            ]);
            self.apply_env(&mut command);
            Ok(command)
        } else {
            Err(Error::Launch(format!(
                "unsupported operating system: {}",
                std::env::consts::OS
            )))
        }
    }

    fn shell_line(&self, script_path: &str, folder_path: &str) -> String {
        let pre = self
            .config
            .pre_command
            .as_deref()
            .map(|c| format!("{} && ", c))
            .unwrap_or_default();
        format!(
            "export MAVEN_OPTS=\"-Dorg.slf4j.simpleLogger.showDateTime=true \
             -Dorg.slf4j.simpleLogger.dateTimeFormat=HH:mm:ss\" && \
             export DEPLOY_VERBOSE=true && {}cd '{}' && bash '{}'",
            pre, folder_path, script_path
        )
    }

    fn apply_env(&self, command: &mut Command) {
        command
            .env("TERM", "xterm-256color")
            .env("COLUMNS", "120")
            .env("LINES", "30");
    }
}

impl LaunchedProcess {
    /// Take the stdout pipe (present exactly once after launch)
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe (present exactly once after launch)
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the subprocess to exit
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Collect all output and the exit status (one-shot runs)
    pub async fn wait_with_output(self) -> std::io::Result<std::process::Output> {
        self.child.wait_with_output().await
    }

    /// Terminate the subprocess, escalating to a hard kill after 5 seconds
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let wait = tokio::time::timeout(std::time::Duration::from_secs(5), self.child.wait());
        if wait.await.is_err() {
            tracing::warn!("Force killing deployment subprocess");
            let _ = self.child.kill().await;
        }
    }
}

/// Write staged content with normalized line endings
fn write_staged(path: &Path, content: &str, executable: bool) -> Result<()> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    std::fs::write(path, normalized)
        .map_err(|e| Error::Launch(format!("failed to stage {}: {}", path.display(), e)))?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::Launch(format!("failed to chmod {}: {}", path.display(), e)))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}

fn wsl_available() -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join("wsl.exe").exists() || dir.join("wsl").exists())
}

/// Convert `C:\work\repo` to `/mnt/c/work/repo`
fn to_wsl_path(windows_path: &str) -> String {
    let forward = windows_path.replace('\\', "/");
    let bytes = forward.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        format!("/mnt/{}{}", drive, &forward[2..])
    } else {
        forward
    }
}
