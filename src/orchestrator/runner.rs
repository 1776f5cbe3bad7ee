use crate::config::TriadToml;
use crate::errors::InvocationError;
use crate::orchestrator::{AgentInvoker, Invocation, InvocationOutcome, StreamDriver};
use crate::ui::Reporter;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};

/// Launches the agent CLI and streams its output through a [`StreamDriver`].
#[derive(Debug, Clone)]
pub struct ClaudeRunner {
    claude_cmd: String,
    skip_permissions: bool,
}

impl ClaudeRunner {
    pub fn new(claude_cmd: impl Into<String>, skip_permissions: bool) -> Self {
        Self {
            claude_cmd: claude_cmd.into(),
            skip_permissions,
        }
    }

    pub fn from_config(config: &TriadToml) -> Self {
        Self::new(config.claude_cmd(), config.skip_permissions())
    }

    pub fn claude_cmd(&self) -> &str {
        &self.claude_cmd
    }

    /// Flags for a non-interactive, stream-json turn.
    pub fn flags(&self, model: &str, allowed_tools: &[String]) -> Vec<String> {
        let mut flags = Vec::new();
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags.extend(
            [
                "--print",
                "--output-format",
                "stream-json",
                "--verbose",
                "--model",
                model,
            ]
            .map(String::from),
        );
        if !allowed_tools.is_empty() {
            flags.push("--allowedTools".to_string());
            flags.push(allowed_tools.join(","));
        }
        flags
    }

    pub fn prompt_file(invocation: &Invocation) -> Option<PathBuf> {
        Self::log_file(invocation, "prompt.md")
    }

    pub fn output_file(invocation: &Invocation) -> Option<PathBuf> {
        Self::log_file(invocation, "output.log")
    }

    fn log_file(invocation: &Invocation, suffix: &str) -> Option<PathBuf> {
        invocation.log_dir.as_ref().map(|dir| {
            dir.join(format!(
                "iter-{}-{}-{}",
                invocation.iteration, invocation.phase, suffix
            ))
        })
    }

    /// Run an interactive session attached to the terminal. The prompt is
    /// passed as an appended system prompt; returns the exit code.
    pub async fn run_interactive(
        &self,
        system_prompt: &str,
        model: &str,
        allowed_tools: &[String],
        workdir: &Path,
    ) -> Result<Option<i32>, InvocationError> {
        let mut cmd = Command::new(&self.claude_cmd);
        if self.skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }
        cmd.arg("--append-system-prompt")
            .arg(system_prompt)
            .arg("--model")
            .arg(model);
        if !allowed_tools.is_empty() {
            cmd.arg("--allowedTools").arg(allowed_tools.join(","));
        }

        let status = cmd
            .current_dir(workdir)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| InvocationError::SpawnFailed {
                program: self.claude_cmd.clone(),
                source,
            })?;
        Ok(status.code())
    }
}

/// Prompt text plus an `@path` reference for every context file that exists.
pub fn compose_prompt(prompt: &str, context_files: &[PathBuf], workdir: &Path) -> String {
    let refs: Vec<String> = context_files
        .iter()
        .filter(|path| path.exists())
        .map(|path| {
            let shown = path.strip_prefix(workdir).unwrap_or(path);
            format!("@{}", shown.display())
        })
        .collect();

    if refs.is_empty() {
        return prompt.to_string();
    }
    format!("{}\n\n## CONTEXT FILES\n{}\n", prompt.trim_end(), refs.join("\n"))
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::debug!(target: "triad::agent_stderr", "{}", line);
        }
    }
}

#[async_trait]
impl AgentInvoker for ClaudeRunner {
    async fn invoke(
        &self,
        invocation: &Invocation,
        reporter: &dyn Reporter,
    ) -> Result<InvocationOutcome, InvocationError> {
        let prompt = compose_prompt(
            &invocation.prompt,
            &invocation.context_files,
            &invocation.workdir,
        );

        if let Some(path) = Self::prompt_file(invocation) {
            std::fs::write(&path, &prompt)
                .map_err(|source| InvocationError::LogWrite { path, source })?;
        }

        let flags = self.flags(&invocation.model, &invocation.allowed_tools);
        tracing::info!(
            phase = %invocation.phase,
            iteration = invocation.iteration,
            model = %invocation.model,
            max_tokens = invocation.max_tokens,
            "spawning {} {}",
            self.claude_cmd,
            flags.join(" ")
        );

        let mut child = Command::new(&self.claude_cmd)
            .args(&flags)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvocationError::SpawnFailed {
                program: self.claude_cmd.clone(),
                source,
            })?;

        // Feed stdin from its own task so a large prompt cannot stall while
        // stdout goes unread.
        let stdin_task = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(prompt.as_bytes()).await?;
                stdin.shutdown().await
            })
        });
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(drain_stderr(stderr)));

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill().await;
            return Err(InvocationError::MissingStdout);
        };

        let driven = StreamDriver::new(invocation.phase, invocation.max_tokens, reporter)
            .drive(BufReader::new(stdout))
            .await;

        let finished_normally = matches!(&driven, Ok(outcome) if !outcome.terminated_early);
        let exit_code = if finished_normally {
            let status = child.wait().await.map_err(InvocationError::Wait)?;
            status.code()
        } else {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "agent process already gone");
            }
            None
        };

        if let Some(task) = stderr_task {
            if finished_normally {
                let _ = task.await;
            } else {
                task.abort();
            }
        }

        if let Some(task) = stdin_task {
            match task.await {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe && finished_normally => {
                    return Err(InvocationError::StdinWrite(e));
                }
                Ok(Err(e)) => tracing::debug!(error = %e, "agent closed stdin early"),
                _ => {}
            }
        }

        let mut outcome = driven?;
        outcome.exit_code = exit_code;

        if let Some(code) = exit_code
            && code != 0
        {
            tracing::warn!(phase = %invocation.phase, code, "agent exited with non-zero status");
        }

        if let Some(path) = Self::output_file(invocation)
            && let Err(e) = std::fs::write(&path, &outcome.output)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to write output log");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::Phase;
    use crate::signals::SignalKind;
    use crate::ui::NullReporter;
    use tempfile::tempdir;

    fn invocation(workdir: &Path) -> Invocation {
        Invocation {
            phase: Phase::Builder,
            iteration: 2,
            prompt: "Build the thing.".into(),
            model: "sonnet".into(),
            max_tokens: 100_000,
            allowed_tools: vec!["Read".into(), "Bash".into()],
            context_files: Vec::new(),
            workdir: workdir.to_path_buf(),
            log_dir: None,
        }
    }

    #[test]
    fn test_flags_with_skip_permissions() {
        let runner = ClaudeRunner::new("claude", true);
        let flags = runner.flags("opus", &["Read".to_string(), "Edit".to_string()]);
        assert_eq!(
            flags,
            vec![
                "--dangerously-skip-permissions",
                "--print",
                "--output-format",
                "stream-json",
                "--verbose",
                "--model",
                "opus",
                "--allowedTools",
                "Read,Edit",
            ]
        );
    }

    #[test]
    fn test_flags_without_skip_permissions() {
        let runner = ClaudeRunner::new("claude", false);
        let flags = runner.flags("haiku", &[]);
        assert_eq!(flags[0], "--print");
        assert!(!flags.contains(&"--allowedTools".to_string()));
    }

    #[test]
    fn test_compose_prompt_attaches_existing_files_only() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".triad")).unwrap();
        std::fs::write(dir.path().join(".triad/prd.json"), "{}").unwrap();
        let files = vec![
            dir.path().join(".triad/prd.json"),
            dir.path().join(".triad/missing.md"),
        ];

        let prompt = compose_prompt("Do it.\n", &files, dir.path());
        assert_eq!(prompt, "Do it.\n\n## CONTEXT FILES\n@.triad/prd.json\n");

        assert_eq!(compose_prompt("Do it.", &[], dir.path()), "Do it.");
    }

    #[test]
    fn test_log_file_names() {
        let mut inv = invocation(Path::new("/repo"));
        assert!(ClaudeRunner::prompt_file(&inv).is_none());

        inv.log_dir = Some(PathBuf::from("/tmp/logs"));
        assert_eq!(
            ClaudeRunner::prompt_file(&inv).unwrap(),
            PathBuf::from("/tmp/logs/iter-2-builder-prompt.md")
        );
        assert_eq!(
            ClaudeRunner::output_file(&inv).unwrap(),
            PathBuf::from("/tmp/logs/iter-2-builder-output.log")
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempdir().unwrap();
        let runner = ClaudeRunner::new("/nonexistent/triad-agent", false);
        let err = runner
            .invoke(&invocation(dir.path()), &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    fn fake_agent(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-claude.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_streams_signals_and_writes_logs() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        let record = dir.path().join("stdin.txt");
        let args = dir.path().join("args.txt");
        let body = format!(
            r#"printf '%s\n' "$@" > "{args}"
cat > "{record}"
cat <<'JSON'
{{"type":"system","subtype":"init"}}
{{"type":"assistant","message":{{"content":[{{"type":"text","text":"Done.\n###PRD_COMPLETE###"}}],"usage":{{"input_tokens":10,"output_tokens":5}}}}}}
JSON"#,
            args = args.display(),
            record = record.display()
        );
        let script = fake_agent(dir.path(), &body);

        let runner = ClaudeRunner::new(script.to_string_lossy(), false);
        let mut inv = invocation(dir.path());
        inv.log_dir = Some(logs.clone());
        let outcome = runner.invoke(&inv, &NullReporter).await.unwrap();

        assert!(outcome.signals.has(SignalKind::PrdComplete));
        assert!(outcome.output.contains("Done."));
        assert_eq!(
            std::fs::read_to_string(&record).unwrap(),
            "Build the thing."
        );
        let args = std::fs::read_to_string(&args).unwrap();
        assert!(args.contains("stream-json"));
        assert!(args.contains("Read,Bash"));
        assert!(logs.join("iter-2-builder-prompt.md").exists());
        assert!(logs.join("iter-2-builder-output.log").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_reports_exit_code() {
        let dir = tempdir().unwrap();
        let script = fake_agent(
            dir.path(),
            r#"cat > /dev/null
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"thinking"}]}}'
exit 3"#,
        );
        let runner = ClaudeRunner::new(script.to_string_lossy(), false);
        let outcome = runner
            .invoke(&invocation(dir.path()), &NullReporter)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.terminated_early);
        assert!(outcome.signals.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminal_signal_kills_lingering_process() {
        let dir = tempdir().unwrap();
        let script = fake_agent(
            dir.path(),
            r####"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"###BLOCKED:need credentials###"}]}}'
exec sleep 30"####,
        );
        let runner = ClaudeRunner::new(script.to_string_lossy(), false);
        let inv = invocation(dir.path());

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            runner.invoke(&inv, &NullReporter),
        )
        .await
        .expect("invoke should return promptly after a terminal signal")
        .unwrap();

        assert!(outcome.terminated_early);
        assert_eq!(outcome.exit_code, None);
        let blocked = outcome.signals.first(SignalKind::Blocked).unwrap();
        assert_eq!(blocked.detail.as_deref(), Some("need credentials"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_budget_trip_kills_process() {
        let dir = tempdir().unwrap();
        let script = fake_agent(
            dir.path(),
            r#"echo '{"type":"assistant","message":{"content":[],"usage":{"input_tokens":9000,"output_tokens":2000}}}'
exec sleep 30"#,
        );
        let runner = ClaudeRunner::new(script.to_string_lossy(), false);
        let mut inv = invocation(dir.path());
        inv.max_tokens = 10_000;

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            runner.invoke(&inv, &NullReporter),
        )
        .await
        .expect("invoke should return promptly after the budget trips")
        .unwrap();

        assert!(outcome.terminated_early);
        assert!(outcome.signals.has(SignalKind::Bailout));
        assert_eq!(outcome.usage.total_tokens(), 11_000);
    }
}
