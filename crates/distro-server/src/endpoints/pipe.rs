//! Post-render command pipelines.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from running a post-render command.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("i/o error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// One command line of a `post_render` list, split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeCommand {
    program: String,
    args: Vec<String>,
}

impl PipeCommand {
    /// Parses a command line. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command with `input` on stdin and returns its stdout.
    pub async fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, PipeError> {
        let command = self.display();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipeError::Spawn {
                command: command.clone(),
                source,
            })?;

        // stdin is written concurrently so a command that streams output
        // before reading all input cannot deadlock.
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let result = stdin.write_all(&input).await;
                drop(stdin);
                result
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| PipeError::Io {
                command: command.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => {
                    warn!(command = %command, "Failed to write command input: {}", e);
                },
                Err(e) => warn!(command = %command, "Input writer task failed: {}", e),
                _ => {},
            }
        }

        if !output.status.success() {
            return Err(PipeError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(command = %command, bytes = output.stdout.len(), "Post-render command finished");
        Ok(output.stdout)
    }
}

/// Pipes `input` through every command in order.
pub async fn run_pipeline(commands: &[PipeCommand], input: Vec<u8>) -> Result<Vec<u8>, PipeError> {
    let mut body = input;
    for command in commands {
        body = command.run(body).await?;
    }
    Ok(body)
}
