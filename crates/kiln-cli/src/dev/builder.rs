//! Build strategies driven by the coordinator.
//!
//! A [`Builder`] performs one full build and reports success or failure.
//! Compilation itself happens elsewhere: either a command we spawn
//! ([`CommandBuilder`]) or a host process we talk to over a pair of byte
//! channels ([`IpcBuilder`]).

use crate::error::{BuildError, ProtocolError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Mutex;

/// One full build. Implementations must not be invoked concurrently; the
/// coordinator guarantees that.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn run(&self) -> Result<(), BuildError>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// Runs a command for every build. A non-zero exit is a failed build.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Builder for CommandBuilder {
    async fn run(&self) -> Result<(), BuildError> {
        tracing::debug!("Running `{}`", self.describe());

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.trim().is_empty() {
            combined = format!("`{}` exited with {}", self.describe(), output.status);
        }
        Err(BuildError::Failed {
            output: combined.trim_end().to_string(),
        })
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Byte written to request a build.
pub const BUILD_REQUEST: u8 = 1;
/// Response byte for a failed build.
pub const BUILD_FAILED: u8 = 0;
/// Response byte for a successful build.
pub const BUILD_SUCCEEDED: u8 = 1;

/// Asks a host process to build over two unidirectional byte channels.
///
/// Each build writes [`BUILD_REQUEST`] and reads exactly one response byte.
/// End of stream or any byte other than [`BUILD_FAILED`]/[`BUILD_SUCCEEDED`]
/// is a [`ProtocolError`].
pub struct IpcBuilder<W, R> {
    channels: Mutex<(W, R)>,
}

impl<W, R> IpcBuilder<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    pub fn new(request: W, response: R) -> Self {
        Self {
            channels: Mutex::new((request, response)),
        }
    }

    async fn exchange(&self) -> Result<u8, ProtocolError> {
        let mut channels = self.channels.lock().await;
        let (request, response) = &mut *channels;

        request.write_all(&[BUILD_REQUEST]).await?;
        request.flush().await?;

        let mut byte = [0u8; 1];
        match response.read(&mut byte).await? {
            0 => Err(ProtocolError::ChannelClosed),
            _ => Ok(byte[0]),
        }
    }
}

impl IpcBuilder<tokio::fs::File, tokio::fs::File> {
    /// Open the named pipes created by the build host.
    ///
    /// The request pipe is opened first, matching the order the host opens
    /// them in; opening a FIFO blocks until the other end shows up.
    pub async fn open(request: &Path, response: &Path) -> Result<Self, ProtocolError> {
        let request_file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(request)
            .await?;
        let response_file = tokio::fs::OpenOptions::new()
            .read(true)
            .open(response)
            .await?;
        tracing::debug!(
            "Connected to build host via {} and {}",
            request.display(),
            response.display()
        );
        Ok(Self::new(request_file, response_file))
    }
}

#[async_trait]
impl<W, R> Builder for IpcBuilder<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    async fn run(&self) -> Result<(), BuildError> {
        match self.exchange().await? {
            BUILD_SUCCEEDED => Ok(()),
            BUILD_FAILED => Err(BuildError::Failed {
                output: String::new(),
            }),
            other => Err(ProtocolError::UnexpectedResponse(other).into()),
        }
    }

    fn describe(&self) -> String {
        "build host".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    /// Reads requests from `requests` and answers each with the next byte of `answers`.
    fn spawn_host(
        mut requests: tokio::io::DuplexStream,
        mut responses: tokio::io::DuplexStream,
        answers: Vec<u8>,
    ) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            let mut received = Vec::new();
            for answer in answers {
                let mut byte = [0u8; 1];
                if requests.read_exact(&mut byte).await.is_err() {
                    break;
                }
                received.push(byte[0]);
                responses.write_all(&[answer]).await.unwrap();
            }
            received
        })
    }

    #[tokio::test]
    async fn test_ipc_success_and_failure() {
        let (request_ours, request_host) = duplex(8);
        let (response_host, response_ours) = duplex(8);
        let host = spawn_host(request_host, response_host, vec![1, 0, 1]);
        let builder = IpcBuilder::new(request_ours, response_ours);

        assert!(builder.run().await.is_ok());
        let err = builder.run().await.unwrap_err();
        assert!(matches!(err, BuildError::Failed { .. }));
        assert!(!err.is_fatal());
        assert!(builder.run().await.is_ok());

        assert_eq!(host.await.unwrap(), vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn test_ipc_unexpected_byte_is_fatal() {
        let (request_ours, request_host) = duplex(8);
        let (response_host, response_ours) = duplex(8);
        let _host = spawn_host(request_host, response_host, vec![42]);
        let builder = IpcBuilder::new(request_ours, response_ours);

        let err = builder.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            BuildError::Protocol(ProtocolError::UnexpectedResponse(42))
        ));
    }

    #[tokio::test]
    async fn test_ipc_closed_channel_is_fatal() {
        let (request_ours, _request_host) = duplex(8);
        let (response_host, response_ours) = duplex(8);
        drop(response_host);
        let builder = IpcBuilder::new(request_ours, response_ours);

        let err = builder.run().await.unwrap_err();
        assert!(matches!(
            err,
            BuildError::Protocol(ProtocolError::ChannelClosed)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_builder_success() {
        let dir = tempfile::TempDir::new().unwrap();
        let builder = CommandBuilder::new("sh", vec!["-c".into(), "exit 0".into()], dir.path());
        assert!(builder.run().await.is_ok());
        assert_eq!(builder.describe(), "sh -c exit 0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_builder_failure_captures_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let builder = CommandBuilder::new(
            "sh",
            vec!["-c".into(), "echo compiling; echo 'error: boom' >&2; exit 3".into()],
            dir.path(),
        );

        match builder.run().await {
            Err(BuildError::Failed { output }) => {
                assert!(output.contains("compiling"));
                assert!(output.contains("error: boom"));
            }
            other => panic!("expected failed build, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_builder_missing_program() {
        let dir = tempfile::TempDir::new().unwrap();
        let builder = CommandBuilder::new("kiln-definitely-not-a-program", vec![], dir.path());
        let err = builder.run().await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
        assert!(!err.is_fatal());
    }
}
