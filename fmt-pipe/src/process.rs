use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
    pin::Pin,
    process::{ExitStatus, Stdio},
    sync::Arc,
};

use futures::{FutureExt, future::BoxFuture};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;

use crate::{
    args::{FmtOptions, build_args},
    error::{FmtError, Result},
};

/// Overrides the formatter executable.
pub const DENO_BIN_ENV: &str = "DENO_BIN";

pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;
pub type ExitFuture = BoxFuture<'static, io::Result<ProcessExit>>;

/// Exit status of the child process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// A spawned child: stdin, stdout, stderr and its exit status.
///
/// The three channels have independent lifetimes; closing stdin leaves
/// stdout readable.
pub struct ProcessHandle {
    pub(crate) stdin: BoxedWriter,
    pub(crate) stdout: BoxedReader,
    pub(crate) stderr: BoxedReader,
    pub(crate) exit: ExitFuture,
}

impl ProcessHandle {
    pub fn from_parts<W, R, E, F>(stdin: W, stdout: R, stderr: E, exit: F) -> Self
    where
        W: AsyncWrite + Send + 'static,
        R: AsyncRead + Send + 'static,
        E: AsyncRead + Send + 'static,
        F: Future<Output = io::Result<ProcessExit>> + Send + 'static,
    {
        Self {
            stdin: Box::pin(stdin),
            stdout: Box::pin(stdout),
            stderr: Box::pin(stderr),
            exit: exit.boxed(),
        }
    }

    /// Wraps stdout, e.g. to change how output is chunked.
    pub fn map_stdout<R, F>(self, f: F) -> Self
    where
        F: FnOnce(BoxedReader) -> R,
        R: AsyncRead + Send + 'static,
    {
        Self {
            stdout: Box::pin(f(self.stdout)),
            ..self
        }
    }
}

/// A ready-to-spawn formatter invocation.
#[derive(Clone, Debug)]
pub struct FmtCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl FmtCommand {
    /// Resolves the arguments for `options`. Fails with
    /// [`FmtError::Configuration`] without spawning anything.
    pub fn new(options: &FmtOptions) -> Result<Self> {
        Ok(Self {
            program: default_program(),
            args: build_args(options)?,
        })
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn spawn(&self) -> Result<ProcessHandle> {
        log::debug!("spawning {} {}", self.program.display(), self.args.join(" "));

        let spawn_error = |source: io::Error| FmtError::Spawn {
            program: self.program.clone(),
            source: Arc::new(source),
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let missing = |name: &str| spawn_error(io::Error::other(format!("{} not piped", name)));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;
        let pid = child.id();

        let exit = async move {
            let status = child.wait().await?;
            log::debug!("formatter {:?} exited with {}", pid, status);
            Ok(ProcessExit::from(status))
        };

        Ok(ProcessHandle::from_parts(stdin, stdout, stderr, exit))
    }
}

/// `$DENO_BIN`, else `deno` on `PATH`, else the bare name.
pub fn default_program() -> PathBuf {
    if let Some(bin) = std::env::var_os(DENO_BIN_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(bin);
    }

    which::which("deno").unwrap_or_else(|_| PathBuf::from("deno"))
}
