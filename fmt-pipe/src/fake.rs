//! In-memory formatter processes for tests.

use std::{future::Future, io};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

use crate::{
    error::FmtError,
    process::{ProcessExit, ProcessHandle},
};

pub(crate) const PIPE_CAPACITY: usize = 64 * 1024;

/// The child's ends of its three pipes.
pub(crate) struct FakeIo {
    pub stdin: DuplexStream,
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}

/// Runs `body` as the child; its return value is the exit code.
pub(crate) fn fake_process<F, Fut>(pipe_capacity: usize, body: F) -> ProcessHandle
where
    F: FnOnce(FakeIo) -> Fut,
    Fut: Future<Output = io::Result<i32>> + Send + 'static,
{
    let (stdin, child_stdin) = duplex(pipe_capacity);
    let (child_stdout, stdout) = duplex(pipe_capacity);
    let (child_stderr, stderr) = duplex(pipe_capacity);

    let child = tokio::spawn(body(FakeIo {
        stdin: child_stdin,
        stdout: child_stdout,
        stderr: child_stderr,
    }));

    let exit = async move {
        match child.await {
            Ok(code) => code.map(ProcessExit::from_code),
            Err(e) => Err(io::Error::other(e)),
        }
    };
    ProcessHandle::from_parts(stdin, stdout, stderr, exit)
}

/// Echoes stdin upper-cased, chunk by chunk.
pub(crate) fn uppercase(pipe_capacity: usize) -> ProcessHandle {
    fake_process(pipe_capacity, |mut io| async move {
        let mut buf = vec![0u8; 1024];
        loop {
            let n = io.stdin.read(&mut buf).await?;
            if n == 0 {
                return Ok(0);
            }
            io.stdout.write_all(&buf[..n].to_ascii_uppercase()).await?;
        }
    })
}

/// A line formatter: trims trailing whitespace and collapses repeated `;`.
/// Output only depends on the bytes read, never on how they were chunked.
pub(crate) fn line_formatter(pipe_capacity: usize) -> ProcessHandle {
    fake_process(pipe_capacity, |mut io| async move {
        let mut pending = BytesMut::new();
        let mut buf = vec![0u8; 512];
        loop {
            let n = io.stdin.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            pending.extend_from_slice(&buf[..n]);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line = pending.split_to(pos + 1);
                io.stdout.write_all(&format_line(&line[..pos])).await?;
            }
        }
        if !pending.is_empty() {
            io.stdout.write_all(&format_line(&pending)).await?;
        }
        Ok(0)
    })
}

fn format_line(line: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(line);
    let mut out = text.trim_end().to_string();
    while out.contains(";;") {
        out = out.replace(";;", ";");
    }
    out.push('\n');
    out.into_bytes()
}

/// Writes `stdout` and `stderr`, then exits with `code` without reading stdin.
pub(crate) fn scripted(
    stdout: &'static [u8],
    stderr: &'static [u8],
    code: i32,
) -> ProcessHandle {
    fake_process(PIPE_CAPACITY, move |io| async move {
        let FakeIo {
            stdin,
            stdout: mut out,
            stderr: mut err,
        } = io;
        drop(stdin);
        out.write_all(stdout).await?;
        err.write_all(stderr).await?;
        Ok(code)
    })
}

/// Splits the concatenated output from the terminal error, if any.
pub(crate) async fn collect_output<S>(output: S) -> (Vec<u8>, Option<FmtError>)
where
    S: Stream<Item = Result<Bytes, FmtError>>,
{
    let mut output = Box::pin(output);
    let mut bytes = Vec::new();
    while let Some(item) = output.next().await {
        match item {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(e) => {
                assert!(
                    output.next().await.is_none(),
                    "terminal error must be the last item"
                );
                return (bytes, Some(e));
            }
        }
    }
    (bytes, None)
}
