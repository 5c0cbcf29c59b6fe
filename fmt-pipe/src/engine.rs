use std::{io, sync::Arc};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc,
    task::{JoinError, JoinHandle},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::{
    ansi::sanitize_diagnostic,
    error::{FmtError, Result},
    process::{BoxedReader, BoxedWriter, ExitFuture, ProcessExit, ProcessHandle},
};

pub type OutputItem = Result<Bytes>;
/// Formatter output in arrival order. A failed run ends with one `Err` item.
pub type OutputStream = ReceiverStream<OutputItem>;
type OutputSender = mpsc::Sender<OutputItem>;

#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Upper bound of a single read from the formatter's stdout.
    pub read_buffer_size: usize,
    /// Chunks buffered for the consumer before the drain task waits.
    pub output_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            output_capacity: 32,
        }
    }
}

/// Pipes bytes through a formatter process.
///
/// `start` spawns the drain task that forwards stdout to the returned
/// [`OutputStream`], `accept` feeds stdin and `finish` closes stdin, waits for
/// the remaining output and the exit status, and turns a failed exit into
/// [`FmtError::ProcessFailure`].
///
/// The output stream must be consumed while input is accepted: the drain task
/// waits on a bounded queue, so an unread stream eventually stalls the
/// formatter and with it `accept`. [`FmtStream`](crate::stream::FmtStream)
/// drives both sides for you.
///
/// Dropping the engine before `finish` cancels the drain task at its next
/// suspension point and kills the child.
pub struct PipeEngine {
    stdin: Option<BoxedWriter>,
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
    exit: Option<ExitFuture>,
    output: Option<OutputSender>,
    drain: Option<JoinHandle<Result<()>>>,
    diagnostics: Option<JoinHandle<io::Result<Bytes>>>,
    options: EngineOptions,
    cancel: CancellationToken,
    terminated: bool,
}

/// What `finish` learned once the child is gone.
struct ShutdownRecord {
    exit: ProcessExit,
    diagnostic: Bytes,
}

impl PipeEngine {
    pub fn new(process: ProcessHandle) -> Self {
        Self::with_options(process, EngineOptions::default())
    }

    pub fn with_options(process: ProcessHandle, options: EngineOptions) -> Self {
        let ProcessHandle {
            stdin,
            stdout,
            stderr,
            exit,
        } = process;

        Self {
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(stderr),
            exit: Some(exit),
            output: None,
            drain: None,
            diagnostics: None,
            options,
            cancel: CancellationToken::new(),
            terminated: false,
        }
    }

    /// Cancels this engine whenever `parent` is cancelled. Call before `start`.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_started(&self) -> bool {
        self.drain.is_some()
    }

    /// False once stdin is closed, either by `finish` or because the child
    /// stopped reading.
    pub fn is_input_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Starts forwarding stdout. May only be called once, before any input.
    pub fn start(&mut self) -> Result<OutputStream> {
        let (Some(stdout), Some(stderr)) = (self.stdout.take(), self.stderr.take()) else {
            return Err(FmtError::InvalidState("drain task already started"));
        };

        let (tx, rx) = mpsc::channel(self.options.output_capacity.max(1));

        self.drain = Some(tokio::spawn(drain_output(
            stdout,
            tx.clone(),
            self.cancel.clone(),
            self.options.read_buffer_size.max(1),
        )));
        // stderr is read alongside stdout so a chatty child never blocks on a
        // full stderr pipe.
        self.diagnostics = Some(tokio::spawn(collect_diagnostics(
            stderr,
            self.cancel.clone(),
        )));
        self.output = Some(tx);

        log::debug!("pipe engine started");
        Ok(ReceiverStream::new(rx))
    }

    /// Writes `chunk` to the formatter's stdin, waiting while the pipe is full.
    pub async fn accept(&mut self, chunk: Bytes) -> Result<()> {
        if self.drain.is_none() {
            return Err(FmtError::InvalidState("accept called before start"));
        }
        if self.cancel.is_cancelled() {
            return Err(FmtError::Cancelled);
        }

        let Some(stdin) = self.stdin.as_mut() else {
            log::trace!("discarding {} bytes, formatter stdin is closed", chunk.len());
            return Ok(());
        };

        let written = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FmtError::Cancelled),
            r = stdin.write_all(&chunk) => r,
        };

        match written {
            Ok(()) => {
                log::trace!("wrote {} bytes to formatter stdin", chunk.len());
                Ok(())
            }
            // The child quit reading; its exit status tells the story in `finish`.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                log::debug!("formatter closed stdin early: {}", e);
                self.stdin = None;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Closes stdin, waits for the drain task and the exit status and reports
    /// the outcome. A failure is also delivered as the last output item.
    pub async fn finish(mut self) -> Result<()> {
        let (Some(drain), Some(diagnostics)) = (self.drain.take(), self.diagnostics.take()) else {
            return Err(FmtError::InvalidState("finish called before start"));
        };
        let Some(exit) = self.exit.take() else {
            return Err(FmtError::InvalidState("exit status already taken"));
        };

        self.close_input().await;

        let cancel = self.cancel.clone();
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = async { tokio::join!(drain, exit, diagnostics) } => Some(joined),
        };

        let result = match joined {
            None => Err(FmtError::Cancelled),
            Some((drained, exit, diagnostic)) => {
                conclude(drained, exit, diagnostic.map(|r| r.map_err(FmtError::from)))
            }
        };

        self.release();
        match &result {
            Ok(()) => log::debug!("formatter pipe finished"),
            Err(FmtError::Cancelled) => self.try_deliver(FmtError::Cancelled),
            Err(e) => self.deliver(e.clone()).await,
        }
        result
    }

    /// Ends the output with `error` and tears the pipe down.
    pub async fn abort(mut self, error: FmtError) {
        log::debug!("aborting formatter pipe: {}", error);
        self.release();
        // Chunks the drain task already read go out before the error.
        if let Some(drain) = self.drain.take() {
            let _ = drain.await;
        }
        self.deliver(error).await;
    }

    async fn close_input(&mut self) {
        let Some(mut stdin) = self.stdin.take() else {
            return;
        };
        if let Err(e) = stdin.shutdown().await {
            if e.kind() != io::ErrorKind::BrokenPipe {
                log::warn!("failed to close formatter stdin: {}", e);
            }
        }
    }

    /// Stops whatever still runs and drops the channels.
    fn release(&mut self) {
        self.terminated = true;
        self.cancel.cancel();
        if let Some(handle) = self.diagnostics.take() {
            handle.abort();
        }
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        self.exit = None;
    }

    async fn deliver(&mut self, error: FmtError) {
        if let Some(tx) = self.output.take() {
            if tx.send(Err(error)).await.is_err() {
                log::debug!("output dropped before the terminal error");
            }
        }
    }

    fn try_deliver(&mut self, error: FmtError) {
        if let Some(tx) = self.output.take() {
            let _ = tx.try_send(Err(error));
        }
    }
}

impl Drop for PipeEngine {
    fn drop(&mut self) {
        if !self.terminated && self.drain.is_some() {
            log::debug!("pipe engine dropped before finish, cancelling drain");
        }
        self.cancel.cancel();
    }
}

fn conclude(
    drained: std::result::Result<Result<()>, JoinError>,
    exit: io::Result<ProcessExit>,
    diagnostic: std::result::Result<Result<Bytes>, JoinError>,
) -> Result<()> {
    let diagnostic = match diagnostic {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            log::warn!("failed to read formatter stderr: {}", e);
            Bytes::new()
        }
        Err(e) => {
            log::warn!("formatter stderr task failed: {}", e);
            Bytes::new()
        }
    };
    let record = ShutdownRecord {
        exit: exit?,
        diagnostic,
    };

    if !record.exit.success() {
        let mut text = sanitize_diagnostic(&record.diagnostic);
        if text.is_empty() {
            text = match record.exit.code {
                Some(code) => format!("formatter exited with code {}", code),
                None => "formatter was terminated by a signal".to_string(),
            };
        }
        log::debug!("formatter failed: {}", text);
        return Err(FmtError::ProcessFailure(text));
    }

    if !record.diagnostic.is_empty() {
        log::debug!(
            "formatter succeeded with diagnostics: {}",
            sanitize_diagnostic(&record.diagnostic)
        );
    }

    match drained {
        Ok(r) => r,
        Err(e) => Err(FmtError::Io(Arc::new(io::Error::other(e)))),
    }
}

/// Forwards stdout until EOF, cancellation or a dropped output.
async fn drain_output(
    mut stdout: BoxedReader,
    tx: OutputSender,
    cancel: CancellationToken,
    read_buffer_size: usize,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(read_buffer_size);
    let mut forwarded = 0usize;

    loop {
        buf.reserve(read_buffer_size);
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("drain cancelled after {} bytes", forwarded);
                return Ok(());
            }
            n = stdout.read_buf(&mut buf) => n?,
        };

        if n == 0 {
            log::debug!("formatter stdout closed after {} bytes", forwarded);
            return Ok(());
        }

        forwarded += n;
        let chunk = buf.split().freeze();
        log::trace!("forwarding {} bytes of formatter output", chunk.len());
        if tx.send(Ok(chunk)).await.is_err() {
            log::debug!("output dropped, stop reading formatter stdout");
            return Ok(());
        }
    }
}

async fn collect_diagnostics(
    mut stderr: BoxedReader,
    cancel: CancellationToken,
) -> io::Result<Bytes> {
    let mut text = Vec::new();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        r = stderr.read_to_end(&mut text) => {
            r?;
        }
    }
    Ok(Bytes::from(text))
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
