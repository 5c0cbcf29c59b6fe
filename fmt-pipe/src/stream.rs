use std::{
    io,
    pin::{Pin, pin},
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    args::FmtOptions,
    engine::{EngineOptions, OutputStream, PipeEngine},
    error::Result,
    process::{FmtCommand, ProcessHandle},
};

/// A formatter process ready to transform one input stream.
///
/// ```no_run
/// # async fn run() -> fmt_pipe::Result<()> {
/// use bytes::Bytes;
/// use fmt_pipe::{FmtOptions, FmtStream};
///
/// let input = futures::stream::iter([Ok(Bytes::from_static(b"let   x=\n\t1;;;\n++x"))]);
/// let output = FmtStream::new(&FmtOptions::new().no_config())?
///     .pipe(input)?
///     .collect_bytes()
///     .await?;
/// assert_eq!(output, "let x = 1;\n++x;\n");
/// # Ok(())
/// # }
/// ```
pub struct FmtStream {
    engine: PipeEngine,
}

impl FmtStream {
    /// Resolves `options` and spawns the formatter. Configuration errors are
    /// returned before anything is spawned.
    pub fn new(options: &FmtOptions) -> Result<Self> {
        Self::spawn(&FmtCommand::new(options)?)
    }

    pub fn spawn(command: &FmtCommand) -> Result<Self> {
        Ok(Self::from_process(command.spawn()?))
    }

    pub fn from_process(process: ProcessHandle) -> Self {
        Self::with_options(process, EngineOptions::default())
    }

    pub fn with_options(process: ProcessHandle, options: EngineOptions) -> Self {
        Self {
            engine: PipeEngine::with_options(process, options),
        }
    }

    /// Feeds `input` to the formatter on a background task and returns its
    /// output. Dropping the output abandons the run.
    pub fn pipe<S>(self, input: S) -> Result<FmtOutput>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let mut engine = self.engine.with_cancellation(&cancel);
        let output = engine.start()?;

        tokio::spawn(feed(engine, input, cancel.clone()));

        Ok(FmtOutput {
            inner: output,
            _guard: cancel.drop_guard(),
        })
    }
}

async fn feed<S>(mut engine: PipeEngine, input: S, cancel: CancellationToken)
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    let mut input = pin!(input);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("formatter output dropped, abandoning input");
                return;
            }
            next = input.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if let Err(e) = engine.accept(chunk).await {
                    engine.abort(e).await;
                    return;
                }
            }
            Some(Err(e)) => {
                engine.abort(e.into()).await;
                return;
            }
            None => break,
        }
    }

    if let Err(e) = engine.finish().await {
        log::debug!("formatter pipe ended with error: {}", e);
    }
}

/// Output of [`FmtStream::pipe`]: formatted chunks, then at most one error.
pub struct FmtOutput {
    inner: OutputStream,
    _guard: DropGuard,
}

impl FmtOutput {
    /// Concatenates the output, failing with the terminal error if any.
    pub async fn collect_bytes(mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(item) = self.next().await {
            out.extend_from_slice(&item?);
        }
        Ok(out.freeze())
    }
}

impl Stream for FmtOutput {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Formats `input` in one go.
pub async fn format_bytes(options: &FmtOptions, input: impl Into<Bytes>) -> Result<Bytes> {
    let input: Bytes = input.into();
    FmtStream::new(options)?
        .pipe(stream::iter([Ok::<_, io::Error>(input)]))?
        .collect_bytes()
        .await
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
