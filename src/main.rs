use anyhow::Context;
use clap::Parser;
use fmt_pipe::{FmtCommand, FmtOutput, FmtStream};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

mod cli;
mod config;

fn init_logging() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("fmt_pipe", log::LevelFilter::Warn)
        .parse_default_env()
        .init();
}

async fn copy_output<W>(output: &mut FmtOutput, writer: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = output.next().await {
        writer
            .write_all(&chunk?)
            .await
            .context("writing formatted output")?;
    }
    writer.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = cli::Cli::parse();
    let config = config::config();

    let mut command = FmtCommand::new(&cli.options())?;
    if let Some(deno) = cli.deno.as_ref().or(config.deno_bin()) {
        command = command.with_program(deno);
    }

    let process = command.spawn()?;
    let input = ReaderStream::with_capacity(tokio::io::stdin(), config.engine().read_buffer_size);
    let mut output = FmtStream::with_options(process, config.engine().clone()).pipe(input)?;

    let mut stdout = tokio::io::stdout();
    let outcome = tokio::select! {
        r = copy_output(&mut output, &mut stdout) => r,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    // Dropping the output cancels the pipe and kills the formatter.
    drop(output);
    outcome
}
