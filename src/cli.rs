use std::path::PathBuf;

use clap::Parser;
use fmt_pipe::{ConfigFile, Ext, FmtOptions};

/// Format source text from stdin with `deno fmt` and write it to stdout.
#[derive(Debug, Parser)]
#[command(name = "deno-fmt-pipe", version)]
pub struct Cli {
    /// File type of the input, e.g. ts, md, html.
    #[arg(long)]
    pub ext: Option<Ext>,

    /// Detect the file type from this file name when --ext is not given.
    #[arg(long)]
    pub file_name: Option<String>,

    /// Use this deno configuration file.
    #[arg(long, conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore any deno configuration file.
    #[arg(long)]
    pub no_config: bool,

    /// Path of the deno executable (defaults to $DENO_BIN, then PATH).
    #[arg(long)]
    pub deno: Option<PathBuf>,
}

impl Cli {
    pub fn options(&self) -> FmtOptions {
        let config = match (&self.config, self.no_config) {
            (_, true) => ConfigFile::Disabled,
            (Some(path), false) => ConfigFile::Path(path.clone()),
            (None, false) => ConfigFile::Discover,
        };
        FmtOptions {
            config,
            file_name: self.file_name.clone(),
            ext: self.ext,
        }
    }
}
