use std::{fmt, path::PathBuf, str::FromStr, sync::LazyLock};

use regex::Regex;

use crate::error::{FmtError, Result};

/// Sub command passed to the formatter executable.
pub const FMT_SUBCOMMAND: &str = "fmt";

/// Read source text from stdin.
const STDIN_MARKER: &str = "-";

/// Maximal trailing run of word characters directly after a dot.
static SUFFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9_]+)$").expect("invalid suffix pattern"));

/// File types understood by `deno fmt --ext`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Ext {
    #[default]
    Ts,
    Tsx,
    Js,
    Jsx,
    Mts,
    Mjs,
    Cts,
    Cjs,
    Md,
    Json,
    Jsonc,
    Css,
    Scss,
    Sass,
    Less,
    Html,
    Svelte,
    Vue,
    Astro,
    Yml,
    Yaml,
    Ipynb,
    Sql,
    Vto,
    Njk,
}

impl Ext {
    pub const ALL: [Ext; 25] = [
        Ext::Ts,
        Ext::Tsx,
        Ext::Js,
        Ext::Jsx,
        Ext::Mts,
        Ext::Mjs,
        Ext::Cts,
        Ext::Cjs,
        Ext::Md,
        Ext::Json,
        Ext::Jsonc,
        Ext::Css,
        Ext::Scss,
        Ext::Sass,
        Ext::Less,
        Ext::Html,
        Ext::Svelte,
        Ext::Vue,
        Ext::Astro,
        Ext::Yml,
        Ext::Yaml,
        Ext::Ipynb,
        Ext::Sql,
        Ext::Vto,
        Ext::Njk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ext::Ts => "ts",
            Ext::Tsx => "tsx",
            Ext::Js => "js",
            Ext::Jsx => "jsx",
            Ext::Mts => "mts",
            Ext::Mjs => "mjs",
            Ext::Cts => "cts",
            Ext::Cjs => "cjs",
            Ext::Md => "md",
            Ext::Json => "json",
            Ext::Jsonc => "jsonc",
            Ext::Css => "css",
            Ext::Scss => "scss",
            Ext::Sass => "sass",
            Ext::Less => "less",
            Ext::Html => "html",
            Ext::Svelte => "svelte",
            Ext::Vue => "vue",
            Ext::Astro => "astro",
            Ext::Yml => "yml",
            Ext::Yaml => "yaml",
            Ext::Ipynb => "ipynb",
            Ext::Sql => "sql",
            Ext::Vto => "vto",
            Ext::Njk => "njk",
        }
    }
}

impl fmt::Display for Ext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized file type '{0}'")]
pub struct ParseExtError(pub String);

impl FromStr for Ext {
    type Err = ParseExtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ext::ALL
            .into_iter()
            .find(|ext| ext.as_str() == s)
            .ok_or_else(|| ParseExtError(s.to_string()))
    }
}

/// Which configuration file the formatter should use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConfigFile {
    /// Let the formatter discover the active config file.
    #[default]
    Discover,
    /// Ignore any config file (`--no-config`).
    Disabled,
    /// Use the given config file (`--config <path>`).
    Path(PathBuf),
}

/// Options for a single formatter run.
#[derive(Clone, Debug, Default)]
pub struct FmtOptions {
    pub config: ConfigFile,
    /// Used for file type detection when `ext` is unset.
    pub file_name: Option<String>,
    /// Overrides the file type detection.
    pub ext: Option<Ext>,
}

impl FmtOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ext(mut self, ext: Ext) -> Self {
        self.ext = Some(ext);
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = ConfigFile::Path(path.into());
        self
    }

    pub fn no_config(mut self) -> Self {
        self.config = ConfigFile::Disabled;
        self
    }
}

/// Resolves the `--ext` value.
///
/// An explicit `ext` wins, then the suffix of `file_name`, then `ts`. A suffix
/// that is not a known [`Ext`] is returned as is and left for the formatter to
/// reject.
pub fn resolve_ext(options: &FmtOptions) -> Result<String> {
    if let Some(ext) = options.ext {
        return Ok(ext.as_str().to_string());
    }

    match options.file_name.as_deref() {
        None => Ok(Ext::default().as_str().to_string()),
        Some(file_name) => SUFFIX_REGEX
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| FmtError::no_extension(file_name)),
    }
}

/// Builds `fmt --ext <ext> [--no-config | --config <path>] -`.
pub fn build_args(options: &FmtOptions) -> Result<Vec<String>> {
    let ext = resolve_ext(options)?;

    let mut args = vec![FMT_SUBCOMMAND.to_string(), "--ext".to_string(), ext];
    match &options.config {
        ConfigFile::Discover => {}
        ConfigFile::Disabled => args.push("--no-config".to_string()),
        ConfigFile::Path(path) => {
            args.push("--config".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
    }
    args.push(STDIN_MARKER.to_string());

    Ok(args)
}

#[cfg(test)]
#[path = "args_test.rs"]
mod args_test;
