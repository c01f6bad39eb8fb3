//! Woven CLI — command-line driver for the Woven stylesheet compiler.
//!
//! This binary contains no compiler logic of its own; it parses flags,
//! reads input, calls into `woven_core::compile_file`, and writes the
//! result. All parsing/evaluation/formatting lives in `woven-core`.

mod colors;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use colors::{bold, green, red, status_label};
use woven_core::diagnostics::{JsonError, RenderedDiagnostic};
use woven_core::{Options, OutputStyle};

#[derive(Parser)]
#[command(
    name = "woven",
    version,
    about = "Compiles Woven stylesheets to CSS",
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}

Examples:
  woven site.sw                          Compile to stdout
  woven site.sw -o site.css               Compile to a file
  woven site.sw -I vendor --style compact Search vendor/ for imports, compact output
  woven site.sw --source-map site.css.map Emit a source map alongside the CSS
"
)]
struct Cli {
    /// Path to the entry stylesheet
    input: PathBuf,

    /// Write CSS here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Additional directory to search for `@import`s (repeatable)
    #[arg(short = 'I', long = "load-path")]
    load_path: Vec<PathBuf>,

    /// Output style
    #[arg(long, value_enum, default_value_t = StyleArg::Nested)]
    style: StyleArg,

    /// Digits of numeric precision in emitted values
    #[arg(long, default_value_t = 5)]
    precision: usize,

    /// Write a source map to this path alongside the CSS
    #[arg(long)]
    source_map: Option<PathBuf>,

    /// Embed original source text in the source map
    #[arg(long)]
    embed_sources: bool,

    /// Treat the input as indented syntax (not implemented; reports an error)
    #[arg(long)]
    indented: bool,

    /// Print the error, if any, as a JSON document instead of human text
    #[arg(long)]
    json_errors: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StyleArg {
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl From<StyleArg> for OutputStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Nested => OutputStyle::Nested,
            StyleArg::Expanded => OutputStyle::Expanded,
            StyleArg::Compact => OutputStyle::Compact,
            StyleArg::Compressed => OutputStyle::Compressed,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let options = Options {
        style: cli.style.into(),
        precision: cli.precision,
        load_paths: cli.load_path,
        source_map: cli.source_map.is_some(),
        embed_sources: cli.embed_sources,
        indented: cli.indented,
    };

    println!("{} {}", status_label("Compiling"), bold(&cli.input.display().to_string()));
    let start = std::time::Instant::now();

    let output = match woven_core::compile_file(&cli.input, &options) {
        Ok(output) => output,
        Err(err) => fail(&err, &cli.input, cli.json_errors),
    };

    for diag in &output.diagnostics {
        let label = match diag.kind {
            woven_core::DiagKind::Warn => "Warning",
            woven_core::DiagKind::Debug => "Debug",
        };
        eprintln!("{}: {}", label, diag.message);
    }

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &output.css) {
                eprintln!("{} writing to '{}': {e}", red("error:"), path.display());
                std::process::exit(1);
            }
        }
        None => print!("{}", output.css),
    }

    if let (Some(map_path), Some(map)) = (&cli.source_map, &output.source_map) {
        match serde_json::to_string(map) {
            Ok(json) => {
                if let Err(e) = std::fs::write(map_path, json) {
                    eprintln!("{} writing source map to '{}': {e}", red("error:"), map_path.display());
                    std::process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("{} serializing source map: {e}", red("error:"));
                std::process::exit(1);
            }
        }
    }

    let elapsed = start.elapsed();
    println!("{} Finished in {:.2}s", green("✓"), elapsed.as_secs_f64());
}

fn fail(err: &woven_core::SassError, input: &std::path::Path, json_errors: bool) -> ! {
    let source = std::fs::read_to_string(input).unwrap_or_default();
    let mut sources = woven_core::compiler::source::SourceStore::new();
    sources.add(input, source);
    let rendered = RenderedDiagnostic::from_error(err, &sources);

    if json_errors {
        let doc = JsonError::from(&rendered);
        println!("{}", serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string()));
    } else {
        eprint!("{}", rendered.render_ansi());
    }
    std::process::exit(1);
}
