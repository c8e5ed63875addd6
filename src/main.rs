use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read};

use papagaio::{Config, DisabledEvaluator, Processor};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input files, concatenated in order (stdin if none)
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Sigil that introduces variables and meta-variables
    #[arg(short, long, default_value = "$")]
    sigil: String,

    /// Default opening delimiter
    #[arg(long, default_value = "{")]
    open: String,

    /// Default closing delimiter
    #[arg(long, default_value = "}")]
    close: String,

    /// Register an extra delimiter pair for block captures
    #[arg(
        short,
        long,
        num_args = 2,
        value_names = ["OPEN", "CLOSE"],
        action = clap::ArgAction::Append
    )]
    delimiter: Vec<String>,

    /// Keyword that declares a rule
    #[arg(long, default_value = "pattern")]
    pattern_keyword: String,

    /// Keyword that opens a scoped block
    #[arg(long, default_value = "context")]
    context_keyword: String,

    /// Keyword that defines a macro
    #[arg(long, default_value = "macro")]
    macro_keyword: String,

    /// Maximum number of rewrite iterations
    #[arg(short, long, default_value_t = papagaio::config::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Expand `$eval{}` to nothing instead of evaluating it
    #[arg(long)]
    no_eval: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut config = Config::default()
            .with_sigil(&self.sigil)?
            .with_delimiters(&self.open, &self.close)?
            .with_pattern_keyword(&self.pattern_keyword)?
            .with_context_keyword(&self.context_keyword)?
            .with_macro_keyword(&self.macro_keyword)?
            .with_max_iterations(self.max_iterations)?;
        for pair in self.delimiter.chunks(2) {
            if let [open, close] = pair {
                config = config
                    .register_delimiter(open, close)
                    .with_context(|| format!("Invalid delimiter pair {open} {close}"))?;
            }
        }
        Ok(config)
    }

    fn read_input(&self) -> Result<String> {
        if self.files.is_empty() {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            return Ok(input);
        }
        let mut input = String::new();
        for path in &self.files {
            let contents =
                fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
            input.push_str(&contents);
        }
        Ok(input)
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true).with_writer(io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = args.config()?;
    let input = args.read_input()?;

    let mut processor = Processor::with_config(config);
    if args.no_eval {
        processor = processor.with_evaluator(Box::new(DisabledEvaluator));
    }
    println!("{}", processor.process(&input));
    Ok(())
}
