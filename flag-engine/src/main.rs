use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use envconfig::Envconfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use flag_engine::config::Config;
use flag_engine::flags::flag_source::{FileFlagSource, FlagSource};
use flag_engine::{FlagContext, FlagEngine};

const USAGE: &str = "usage: flag-engine <flag-key>... | flag-engine --namespace <namespace>
reads one JSON context object per stdin line and definitions from $FLAGS_PATH,
re-reading $FLAGS_PATH every $FLAGS_REFRESH_INTERVAL_SECONDS";

enum Selection {
    Keys(Vec<String>),
    Namespace(String),
}

fn parse_args(args: Vec<String>) -> Result<Selection> {
    match args.as_slice() {
        [] => bail!(USAGE),
        [flag, namespace] if flag == "--namespace" => Ok(Selection::Namespace(namespace.clone())),
        [flag, ..] if flag == "--namespace" => bail!(USAGE),
        keys => Ok(Selection::Keys(keys.to_vec())),
    }
}

fn init_logging(debug: bool) {
    // Logs go to stderr so stdout carries only the evaluation results.
    let log_layer = {
        let base_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);

        if debug {
            base_layer
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_ansi(true)
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        } else {
            base_layer
                .json()
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        }
    };

    tracing_subscriber::registry().with(log_layer).init();
}

fn evaluate_line(engine: &FlagEngine, selection: &Selection, line: &str) -> Result<String> {
    let context: FlagContext = if line.trim().is_empty() {
        FlagContext::default()
    } else {
        serde_json::from_str(line).context("failed to parse context JSON")?
    };

    let results = match selection {
        Selection::Keys(keys) => engine.evaluate_multiple(keys, &context)?,
        Selection::Namespace(namespace) => engine.get_flags_for_namespace(namespace, &context)?,
    };

    // sorted for stable output
    let results: BTreeMap<_, _> = results.into_iter().collect();
    Ok(serde_json::to_string(&results)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_from_env().context("Invalid configuration")?;
    init_logging(*config.debug);

    let selection = parse_args(std::env::args().skip(1).collect())?;

    let source: Arc<dyn FlagSource> = Arc::new(FileFlagSource::new(&config.flags_path));
    let engine = Arc::new(FlagEngine::new(&config));
    engine
        .refresh(source.as_ref())
        .await
        .with_context(|| format!("failed to load flags from {}", config.flags_path))?;

    let refresh = tokio::spawn(
        engine
            .clone()
            .run_refresh_loop(source, config.flags_refresh_interval()),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut evaluated = false;
    while let Some(line) = lines
        .next_line()
        .await
        .context("failed to read context from stdin")?
    {
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", evaluate_line(&engine, &selection, &line)?);
        evaluated = true;
    }

    // no input at all: answer once for an anonymous caller
    if !evaluated {
        println!("{}", evaluate_line(&engine, &selection, "")?);
    }

    refresh.abort();
    Ok(())
}
