use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wordcloud_worker::config::{self, ErrorPolicy, RecordPolicy, WorkerConfig};
use wordcloud_worker::ledger::Ledger;
use wordcloud_worker::masks::MaskRegistry;
use wordcloud_worker::naming::IdentifierPattern;
use wordcloud_worker::output;
use wordcloud_worker::render::{CloudRenderer, RenderParams};
use wordcloud_worker::worker::{Worker, WorkerSettings};

#[derive(Parser)]
#[command(name = "wordcloud-worker")]
#[command(about = "Watch a directory for word-frequency requests and render word clouds")]
#[command(long_about = "\
Watch a directory for word-frequency requests and render word clouds

Request files are JSON objects mapping words to weights, named

  <id>[.<mask>].generate.json

where <id> is a lowercase UUID (or any prefix with --permissive) and <mask>
optionally selects a shape mask. Each request becomes <id>.generated.png in
the output directory. Handled ids are kept in ids_handled.txt inside the
watch directory, so restarting the worker never redoes a request.

  working/in/
  ├── ids_handled.txt
  ├── 3fa85f64-5717-4562-b3fc-2c963f66afa6.shield.generate.json
  └── 9b2e1c0a-0f4d-4b7e-8a61-5d3c2b1a0f9e.generate.json

Run 'wordcloud-worker --gen-config' to print a documented worker.toml.")]
#[command(version)]
struct Cli {
    /// Watch directory, then output directory (required unless paths.mode = "fixed")
    #[arg(value_name = "DIR")]
    paths: Vec<PathBuf>,

    /// Worker config file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Only accept UUID request ids
    #[arg(long, conflicts_with = "permissive")]
    strict: bool,

    /// Accept any request id; mask segments are not recognised
    #[arg(long)]
    permissive: bool,

    /// Ignore mask names and skip loading mask images
    #[arg(long)]
    no_masks: bool,

    /// Record an id only after its image is written
    #[arg(long)]
    record_after_render: bool,

    /// Log failed requests and keep watching instead of exiting
    #[arg(long)]
    keep_going: bool,

    /// Milliseconds between directory scans
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Handle every waiting request, then exit
    #[arg(long)]
    once: bool,

    /// Print a stock worker.toml with all options documented, then exit
    #[arg(long)]
    gen_config: bool,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Explicit tracing filter, e.g. "wordcloud_worker=debug"
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    init_tracing(&cli);

    let mut config = config::load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    config.validate()?;

    let (watch_dir, output_dir) = config::resolve_dirs(&config, &cli.paths)?;
    std::fs::create_dir_all(&output_dir)?;

    let settings = WorkerSettings::from_config(&config, &watch_dir, &output_dir);
    let ledger = Ledger::load(&settings.ledger_file)?;
    let masks = if config.masks.enabled {
        MaskRegistry::load(&config.masks.dir, &config.masks.entries, config.masks.max_dim)?
    } else {
        MaskRegistry::empty()
    };
    let renderer = CloudRenderer::new(RenderParams::from_config(&config.render)?);

    for line in output::format_startup(&watch_dir, &output_dir, &masks, ledger.len()) {
        println!("{}", line);
    }
    info!(handled = ledger.len(), masks = masks.len(), "starting");

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_event(&event) {
                println!("{}", line);
            }
        }
    });

    let mut worker = Worker::new(settings, ledger, masks, renderer).with_events(tx);
    let result = if cli.once {
        worker.drain().map(Some)
    } else {
        worker.run().map(|()| None)
    };
    drop(worker);
    printer.join().map_err(|_| "progress printer panicked")?;

    if let Some(handled) = result? {
        println!("{}", output::format_drain_summary(handled));
    }
    Ok(())
}

/// Install the stderr subscriber. `--log-level` wins over `RUST_LOG`, which
/// wins over `-v`.
fn init_tracing(cli: &Cli) {
    let default_filter = match cli.verbose {
        0 => "wordcloud_worker=info",
        1 => "wordcloud_worker=debug",
        _ => "wordcloud_worker=trace",
    };
    let filter = match &cli.log_level {
        Some(explicit) => EnvFilter::new(explicit),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// CLI flags take precedence over the config file.
fn apply_overrides(config: &mut WorkerConfig, cli: &Cli) {
    if cli.strict {
        config.requests.identifier_pattern = IdentifierPattern::Strict;
    }
    if cli.permissive {
        config.requests.identifier_pattern = IdentifierPattern::Permissive;
    }
    if cli.no_masks {
        config.masks.enabled = false;
    }
    if cli.record_after_render {
        config.ledger.record = RecordPolicy::AfterRender;
    }
    if cli.keep_going {
        config.errors.policy = ErrorPolicy::LogAndContinue;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.requests.poll_interval_ms = ms;
    }
}
