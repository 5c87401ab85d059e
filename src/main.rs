//! lamco-rdp-keyboard - RDP keyboard trace replay
//!
//! Entry point for the replay binary.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lamco_rdp_keyboard::config::{Config, LoggingConfig};
use lamco_rdp_keyboard::input::{KeyboardHost, MemoryHost, MemoryRegistry, RdpKeyboard};
use lamco_rdp_keyboard::replay::{self, CORE_KEYBOARD, RDP_KEYBOARD};
use lamco_rdp_keyboard::utils::format_user_error;

/// Input subsystem behind the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Recording host with modelled lock state
    Memory,
    /// libxkbcommon keymaps and state
    Xkb,
}

/// Command-line arguments for lamco-rdp-keyboard
#[derive(Parser, Debug)]
#[command(name = "lamco-rdp-keyboard")]
#[command(version, about = "Replay RDP keyboard traces through the translation core", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LAMCO_KBD_CONFIG")]
    pub config: Option<String>,

    /// JSON-lines trace file ("-" for stdin)
    #[arg(short, long)]
    pub trace: String,

    /// Input subsystem backend
    #[arg(short, long, value_enum, default_value = "memory")]
    pub backend: Backend,

    /// Default layout (overrides config)
    #[arg(long, env = "LAMCO_KBD_LAYOUT")]
    pub layout: Option<String>,

    /// Default variant (overrides config)
    #[arg(long)]
    pub variant: Option<String>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact), overrides config
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_user_error(&e));
            return Err(e);
        }
    };

    let _guard = init_logging(&args, &config.logging)?;

    info!("════════════════════════════════════════════════════════");
    info!("  lamco-rdp-keyboard v{}", env!("CARGO_PKG_VERSION"));
    info!("  Built: {} {}", env!("BUILD_DATE"), env!("BUILD_TIME"));
    info!("  Commit: {}", env!("GIT_HASH"));
    info!("  Backend: {:?}", args.backend);
    info!("════════════════════════════════════════════════════════");
    tracing::debug!("Config: {:?}", config);

    if let Err(e) = run(&args, &config).await {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default_config()?,
    };
    let config = config.with_overrides(args.layout.clone(), args.variant.clone());
    config.validate().context("Invalid config after CLI overrides")?;
    Ok(config)
}

async fn run(args: &Args, config: &Config) -> Result<()> {
    let events = if args.trace == "-" {
        replay::parse_trace(std::io::stdin().lock())
    } else {
        let file = std::fs::File::open(&args.trace)
            .with_context(|| format!("Failed to open trace: {}", args.trace))?;
        replay::parse_trace(std::io::BufReader::new(file))
    }
    .context("Failed to parse trace")?;

    let mut host = create_host(args.backend, config)?;
    let mut registry = MemoryRegistry::new(CORE_KEYBOARD);
    registry.register_keyboard(RDP_KEYBOARD);

    let mut keyboard =
        RdpKeyboard::attach(RDP_KEYBOARD, &config.keyboard, host.as_mut(), &registry);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = replay::replay(&mut keyboard, &events, host.as_mut(), &registry, &mut out)
        .await
        .context("Replay failed")?;

    let stats = keyboard.detach();
    info!(
        "Done: {} events, {} key events, {} actions, {} syncs, {} layout reloads ({} failed), {} repeat-off",
        summary.events,
        stats.key_events,
        stats.actions_emitted,
        stats.sync_requests,
        stats.layout_reloads,
        stats.layout_failures,
        summary.repeat_offs
    );
    Ok(())
}

fn create_host(backend: Backend, config: &Config) -> Result<Box<dyn KeyboardHost>> {
    match backend {
        Backend::Memory => Ok(Box::new(MemoryHost::with_lock_keycodes(
            config.keyboard.lock_keycodes(),
        ))),
        #[cfg(feature = "xkb")]
        Backend::Xkb => Ok(Box::new(lamco_rdp_keyboard::input::XkbHost::new())),
        #[cfg(not(feature = "xkb"))]
        Backend::Xkb => anyhow::bail!("xkb backend not compiled in (rebuild with --features xkb)"),
    }
}

fn init_logging(args: &Args, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let log_level = match args.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let log_format = args.log_format.as_deref().unwrap_or(logging.format.as_str());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "lamco_rdp_keyboard={level},warn",
            level = log_level
        ))
    });

    let file_writer = if let Some(path) = &args.log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file: {}", path))?;
        Some(tracing_appender::non_blocking(file))
    } else {
        logging.log_dir.as_ref().map(|dir| {
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                dir,
                "lamco-rdp-keyboard.log",
            ))
        })
    };

    // Actions go to stdout, so logs stay on stderr
    let guard = if let Some((writer, guard)) = file_writer {
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        Some(guard)
    } else {
        match log_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
        None
    };

    Ok(guard)
}
