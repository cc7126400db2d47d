use anyhow::Result;
use clap::{CommandFactory, Parser};
use dialwatch::audio::{AudioWindower, WavAudioSource, write_wav};
use dialwatch::cli::{Cli, Commands, ConfigAction};
use dialwatch::config::Config;
use dialwatch::delivery::{DeliveryEvent, DeliveryManager, DeliveryState, WebhookNotifier};
use dialwatch::dtmf::ToneSynth;
use dialwatch::pipeline::DetectionStation;
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_listen(config).await?;
        }
        Some(Commands::Listen { port, webhook_url }) => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(port) = port {
                config.modem.port = port;
            }
            if let Some(url) = webhook_url {
                config.webhook.url = Some(url);
            }
            config.validate()?;
            run_listen(config).await?;
        }
        Some(Commands::Analyze { input, deliver }) => {
            let config = load_config(cli.config.as_deref())?;
            run_analyze(config, &input, deliver).await?;
        }
        Some(Commands::Generate {
            symbols,
            output,
            tone,
            gap,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let sample_rate = config.audio.sample_rate;
            let samples = ToneSynth::new(sample_rate).sequence(&symbols, tone, gap)?;
            write_wav(&output, &samples, sample_rate)?;
            println!(
                "Wrote {} ({:.2}s at {} Hz)",
                output.display(),
                samples.len() as f64 / f64::from(sample_rate),
                sample_rate
            );
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "dialwatch",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Installs the tracing subscriber. `RUST_LOG` takes precedence over the flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,dialwatch={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/dialwatch/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top of whichever was loaded.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Builds the delivery manager for the configured webhook on the current runtime.
fn delivery_manager(config: &Config) -> Result<DeliveryManager> {
    let notifier = WebhookNotifier::new(config.webhook_config()?)?;
    Ok(DeliveryManager::new(
        Arc::new(notifier),
        config.delivery_config(),
        config.webhook.source.clone(),
        tokio::runtime::Handle::current(),
    ))
}

/// Monitors the modem line until Ctrl-C or until the modem is lost.
#[cfg(feature = "modem")]
async fn run_listen(config: Config) -> Result<()> {
    use dialwatch::audio::ModemAudioSource;
    use dialwatch::pipeline::{DeliverySink, Monitor, MonitorConfig};

    let manager = Arc::new(delivery_manager(&config)?);
    let source = ModemAudioSource::new(config.modem_config());
    let handle = Monitor::new(MonitorConfig::from_config(&config)).start(
        Box::new(source),
        Box::new(DeliverySink::new(Arc::clone(&manager))),
    )?;
    tracing::info!(
        version = %dialwatch::version_string(),
        port = %config.modem.port,
        destination = config.webhook.url.as_deref().unwrap_or_default(),
        "listening for alarm dial-outs"
    );

    let stopper = handle.stopper();
    let mut monitor = tokio::task::spawn_blocking(move || handle.wait());

    let outcome = tokio::select! {
        finished = &mut monitor => finished,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C, stopping");
            }
            tracing::info!("stopping");
            stopper.stop();
            monitor.await
        }
    };

    let pending = manager.in_flight();
    if pending > 0 {
        tracing::warn!(pending, "abandoning pending deliveries");
    }
    manager.shutdown().await;

    let report = outcome??;
    tracing::info!(
        windows = report.windows,
        dropped_windows = report.dropped_windows,
        triggers = report.triggers.len(),
        "monitor stopped"
    );
    Ok(())
}

#[cfg(not(feature = "modem"))]
async fn run_listen(_config: Config) -> Result<()> {
    anyhow::bail!("this build has no modem support (enable the `modem` feature)")
}

/// Runs detection over a WAV file and prints every digit and trigger.
async fn run_analyze(config: Config, input: &Path, deliver: bool) -> Result<()> {
    // Fail on a missing webhook before doing any work.
    let manager = if deliver {
        Some(delivery_manager(&config)?)
    } else {
        None
    };

    let samples = WavAudioSource::open(input, config.audio.sample_rate)?.into_samples();
    let mut windower = AudioWindower::new(config.window_config(), SystemTime::now());
    let mut station = DetectionStation::from_config(&config);

    let mut triggers = Vec::new();
    for window in windower.push(&samples) {
        let outcome = station.step(&window)?;
        if let Some(digit) = outcome.digit {
            println!(
                "{:>9}  digit {}  ({} ms)",
                format_offset(digit.started_at),
                digit.symbol.bold(),
                digit.duration.as_millis()
            );
        }
        if let Some(trigger) = outcome.trigger {
            println!(
                "{:>9}  {} #{} on '{}'",
                format_offset(trigger.detected_at),
                "ALARM".red().bold(),
                trigger.id,
                trigger.symbol
            );
            triggers.push(trigger);
        }
    }

    println!(
        "{} analyzed, {} alarm trigger(s)",
        format_offset(Duration::from_secs_f64(
            samples.len() as f64 / f64::from(config.audio.sample_rate)
        )),
        triggers.len()
    );

    let Some(manager) = manager else {
        return Ok(());
    };
    if triggers.is_empty() {
        return Ok(());
    }

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let manager = manager.with_event_sender(events_tx);
    for trigger in triggers {
        manager.enqueue(trigger);
    }
    manager.drain().await;

    let mut failed = 0usize;
    while let Ok(event) = events_rx.try_recv() {
        if let DeliveryEvent::Finished {
            trigger_id,
            state,
            attempts,
        } = event
        {
            if state == DeliveryState::Succeeded {
                println!(
                    "trigger #{trigger_id}: {} after {attempts} attempt(s)",
                    "delivered".green()
                );
            } else {
                failed += 1;
                println!(
                    "trigger #{trigger_id}: {} after {attempts} attempt(s)",
                    state.name().red()
                );
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} alarm notification(s) were not delivered");
    }
    Ok(())
}

/// `12.345s`
fn format_offset(offset: Duration) -> String {
    format!("{}.{:03}s", offset.as_secs(), offset.subsec_millis())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
