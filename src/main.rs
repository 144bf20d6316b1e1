//! Neurorack GW - Rust implementation
//!
//! Samples the rack's gate/CV inputs, button, and rotary encoder, and
//! dispatches canonical events to the audio and screen workers.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurorack_gw::config::AppConfig;
use neurorack_gw::hardware::{LogDisplay, SimButton, SimChannelReader, SimRotary};
use neurorack_gw::router::EventRouter;
use neurorack_gw::sampler::InputSampler;
use neurorack_gw::signal::WakeSignal;
use neurorack_gw::state::SharedState;
use neurorack_gw::supervisor::Supervisor;
use neurorack_gw::workers;
use neurorack_gw::workers::audio::ModelRegistry;

/// Neurorack Gateway - CV/gate sampling and event dispatch host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Validate the configuration and print the channel layout, then exit
    #[arg(long)]
    check: bool,

    /// Seconds to wait for workers during shutdown
    #[arg(long, default_value = "5")]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting Neurorack GW...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;
    info!(
        "Configuration loaded: {} channels in groups of {}",
        config.num_channels(),
        config.hardware.channels_per_group
    );

    if args.check {
        print_channel_layout(&config);
        return Ok(());
    }

    run_app(config, Duration::from_secs(args.shutdown_timeout)).await?;

    info!("Neurorack GW shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, shutdown_timeout: Duration) -> Result<()> {
    // Shared state and one wake signal per worker, allocated up front and
    // owned by the supervisor for the life of the process.
    let shared = Arc::new(SharedState::new(
        &config.hardware.channels,
        config.audio.buffer_capacity,
    ));
    let mut supervisor = Supervisor::new(Arc::clone(&shared));

    let audio_signal = Arc::new(WakeSignal::new());
    let screen_signal = Arc::new(WakeSignal::new());
    let sampler_signal = Arc::new(WakeSignal::new());
    let button_signal = Arc::new(WakeSignal::new());
    let rotary_signal = Arc::new(WakeSignal::new());

    let router = Arc::new(EventRouter::new(
        Arc::clone(&shared),
        Arc::clone(&audio_signal),
        Arc::clone(&screen_signal),
    ));

    // Resolve the synthesis model once; an unknown name refuses to start.
    let registry = ModelRegistry::with_builtins();
    let model = registry.resolve(&config.audio.model)?;
    info!("Audio model: {}", model.name());

    // Hardware seams. Real GPIO/I2C drivers implement the same traits and
    // plug in here; the simulated ones let the host run standalone.
    let adc = Arc::new(SimChannelReader::new());
    let button = Arc::new(SimButton);
    let rotary = Arc::new(SimRotary);
    let display = Arc::new(LogDisplay);
    info!("Using simulated hardware drivers");

    supervisor.register_worker("audio", Arc::clone(&audio_signal), move |ctx| {
        workers::audio::run(ctx, model)
    });

    {
        let display = Arc::clone(&display) as Arc<dyn neurorack_gw::hardware::Display>;
        supervisor.register_worker("screen", Arc::clone(&screen_signal), move |ctx| {
            workers::screen::run(ctx, display)
        });
    }

    {
        let sampler = Arc::new(InputSampler::new(
            &config,
            Arc::clone(&shared),
            Arc::clone(&router),
            adc,
        ));
        supervisor.register_worker("cv-sampler", sampler_signal, move |ctx| {
            sampler.run(ctx.cancel)
        });
    }

    {
        let router = Arc::clone(&router);
        let controls = config.controls.clone();
        supervisor.register_worker("button", button_signal, move |ctx| {
            workers::controls::run_button(ctx, button, router, controls)
        });
    }

    {
        let router = Arc::clone(&router);
        let controls = config.controls.clone();
        supervisor.register_worker("rotary", rotary_signal, move |ctx| {
            workers::controls::run_rotary(ctx, rotary, router, controls)
        });
    }

    supervisor.start_all();
    info!("All workers started");

    shutdown_signal().await;
    supervisor.shutdown(shutdown_timeout).await?;

    Ok(())
}

fn print_channel_layout(config: &AppConfig) {
    println!("Channel layout ({} channels):", config.num_channels());
    for (id, kind) in config.hardware.channels.iter().enumerate() {
        let group = id / config.hardware.channels_per_group;
        println!("  channel {:2}  {:?}  (group {})", id, kind, group);
    }
    println!(
        "Thresholds: high={}V low={}V noise={} gate_width={}ms inactivity={}",
        config.sampling.high_threshold,
        config.sampling.low_threshold,
        config.sampling.noise_threshold,
        config.sampling.min_gate_width_ms,
        config.sampling.inactivity_limit
    );
    println!("Audio model: {}", config.audio.model);
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
