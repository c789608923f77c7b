//! # mqio Gateway Binary
//!
//! Bridges an MQTT broker to GPIO pins and sensors.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default configuration file
//! mqio
//!
//! # Run with a specific configuration, verbose JSON logs
//! mqio --config ./config.toml -v --json
//!
//! # Validate a configuration without touching hardware or the network
//! mqio --config ./config.toml --check
//! ```

use clap::Parser;
use mqio::bridge::rumqtt::RumqttClient;
use mqio::shutdown::Signals;
use mqio::{Gateway, GatewayError, ModuleSet};
use mqio_common::config::{ConfigLoader, GatewayConfig, LogLevel};
use mqio_common::consts::DEFAULT_CONFIG_PATH;
use mqio_hal::ModuleRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// mqio - MQTT to GPIO/sensor gateway
#[derive(Parser, Debug)]
#[command(name = "mqio")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Exposes GPIO pins and sensors over MQTT")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging (overrides [logging] level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("mqio failed: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), GatewayError> {
    let config = GatewayConfig::load(&args.config);
    // Logging needs the config's level, so a config error is reported
    // with the default level.
    let level = match &config {
        Ok(c) => c.logging.level,
        Err(_) => LogLevel::default(),
    };
    setup_tracing(&args, level);

    let config = config?;
    config.validate()?;
    info!("mqio v{} starting with {:?}", env!("CARGO_PKG_VERSION"), args.config);

    if args.check {
        print_summary(&config);
        return Ok(());
    }

    let registry = ModuleRegistry::with_builtin_drivers();
    let modules = ModuleSet::from_config(&registry, &config)?;
    let gateway = Gateway::new(config, modules);

    let result = serve(&gateway);
    let failures = gateway.modules().cleanup();
    info!("mqio stopped ({failures} module cleanup failure(s))");
    result
}

/// Everything that needs the scheduler. Returns once it has stopped.
fn serve(gateway: &Gateway) -> Result<(), GatewayError> {
    gateway.setup_outputs()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let signals = Signals::new()?;
        let client =
            RumqttClient::connect(&gateway.config().mqtt, gateway.supervisor()).await?;
        gateway.start(Arc::new(client)).await?;
        gateway.run(signals).await;
        Ok::<_, GatewayError>(())
    })?;

    drop(runtime);
    info!("Scheduler stopped");
    Ok(())
}

fn print_summary(config: &GatewayConfig) {
    println!("Configuration OK");
    println!("  broker:          {}:{}", config.mqtt.host, config.mqtt.port);
    println!("  topic prefix:    {}", config.mqtt.topic_prefix);
    println!("  gpio modules:    {}", config.gpio_modules.len());
    println!("  sensor modules:  {}", config.sensor_modules.len());
    println!("  digital inputs:  {}", config.digital_inputs.len());
    println!("  digital outputs: {}", config.digital_outputs.len());
    println!("  sensor inputs:   {}", config.sensor_inputs.len());
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(level)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
