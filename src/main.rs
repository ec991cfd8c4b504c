// src/main.rs - replay a recorded canonical call stream
use canon_rs::canon::{load_program, Canon, TrajMessage};
use canon_rs::config;
use canon_shared::{create_kinematics, KinematicsKind};
use clap::Parser;
use std::path::PathBuf;

/// Canonical call replay
#[derive(Parser, Debug)]
#[command(name = "canon-replay", about = "Translate a recorded canonical call stream into trajectory messages.")]
struct Cli {
    /// Path to the machine TOML config
    #[arg(short, long, default_value = "machine.toml")]
    config: PathBuf,

    /// JSON array of canonical calls
    #[arg(short, long)]
    program: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Kinematics to use instead of the config's (trivial, corexy, rotary_table, pivot_head)
    #[arg(short, long)]
    kinematics: Option<KinematicsKind>,

    /// Also print the joint vector for every linear move end point
    #[arg(long)]
    joints: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting canon-replay");
    let config_path = cli.config.to_string_lossy().to_string();
    tracing::info!("Loading configuration from: {}", config_path);

    let mut config = config::load_config(&config_path).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", config_path, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    let settings = config.canon_settings()?;
    if let Some(kind) = cli.kinematics {
        config.kinematics.kind = kind;
    }
    let kinematics = create_kinematics(&config.kinematics);
    tracing::info!("Kinematics: {} ({:?})", kinematics.name(), kinematics.kinematics_type());

    let calls = load_program(&cli.program.to_string_lossy())?;
    tracing::info!("Replaying {} canonical calls", calls.len());

    let mut canon = Canon::new(settings);
    canon.init_canon();
    for call in calls {
        canon.execute(call)?;
    }
    canon.finish();

    let stats = canon.queue().stats();
    tracing::info!(
        "{} messages queued (last: {})",
        stats.length,
        stats.last_command.as_deref().unwrap_or("none")
    );
    let mut motions = 0;
    while let Some(entry) = canon.next_message() {
        println!("{}", serde_json::to_string(&entry)?);
        if entry.message.is_motion() {
            motions += 1;
        }
        if cli.joints {
            if let TrajMessage::LinearMove { end, .. } = &entry.message {
                let mut fflags = 0;
                let joints = kinematics.inverse(end, 0, &mut fflags)?;
                println!("{}", serde_json::json!({ "line_number": entry.line_number, "joints": joints }));
            }
        }
    }
    tracing::info!("{} motion messages, queue peaked at {}", motions, canon.queue().stats().max_length);
    Ok(())
}
