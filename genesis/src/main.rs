//! Genesis: shape a world by combining elements.
//!
//! A line-oriented front end over `genesis-core`. Setup values come from
//! the command line, or are asked for on stdin when missing:
//!
//! ```bash
//! cargo run -p genesis -- --name Cronos --trait "Time and decay" --world "Earth Prime"
//! ```

mod headless;

use genesis_core::{EngineConfig, GameSession};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "genesis=info,genesis_core=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = EngineConfig::from_env()?;
    if !config.has_credentials() {
        eprintln!("Note: CLOUDFLARE_API_KEY / CLOUDFLARE_ACCOUNT_ID not set.");
        eprintln!("New elements will be formed by backup magic only.");
    }

    let setup = headless::parse_setup_from_args(&args);
    let profile = headless::complete_setup(setup)?;

    let session = GameSession::from_config(&config, profile).await;
    tracing::info!(
        world = %session.profile().world_name,
        concepts = session.store().len(),
        save_dir = %config.save_dir.display(),
        "session started"
    );
    headless::run_headless(&session, &config).await?;

    session.flush().await;
    Ok(())
}

/// Logs go to stderr so stdout carries only game output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn print_help() {
    println!("Genesis - AI-assisted world crafting");
    println!();
    println!("USAGE:");
    println!("  genesis [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help           Show this help message");
    println!("  --name <NAME>        Your divine name");
    println!("  --trait <POWERS>     What your powers are");
    println!("  --world <WORLD>      Name of the planet to shape");
    println!();
    println!("A saved world is resumed automatically; the options above only");
    println!("apply when starting a new one.");
    println!();
    println!("ENVIRONMENT:");
    println!("  CLOUDFLARE_API_KEY, CLOUDFLARE_ACCOUNT_ID   Workers AI credentials");
    println!("  GENESIS_TEXT_MODEL, GENESIS_IMAGE_MODEL     Model overrides");
    println!("  GENESIS_API_BASE                            API base URL or proxy");
    println!("  GENESIS_SAVE_DIR                            Save directory (default: saves)");
    println!("  GENESIS_PRESENTATION_DELAY_MS               Recipe/fallback pacing (default: 500)");
    println!("  RUST_LOG                                    Log filter");
}
