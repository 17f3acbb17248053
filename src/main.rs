//! soultrace - Entry Point
//!
//! Runs one reasoning cycle: reads a session state JSON (file argument or
//! stdin), executes the cycle, prints the updated state JSON to stdout.
//! Logs go to stderr so stdout stays a clean JSON channel.

use soultrace::{BehaviorState, BehaviorTracker, Config};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let new_mode = args.iter().any(|a| a == "--new" || a == "-n");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let state_file = args.iter().skip(1).find(|a| !a.starts_with('-'));

    if help_mode {
        println!("soultrace v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: soultrace [OPTIONS] [STATE_FILE]");
        println!();
        println!("Runs one Thought/Query/Decision cycle over the given session state");
        println!("and prints the updated state as JSON.");
        println!();
        println!("Options:");
        println!("  --new, -n          Print a fresh empty state stamped with the current time");
        println!("  --help, -h         Show this help");
        println!();
        println!("Without STATE_FILE the state JSON is read from stdin.");
        println!();
        println!("Environment variables:");
        println!("  API_KEY                  Chat provider API key");
        println!("  API_BASE_URL             Chat completions endpoint");
        println!("  MODEL_NAME               Model name");
        println!("  SOULTRACE_PERSONA        Persona description for the prompt");
        println!("  SOULTRACE_DATA_DIR       Behaviour log directory (default: data)");
        println!("  SOULTRACE_LOOKUP_TIMEOUT Source lookup timeout in seconds (default: 10)");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if new_mode {
        let state = BehaviorState::new(chrono::Local::now().format("%H:%M").to_string());
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let raw = match state_file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    let mut state: BehaviorState = serde_json::from_str(&raw)?;

    let config = Config::from_env()?;
    let tracker = BehaviorTracker::from_config(&config)?;

    info!("Running cycle at {}", state.current_time);
    let output = tracker.run_cycle(&mut state).await?;
    info!("Cycle done: {}", output.thought);

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
