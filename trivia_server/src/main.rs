// CLI entry point for the trivia session coordinator.
//
// Starts a standalone coordinator that trivia clients connect to. See
// `server.rs` for the networking architecture and `session.rs` for the
// session state machine. The binary serves the built-in sample question
// set; embedders plug in their own `QuestionSource` via the library API.
//
// Usage:
//   trivia-server [OPTIONS]
//     --host <ADDR>           Listen address (default: 127.0.0.1)
//     --port <PORT>           Listen port (default: 8888)
//     --idle-timeout <SECS>   Disconnect silent clients after (default: 60)

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use trivia_server::questions::{FixedQuestionSource, sample_questions};
use trivia_server::{ServerConfig, ServerEvent, start_server};

fn main() {
    init_tracing();
    let config = parse_args();

    let source = Box::new(FixedQuestionSource::new(sample_questions()));
    let (handle, addr, events) = match start_server(config, source) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    println!("Trivia coordinator listening on {addr}");
    println!("Press Ctrl+C to stop.");

    // Log lifecycle events until the process is killed. SIGINT/SIGTERM
    // terminate the process, which tears the listener down with it.
    loop {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    handle.stop();
}

fn init_tracing() {
    #[cfg(debug_assertions)]
    let level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::PlayerConnected {
            player_id,
            player_name,
        } => tracing::info!("event: {player_name} ({player_id}) connected"),
        ServerEvent::PlayerDisconnected { player_id } => {
            tracing::info!("event: {player_id} disconnected");
        }
        ServerEvent::SessionCreated { session_id, host } => {
            tracing::info!("event: session {session_id} created by {host}");
        }
        ServerEvent::GameStarted { session_id } => {
            tracing::info!("event: game started in {session_id}");
        }
        ServerEvent::GameFinished { session_id } => {
            tracing::info!("event: game finished in {session_id}");
        }
        ServerEvent::SessionEnded { session_id } => {
            tracing::info!("event: session {session_id} ended");
        }
    }
}

/// Parse command-line arguments into a `ServerConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                config.host = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--host requires a value");
                    std::process::exit(1);
                });
            }
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--idle-timeout" => {
                i += 1;
                let secs: u64 = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--idle-timeout requires a number of seconds");
                    std::process::exit(1);
                });
                config.idle_timeout = Duration::from_secs(secs);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: trivia-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --host <ADDR>           Listen address (default: 127.0.0.1)");
    println!("  --port <PORT>           Listen port (default: 8888)");
    println!("  --idle-timeout <SECS>   Disconnect silent clients after (default: 60)");
    println!("  --help, -h              Show this help");
}
