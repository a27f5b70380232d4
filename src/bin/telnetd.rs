//! Demo telnet server
//!
//! Serves the built-in echo shell over plain TCP. No option negotiation
//! happens on the wire, so clients should run in character mode.

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use telnetd::app::{self, Config};
use telnetd::io::TerminalRegistry;
use telnetd::net::{ConnectionManager, Transport};
use telnetd::shell::ShellRegistry;

fn main() -> ExitCode {
    app::init_logging("info");

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut port: Option<u16> = None;
    let mut show_help = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                }
            },
            "-p" | "--port" => {
                i += 1;
                if i < args.len() {
                    match args[i].parse() {
                        Ok(p) => port = Some(p),
                        Err(_) => {
                            eprintln!("Invalid port: {}", args[i]);
                            return ExitCode::FAILURE;
                        },
                    }
                }
            },
            "-h" | "--help" => {
                show_help = true;
            },
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return ExitCode::FAILURE;
            },
        }
        i += 1;
    }

    if show_help {
        print_help();
        return ExitCode::SUCCESS;
    }

    let mut config = match &config_path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            },
        },
        None => Config::load_or_default(),
    };
    if let Some(port) = port {
        config.port = port;
    }

    let shells = Arc::new(ShellRegistry::with_builtin());
    let terminals = Arc::new(TerminalRegistry::with_defaults());
    let manager = match ConnectionManager::from_config(&config, shells, terminals) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        },
    };

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = match TcpListener::bind(addr) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", addr, e);
            return ExitCode::FAILURE;
        },
    };
    if let Err(e) = manager.start() {
        eprintln!("Error starting housekeeping: {}", e);
        return ExitCode::FAILURE;
    }
    tracing::info!(%addr, shell = %config.login_shell, "Listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                continue;
            },
        };
        if let Err(e) = stream.set_write_timeout(config.write_timeout()) {
            tracing::warn!("Setting write timeout failed: {}", e);
        }
        match Transport::tcp(stream) {
            Ok(transport) => {
                manager.admit(transport);
            },
            Err(e) => tracing::warn!("Dropping connection: {}", e),
        }
    }

    manager.stop();
    ExitCode::SUCCESS
}

fn print_help() {
    println!("telnetd - demo telnet server");
    println!();
    println!("USAGE:");
    println!("    telnetd [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>  Configuration file (default ~/.config/telnetd/config.json)");
    println!("    -p, --port <PORT>    Port to listen on");
    println!("    -h, --help           Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Log filter (default: info)");
}
