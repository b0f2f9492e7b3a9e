//! StrataKV CLI
//!
//! Interactive command-line interface over the embedded engine.
//!
//! Commands: `put <key> <value>`, `get <key>`, `delete <key>`, `display`,
//! `exit`. Malformed commands print a usage line; errors are reported on one
//! line and never exit the process.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stratakv::{Config, Engine};

/// StrataKV interactive shell
#[derive(Parser, Debug)]
#[command(name = "stratakv-cli")]
#[command(about = "Interactive shell for the StrataKV storage engine")]
struct Args {
    /// Data directory for the database
    #[arg(short, long, default_value = "./stratakv_data")]
    data_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::builder().data_dir(&args.data_dir).build();

    let engine = match Engine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("StrataKV CLI: commands are 'put <key> <value>', 'get <key>', 'delete <key>', 'display', 'exit'");

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        if !dispatch(&engine, line.trim()) {
            break;
        }
    }

    if let Err(e) = engine.close() {
        eprintln!("Error: failed to close database: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Execute one command line; returns false when the loop should end
fn dispatch(engine: &Engine, line: &str) -> bool {
    if line.is_empty() {
        return true;
    }

    // Keep at most three tokens so values may contain spaces
    let parts: Vec<&str> = line.splitn(3, char::is_whitespace).collect();
    let command = parts[0].to_lowercase();

    match command.as_str() {
        "put" => {
            if parts.len() != 3 {
                println!("Usage: put <key> <value>");
                return true;
            }
            match engine.put(parts[1].as_bytes(), parts[2].as_bytes()) {
                Ok(()) => println!("OK"),
                Err(e) => println!("Error: {e}"),
            }
        }

        "get" => {
            if parts.len() != 2 {
                println!("Usage: get <key>");
                return true;
            }
            match engine.get(parts[1].as_bytes()) {
                Ok(Some(value)) => println!("{}", String::from_utf8_lossy(&value)),
                Ok(None) => println!("Not found"),
                Err(e) => println!("Error: {e}"),
            }
        }

        "delete" => {
            if parts.len() != 2 {
                println!("Usage: delete <key>");
                return true;
            }
            match engine.delete(parts[1].as_bytes()) {
                Ok(()) => println!("OK"),
                Err(e) => println!("Error: {e}"),
            }
        }

        "display" => {
            print!("{}", engine.display_state());
        }

        "exit" => {
            println!("Exiting...");
            return false;
        }

        _ => println!("Unknown command. Use 'put', 'get', 'delete', 'display', or 'exit'"),
    }

    true
}
