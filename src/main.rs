//! Codevisor command line
//!
//! Runs one session for the instruction given as arguments (or read from
//! stdin when none are given) and prints the final message.
//!
//! Usage: codevisor '```python
//! print(2 + 2)
//! ```'

use std::io::Read;
use std::process::ExitCode;

use codevisor::config::OTLP_ENDPOINT_VAR;
use codevisor::{build_agent, Config, Message};

/// Exit status for a session interrupted by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

fn read_instruction() -> std::io::Result<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Ok(args.join(" "));
    }
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    Ok(input)
}

#[tokio::main]
async fn main() -> ExitCode {
    match std::env::var(OTLP_ENDPOINT_VAR) {
        Ok(endpoint) => {
            if let Err(e) = codevisor::tracing::init_tracing("codevisor", &endpoint) {
                eprintln!("codevisor: tracing disabled: {}", e);
                codevisor::tracing::init_logging();
            }
        }
        Err(_) => codevisor::tracing::init_logging(),
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("codevisor: {}", e);
            codevisor::tracing::shutdown_tracing();
            return ExitCode::from(2);
        }
    };

    let instruction = match read_instruction() {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            eprintln!("codevisor: no instruction given");
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("codevisor: failed to read stdin: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut agent = match build_agent(&config) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("codevisor: {}", e);
            return ExitCode::from(2);
        }
    };

    let result = tokio::select! {
        result = agent.run(Message::user(instruction)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = result else {
        tracing::warn!(session_id = %agent.id(), "Interrupted, stopping environment");
        agent.wait_for_cleanup().await;
        codevisor::tracing::shutdown_tracing();
        eprintln!("codevisor: interrupted");
        return ExitCode::from(EXIT_INTERRUPTED);
    };

    tracing::debug!(metrics = %codevisor::metrics::gather(), "Session metrics");
    codevisor::tracing::shutdown_tracing();

    match result {
        Ok(message) => {
            println!("{}", message.content());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("codevisor: {}", e);
            ExitCode::FAILURE
        }
    }
}
