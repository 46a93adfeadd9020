//! Chat command handler (single message + interactive mode).

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;
use tokio::sync::watch;

use super::common::{create_agent, load_config};

/// Interactive or single-message chat.
pub(crate) async fn cmd_chat(
    config_path: Option<&Path>,
    session: &str,
    message: Option<String>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let agent = create_agent(config).await?;

    if let Some(msg) = message {
        // Single message mode; Ctrl-C cancels the turn without committing it.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = cancel_tx.send(true);
            }
        });
        let result = agent.submit_turn_with_cancel(session, &msg, cancel_rx).await;
        ctrl_c.abort();

        match result {
            Ok(response) => println!("{}", response),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        // Interactive mode
        println!("Toolweave Interactive Agent (session: {})", session);
        println!("Tools: {}", agent.registry().names().join(", "));
        if agent.has_gate() {
            println!("Question gate: on (out-of-scope questions are refused)");
        }
        println!("Type your message and press Enter. Type 'quit' or 'exit' to stop.");
        println!();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF
                    println!();
                    break;
                }
                Ok(_) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if input == "quit" || input == "exit" {
                        println!("Goodbye!");
                        break;
                    }

                    match agent.submit_turn(session, input).await {
                        Ok(response) => {
                            println!();
                            println!("{}", response);
                            println!();
                        }
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            eprintln!();
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    break;
                }
            }
        }
    }

    if let Some(metrics) = agent.metrics() {
        metrics.emit_usage("chat_exit");
    }
    Ok(())
}
