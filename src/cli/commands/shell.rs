//! Interactive session.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use ocrflow::workflow::{Action, ACTION_WORDS};
use ocrflow::Config;

use super::run::connect;
use crate::cli::helpers::{print_notices, print_outcome, print_results};
use crate::cli::icons::{arrow, error};

fn print_help() {
    for (usage, summary) in ACTION_WORDS {
        println!("  {:<48} {}", usage, summary);
    }
    println!("  {:<48} {}", "results", "print the recognized text");
    println!("  {:<48} {}", "quit", "leave the shell");
}

pub async fn cmd_shell(config: Config) -> anyhow::Result<()> {
    let server = config.server_url.clone();
    let auto_continue = config.auto_continue;
    let (mut orchestrator, event_handler) = connect(config, auto_continue)?;
    println!(
        "{} Backend {}. Type 'help' for actions, 'quit' to leave.",
        arrow(),
        server
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("ocrflow> ");
        std::io::stderr().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => print_help(),
            "results" => print_results(orchestrator.session()),
            command => match command.parse::<Action>() {
                // failures are reported through the notice board
                Ok(action) => {
                    if let Ok(outcome) = orchestrator.dispatch(action).await {
                        print_outcome(&outcome);
                    }
                }
                Err(e) => eprintln!("{} {}", error(), e),
            },
        }
        print_notices(orchestrator.session_mut());
    }

    orchestrator.close().await;
    let _ = event_handler.await;
    Ok(())
}
