//! Interactive chat loop.

use std::path::PathBuf;

use devpilot_chat::Orchestrator;
use devpilot_core::{Functionality, Message, Role};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::terminal::code_reference;

const HELP: &str = "\
Commands:
  /new                      start a new conversation
  /clear                    start a new session, keeping the history
  /clear-all                delete all messages
  /interrupt                stop the streaming answer
  /regenerate               answer the last question again
  /delete                   delete the last question and its answer
  /<action> <file> [lang]   run a code action (explain, fix, comment, test, performance,
                            review, comment_method, generate_commit)
  /commit                   suggest a commit message for the staged changes
  /repo                     show whether the configured repository is indexed
  /quit                     exit
Anything else is sent as a chat message. Start it with @repo to ask about the repository.";

/// A line typed at the prompt.
#[derive(Debug, PartialEq)]
pub enum ReplCommand {
    Chat(String),
    New,
    Clear,
    ClearAll,
    Interrupt,
    Regenerate,
    Delete,
    Action {
        functionality: Functionality,
        file: PathBuf,
        language: Option<String>,
    },
    Repo,
    Commit,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Chat(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default();
        match name {
            "new" => ReplCommand::New,
            "clear" => ReplCommand::Clear,
            "clear-all" => ReplCommand::ClearAll,
            "interrupt" | "stop" => ReplCommand::Interrupt,
            "regenerate" | "retry" => ReplCommand::Regenerate,
            "delete" => ReplCommand::Delete,
            "repo" => ReplCommand::Repo,
            "commit" => ReplCommand::Commit,
            "help" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => match (other.parse::<Functionality>(), parts.next()) {
                (Ok(functionality), Some(file)) => ReplCommand::Action {
                    functionality,
                    file: PathBuf::from(file),
                    language: parts.next().map(str::to_string),
                },
                (Ok(_), None) => ReplCommand::Invalid(format!("/{} needs a file", other)),
                (Err(_), _) => ReplCommand::Invalid(format!("unknown command /{}", other)),
            },
        }
    }
}

/// Read commands from stdin until `/quit` or end of input.
pub async fn run(orchestrator: Orchestrator) -> Result<(), Box<dyn std::error::Error>> {
    println!("DevPilot chat. Type /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn: Option<JoinHandle<()>> = None;

    while let Some(line) = lines.next_line().await? {
        let command = ReplCommand::parse(&line);
        debug!(?command, "Read command");
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Invalid(reason) => eprintln!("{}", reason),
            ReplCommand::New => orchestrator.start_new_conversation(),
            ReplCommand::Clear => orchestrator.clear_chat_history(),
            ReplCommand::ClearAll => orchestrator.clear_all_history(),
            ReplCommand::Interrupt => orchestrator.interrupt(),
            ReplCommand::Delete => {
                match last_id(&orchestrator, Role::User) {
                    Some(id) => report(orchestrator.delete_message(&id)),
                    None => eprintln!("nothing to delete"),
                }
            }
            ReplCommand::Repo => {
                let embedded = orchestrator.refresh_repo_state().await;
                println!("repository indexed: {}", embedded);
            }
            ReplCommand::Commit => {
                let diff = match staged_diff().await {
                    Ok(diff) => diff,
                    Err(e) => {
                        eprintln!("cannot read staged changes: {}", e);
                        continue;
                    }
                };
                let orchestrator = orchestrator.clone();
                turn = Some(tokio::spawn(async move {
                    match orchestrator
                        .generate_commit_message(&diff, CancellationToken::new())
                        .await
                    {
                        Ok(Some(message)) => println!("{}", message),
                        Ok(None) => {}
                        Err(e) => report(Err(e)),
                    }
                }));
            }
            ReplCommand::Chat(text) => {
                let orchestrator = orchestrator.clone();
                turn = Some(tokio::spawn(async move {
                    report(orchestrator.append_user_message(Message::user(text), None).await);
                }));
            }
            ReplCommand::Regenerate => {
                let Some(id) = last_id(&orchestrator, Role::Assistant) else {
                    eprintln!("nothing to regenerate");
                    continue;
                };
                let orchestrator = orchestrator.clone();
                turn = Some(tokio::spawn(async move {
                    report(orchestrator.regenerate_message(&id).await);
                }));
            }
            ReplCommand::Action {
                functionality,
                file,
                language,
            } => {
                let source = match tokio::fs::read_to_string(&file).await {
                    Ok(source) => source,
                    Err(e) => {
                        eprintln!("cannot read {}: {}", file.display(), e);
                        continue;
                    }
                };
                let code_ref = code_reference(&file, language, source);
                let orchestrator = orchestrator.clone();
                turn = Some(tokio::spawn(async move {
                    report(orchestrator.start_functionality(functionality, Some(code_ref)).await);
                }));
            }
        }
    }

    orchestrator.interrupt();
    if let Some(turn) = turn {
        turn.await?;
    }
    Ok(())
}

/// Output of `git diff --cached` in the current directory.
pub async fn staged_diff() -> std::io::Result<String> {
    let output = Command::new("git")
        .args(["diff", "--cached"])
        .output()
        .await?;
    if !output.status.success() {
        return Err(std::io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn last_id(orchestrator: &Orchestrator, role: Role) -> Option<devpilot_core::MessageId> {
    orchestrator
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == role && !m.marker)
        .map(|m| m.id.clone())
}

fn report(result: Result<(), devpilot_chat::ChatError>) {
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_and_builtins() {
        assert_eq!(ReplCommand::parse("  hello  "), ReplCommand::Chat("hello".to_string()));
        assert_eq!(ReplCommand::parse("/new"), ReplCommand::New);
        assert_eq!(ReplCommand::parse("/stop"), ReplCommand::Interrupt);
        assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("/commit"), ReplCommand::Commit);
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(
            ReplCommand::parse("/fix src/lib.rs rust"),
            ReplCommand::Action {
                functionality: Functionality::FixCode,
                file: PathBuf::from("src/lib.rs"),
                language: Some("rust".to_string()),
            }
        );
        assert!(matches!(ReplCommand::parse("/explain"), ReplCommand::Invalid(_)));
        assert!(matches!(ReplCommand::parse("/dance a.rs"), ReplCommand::Invalid(_)));
        assert!(matches!(
            ReplCommand::parse("/generate_commit diff.patch"),
            ReplCommand::Action {
                functionality: Functionality::GenerateCommit,
                ..
            }
        ));
    }
}
