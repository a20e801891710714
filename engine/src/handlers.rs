//! Command handlers for CLI operations
//!
//! - run: drive one requirement to saved code, confirming on stdin
//! - status: show which model providers answer
//! - config show / path

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sdk::types::{Choice, ConfirmationRequest};
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::agent::{Confirmer, OrchestratorService, SessionInput};
use crate::cli::ConfigAction;
use crate::config::Config;
use crate::llm::router::LLMRouter;
use crate::message_bus::{Event, EventType, MessageBus, Notifier};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Asks confirmation questions on the terminal
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn ask_confirmation(&self, request: &ConfirmationRequest) -> Choice {
        let prompt = format!(
            "\n{}\n  [y] {}  [n] {}\n> ",
            request.prompt, request.options[0], request.options[1]
        );

        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(prompt.as_bytes());
            let _ = stdout.flush();

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => Choice::from_answer(&line),
            Ok(Err(e)) => {
                tracing::warn!("Failed to read answer: {}", e);
                Choice::Decline
            }
            Err(e) => {
                tracing::warn!("Confirmation prompt task failed: {}", e);
                Choice::Decline
            }
        }
    }
}

/// Turn a requirement into code
pub async fn handle_run(
    requirement: String,
    repo_context: Option<PathBuf>,
    profile: Option<PathBuf>,
    session: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut input = SessionInput::new(requirement.clone());
    if let Some(path) = repo_context {
        input = input.with_repo_context(read_context_file(&path).await?);
    }
    if let Some(path) = profile {
        input = input.with_user_profile(read_context_file(&path).await?);
    }

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let notifier: Arc<dyn Notifier> = match format {
        OutputFormat::Text => Arc::new(TerminalNotifier::new().await),
        OutputFormat::Json => Arc::new(MessageBus::new()),
    };
    let service = OrchestratorService::from_config(config, notifier);

    if matches!(format, OutputFormat::Text) {
        println!("Session {}", session_id);
        println!("Requirement: {}", requirement);
    }

    let result = service.drive(&session_id, input, &StdinConfirmer).await;

    match format {
        OutputFormat::Text => {
            println!();
            if let Some(error) = &result.error {
                eprintln!("✗ Session failed: {}", error);
            } else if result.code_saved {
                println!(
                    "✓ Code saved as {}",
                    result.filename.as_deref().unwrap_or("(unnamed)")
                );
            } else if result.is_requirement == Some(false) {
                println!("The input is not a software requirement; nothing was generated.");
            } else {
                println!("Session ended without saving code.");
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "session_id": session_id,
                "result": result,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    match result.error {
        Some(error) => Err(anyhow!("Session {} failed: {}", session_id, error)),
        None => Ok(()),
    }
}

/// Show provider availability
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let router = LLMRouter::from_config(&config.llm);
    let health = router.check_health_all().await;

    match format {
        OutputFormat::Text => {
            println!("Default provider: {}", config.llm.default_provider);
            println!("Providers:");
            for (name, healthy) in &health {
                println!(
                    "  {:<8} {}",
                    name,
                    if *healthy { "available" } else { "unavailable" }
                );
            }
        }
        OutputFormat::Json => {
            let providers: serde_json::Map<String, serde_json::Value> = health
                .iter()
                .map(|(name, healthy)| (name.to_string(), json!(healthy)))
                .collect();
            let output = json!({
                "default_provider": config.llm.default_provider,
                "providers": providers,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Show configuration
pub fn handle_config(
    action: ConfigAction,
    config: &Config,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match action {
        ConfigAction::Show => match format {
            OutputFormat::Text => {
                let toml_string =
                    toml::to_string_pretty(config).context("Failed to serialize config")?;
                print!("{}", toml_string);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
        },
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => Config::default_config_path()?,
            };
            match format {
                OutputFormat::Text => println!("{}", path.display()),
                OutputFormat::Json => {
                    println!("{}", json!({ "path": path.display().to_string() }))
                }
            }
        }
    }
    Ok(())
}

async fn read_context_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Prints session events on the terminal as they are published
///
/// Printing happens inside `notify`, so everything the session reported
/// is on screen before a confirmation prompt is written.
pub struct TerminalNotifier {
    bus: MessageBus,
    rx: Mutex<mpsc::Receiver<Event>>,
}

impl TerminalNotifier {
    pub async fn new() -> Self {
        let bus = MessageBus::new();
        let rx = bus.subscribe(EventType::All).await;
        Self {
            bus,
            rx: Mutex::new(rx),
        }
    }

    /// Take every queued event, oldest first
    async fn drain(&self) -> Vec<Event> {
        let mut rx = self.rx.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn notify(&self, event: Event) {
        self.bus.publish(event).await;
        for event in self.drain().await {
            match render_event(&event) {
                Some(line) if matches!(event, Event::Error { .. }) => eprintln!("{}", line),
                Some(line) => println!("{}", line),
                None => {}
            }
        }
    }
}

/// Terminal line for an event, if it is shown at all
fn render_event(event: &Event) -> Option<String> {
    match event {
        Event::Status { message, .. } => Some(format!("· {}", message)),
        Event::AssistantMessage { content, .. } => {
            let content = content.trim();
            (!content.is_empty()).then(|| format!("\nassistant: {}", content))
        }
        Event::ToolResult {
            capability,
            content,
            ..
        } => Some(format!("  [{}] {}", capability, content)),
        Event::ConfirmationRequested { .. } | Event::SessionFinished { .. } => None,
        Event::Error { error, hint, .. } => Some(format!("✗ {}\n  {}", error, hint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(message: &str) -> Event {
        Event::Status {
            session_id: "s1".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_terminal_notifier_prints_before_returning() {
        let notifier = TerminalNotifier::new().await;
        notifier.notify(status("Running validate_requirement")).await;
        notifier.notify(status("Running refine_requirement")).await;

        // Nothing is left for a later writer to interleave with a prompt
        assert!(notifier.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_notifier_drains_in_order() {
        let notifier = TerminalNotifier::new().await;
        notifier.bus.publish(status("first")).await;
        notifier.bus.publish(status("second")).await;

        assert_eq!(notifier.drain().await, vec![status("first"), status("second")]);
        assert!(notifier.drain().await.is_empty());
    }

    #[test]
    fn test_render_event() {
        assert_eq!(
            render_event(&status("Running generate_code")).as_deref(),
            Some("· Running generate_code")
        );
        assert_eq!(
            render_event(&Event::AssistantMessage {
                session_id: "s1".to_string(),
                content: "  ".to_string(),
            }),
            None
        );
        let error = render_event(&Event::Error {
            session_id: "s1".to_string(),
            error: "Model timed out".to_string(),
            hint: "Retry the session".to_string(),
        })
        .unwrap();
        assert!(error.starts_with("✗ Model timed out"));
        assert!(error.ends_with("Retry the session"));
    }
}
