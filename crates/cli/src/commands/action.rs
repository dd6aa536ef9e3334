//! Build outbound action envelopes

use anyhow::{Context, Result};
use colored::Colorize;
use state_lib::{Action, ActionEnvelope, PersistentSettings, SessionConfig};

use crate::output::OutputFormat;
use crate::ActionCommands;

/// Parse the command's payload and wrap it in its envelope
pub fn build(cmd: ActionCommands) -> Result<ActionEnvelope> {
    let action = match cmd {
        ActionCommands::Connect => Action::Connect,
        ActionCommands::ChangeSession { payload } => {
            let session: SessionConfig =
                serde_json::from_str(&payload).context("Invalid session payload")?;
            Action::ChangeSession(session)
        }
        ActionCommands::SaveSettings { payload } => {
            let settings: PersistentSettings =
                serde_json::from_str(&payload).context("Invalid settings payload")?;
            Action::SaveSettings(settings)
        }
    };

    Ok(ActionEnvelope::new(action))
}

/// Print the envelope on one line, ready to pipe to the host
pub fn print_action(envelope: &ActionEnvelope, format: OutputFormat) -> Result<()> {
    let line = serde_json::to_string(envelope)?;
    println!("{}", line);

    // stdout stays machine-readable
    if format == OutputFormat::Table {
        eprintln!("{} {} action built", "✓".green().bold(), envelope.action.name());
    }

    Ok(())
}
