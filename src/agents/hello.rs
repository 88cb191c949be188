//! `hello` agent: greets from the `/hello` slash command.

use std::sync::{Arc, Weak};

use serde_json::{json, Map};
use tracing::debug;

use crate::agent::{Agent, SettingsSchema};
use crate::models::BlockInsertOptions;
use crate::proxy::handler;
use crate::transport::Transport;
use crate::{AppError, Result};

/// Agent name.
pub const NAME: &str = "hello";

/// Slash command the agent registers.
pub const COMMAND: &str = "hello";

const DEFAULT_GREETING: &str = "Hello, World!";

/// Build the agent on `transport`.
///
/// # Errors
///
/// Returns `AppError::Schema` if the settings schema is invalid.
pub fn build(transport: Arc<Transport>) -> Result<Arc<Agent>> {
    let agent = Agent::builder(NAME)
        .description("Say hello to Logseq")
        .settings(
            SettingsSchema::new()
                .setting("greeting", DEFAULT_GREETING, "Text inserted at the cursor")
                .setting("tag", "amazing", "Tag attached to the follow-up block"),
        )
        .build(transport)?;

    let weak = Arc::downgrade(&agent);
    agent.editor.register_slash_command(
        COMMAND,
        handler(move |_args| {
            let weak = weak.clone();
            async move {
                greet(&weak).await?;
                Ok(None)
            }
        }),
    );

    Ok(agent)
}

async fn greet(weak: &Weak<Agent>) -> Result<()> {
    let agent = weak
        .upgrade()
        .ok_or_else(|| AppError::Handler("hello agent dropped".into()))?;
    let settings = agent.settings();
    let greeting = settings.get_str("greeting").unwrap_or(DEFAULT_GREETING);

    agent.editor.insert_at_editing_cursor(greeting)?;

    let block = agent.editor.get_current_block().await?;
    let Some(uuid) = block.get_str("uuid") else {
        debug!("no current block, skipping follow-up");
        agent.editor.exit_editing_mode(false)?;
        return Ok(());
    };

    let mut properties = Map::new();
    if let Some(tag) = settings.get_str("tag") {
        properties.insert("tags".into(), json!(tag));
    }
    agent
        .editor
        .insert_block(
            uuid,
            "Hello again, World!",
            BlockInsertOptions::default().with_properties(properties),
        )
        .await?;
    agent.editor.exit_editing_mode(false)?;
    Ok(())
}
