//! `bye` agent: answers the `/bye` slash command.

use std::sync::Arc;

use crate::agent::Agent;
use crate::proxy::handler;
use crate::transport::Transport;
use crate::{AppError, Result};

/// Agent name.
pub const NAME: &str = "bye";

/// Slash command the agent registers.
pub const COMMAND: &str = "bye";

/// Build the agent on `transport`.
///
/// # Errors
///
/// Infallible today; kept fallible to match [`AgentFactory`](crate::agent::AgentFactory).
pub fn build(transport: Arc<Transport>) -> Result<Arc<Agent>> {
    let agent = Agent::builder(NAME)
        .description("Say bye to Logseq")
        .build(transport)?;

    let weak = Arc::downgrade(&agent);
    agent.editor.register_slash_command(
        COMMAND,
        handler(move |_args| {
            let agent = weak.upgrade();
            async move {
                let agent =
                    agent.ok_or_else(|| AppError::Handler("bye agent dropped".into()))?;
                agent.editor.insert_at_editing_cursor("Seeya later, World!")?;
                Ok(None)
            }
        }),
    );

    Ok(agent)
}
