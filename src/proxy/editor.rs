//! `Editor` namespace: block editing and editor-level callbacks.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{args, Capability, CallbackRegistration, Handler, ProxyCore};
use crate::models::{BlockInsertOptions, Options, Reply};
use crate::transport::Transport;
use crate::Result;

/// Event name bound to a slash command: the command text without `/`.
#[must_use]
pub fn slash_command_event(command: &str) -> String {
    format!("slash-command-{}", command.replace('/', ""))
}

/// Event name bound to a block context-menu entry.
#[must_use]
pub fn context_menu_event(tag: &str) -> String {
    format!("block-context-menu-item-{tag}")
}

/// Event name for the input-selection-end listener.
pub const INPUT_SELECTION_END_EVENT: &str = "input-selection-end";

/// Proxy for the host's `Editor` API.
pub struct Editor {
    core: ProxyCore,
}

impl Capability for Editor {
    fn core(&self) -> &ProxyCore {
        &self.core
    }
}

impl Editor {
    /// Namespace prefix.
    pub const NAMESPACE: &'static str = "Editor";

    /// Create the proxy on `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            core: ProxyCore::new(Self::NAMESPACE, transport),
        }
    }

    // ── Registrations ───────────────────────────────────────────────────

    /// Register a slash command. Returns `handler` unchanged.
    pub fn register_slash_command(&self, command: &str, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("registerSlashCommand", slash_command_event(command))
                .with_option("command", command)
                .with_handler(Arc::clone(&handler)),
        );
        handler
    }

    /// Register an entry in the block context menu. Returns `handler` unchanged.
    pub fn register_block_context_menu_item(&self, tag: &str, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("registerBlockContextMenuItem", context_menu_event(tag))
                .with_option("tag", tag)
                .with_handler(Arc::clone(&handler)),
        );
        handler
    }

    /// Listen for text selections in the editing input. The handler receives
    /// the selection event object. Returns `handler` unchanged.
    pub fn on_input_selection_end(&self, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("onInputSelectionEnd", INPUT_SELECTION_END_EVENT)
                .with_handler(Arc::clone(&handler)),
        );
        handler
    }

    // ── Immediate calls ─────────────────────────────────────────────────

    /// Append a block at the end of `page`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn append_block_in_page(
        &self,
        page: &str,
        content: &str,
        opts: Options,
    ) -> Result<Reply> {
        self.core
            .request("appendBlockInPage", args([json!(page), json!(content)]), opts)
            .await
    }

    /// Whether the user is editing a block.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn check_editing(&self) -> Result<Reply> {
        self.core.request("checkEditing", Vec::new(), Options::new()).await
    }

    /// Insert `text` at the editing cursor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn insert_at_editing_cursor(&self, text: &str) -> Result<()> {
        self.core
            .emit("insertAtEditingCursor", args([json!(text)]), Options::new())
    }

    /// Block under the cursor.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_current_block(&self) -> Result<Reply> {
        self.core.request("getCurrentBlock", Vec::new(), Options::new()).await
    }

    /// Page currently open.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_current_page(&self) -> Result<Reply> {
        self.core.request("getCurrentPage", Vec::new(), Options::new()).await
    }

    /// Text of the block being edited.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_editing_block_content(&self) -> Result<Reply> {
        self.core
            .request("getEditingBlockContent", Vec::new(), Options::new())
            .await
    }

    /// Look up a page by name.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_page(&self, name: &str) -> Result<Reply> {
        self.core
            .request("getPage", args([json!(name)]), Options::new())
            .await
    }

    /// Look up a block, optionally with its children.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_block(&self, uuid: &str, include_children: bool) -> Result<Reply> {
        let mut opts = Options::new();
        opts.insert("includeChildren".into(), Value::Bool(include_children));
        self.core.request("getBlock", args([json!(uuid)]), opts).await
    }

    /// Block tree of `page`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_page_blocks_tree(&self, page: &str) -> Result<Reply> {
        self.core
            .request("getPageBlocksTree", args([json!(page)]), Options::new())
            .await
    }

    /// Insert a block relative to `src_block`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn insert_block(
        &self,
        src_block: &str,
        content: &str,
        placement: BlockInsertOptions,
    ) -> Result<Reply> {
        self.core
            .request(
                "insertBlock",
                args([json!(src_block), json!(content)]),
                placement.into_options(),
            )
            .await
    }

    /// Replace the content (and optionally properties) of a block.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn update_block(
        &self,
        uuid: &str,
        content: &str,
        properties: Option<Map<String, Value>>,
    ) -> Result<Reply> {
        let mut opts = Options::new();
        if let Some(properties) = properties {
            opts.insert("properties".into(), Value::Object(properties));
        }
        self.core
            .request("updateBlock", args([json!(uuid), json!(content)]), opts)
            .await
    }

    /// Set one property on a block.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn upsert_block_property(&self, uuid: &str, key: &str, value: Value) -> Result<()> {
        self.core.emit(
            "upsertBlockProperty",
            args([json!(uuid), json!(key), value]),
            Options::new(),
        )
    }

    /// Open a page or block in the right sidebar.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn open_in_right_sidebar(&self, uuid: &str) -> Result<()> {
        self.core
            .emit("openInRightSidebar", args([json!(uuid)]), Options::new())
    }

    /// Leave editing mode, optionally keeping the block selected.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn exit_editing_mode(&self, select_block: bool) -> Result<()> {
        self.core
            .emit("exitEditingMode", args([json!(select_block)]), Options::new())
    }
}
