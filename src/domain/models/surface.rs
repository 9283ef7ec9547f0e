use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputEdit {
    /// Removes the selected range.
    DeleteContent,
    InsertText(String),
}

impl InputEdit {
    pub fn input_type(&self) -> &'static str {
        match self {
            InputEdit::DeleteContent => return "deleteByCut",
            InputEdit::InsertText(_) => return "insertText",
        }
    }

    pub fn data(&self) -> Option<&str> {
        match self {
            InputEdit::DeleteContent => return None,
            InputEdit::InsertText(text) => return Some(text),
        }
    }
}

/// Drives the host's own prompt input. Edits are dispatched as input events so the host
/// updates its internal state itself.
#[async_trait]
pub trait TextSurfaceDriver {
    async fn focus(&self) -> Result<()>;

    async fn select_all(&self) -> Result<()>;

    async fn dispatch_edit(&self, edit: InputEdit) -> Result<()>;

    /// Activates the host's submit control.
    async fn submit(&self) -> Result<()>;

    #[allow(clippy::implicit_return)]
    async fn replace_content(&self, text: &str) -> Result<()> {
        self.select_all().await?;
        self.dispatch_edit(InputEdit::DeleteContent).await?;
        self.dispatch_edit(InputEdit::InsertText(text.to_string()))
            .await?;
        return Ok(());
    }
}

pub type SurfaceDriverBox = Arc<dyn TextSurfaceDriver + Send + Sync>;
