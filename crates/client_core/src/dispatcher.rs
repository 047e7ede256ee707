//! Controller side: translates UI intents into task store operations.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{Filter, TaskId},
    protocol::TaskPatch,
};
use thiserror::Error;
use tracing::info;

use crate::{StoreError, TaskStore};

/// Tags carried by a list-item interaction; the originating element decides
/// which of the three a click means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Toggle,
    Edit,
    Delete,
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("dispatcher wiring is missing a task store")]
    MissingStore,
    #[error("task store has no rendering view attached")]
    ViewNotAttached,
}

pub struct Dispatcher {
    store: Arc<TaskStore>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Wiring is assembled piecemeal by the UI shell; incomplete wiring
    /// fails here, before any intent is dispatched.
    pub fn new(store: Option<Arc<TaskStore>>) -> Result<Self, ConfigurationError> {
        let store = store.ok_or(ConfigurationError::MissingStore)?;
        if !store.has_view() {
            return Err(ConfigurationError::ViewNotAttached);
        }
        Ok(Self { store })
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Form submission: add when idle, update the edited task otherwise.
    /// A duplicate (case-insensitive text, same due date) does neither.
    /// The form clears after every completed submission, duplicates
    /// included; a failed remote call propagates without clearing.
    pub async fn submit(&self, text: &str, due_date: &str) -> Result<(), StoreError> {
        let text = text.trim();
        if self.store.has_duplicate(text, due_date).await {
            info!(due_date, "duplicate submission ignored");
        } else {
            match self.store.editing_task().await {
                Some(id) => {
                    let patch = TaskPatch {
                        text: Some(text.to_string()),
                        due_date: Some(due_date.to_string()),
                        completed: None,
                    };
                    self.store.update(id, patch).await?;
                    self.store.enter_or_exit_edit(id).await;
                }
                None => self.store.add(text, due_date).await?,
            }
        }
        self.store.clear_form();
        Ok(())
    }

    pub async fn dispatch_item_action(
        &self,
        id: TaskId,
        actions: &[ItemAction],
    ) -> Result<(), StoreError> {
        for action in actions {
            match action {
                ItemAction::Toggle => self.store.toggle_completion(id).await?,
                ItemAction::Edit => self.store.enter_or_exit_edit(id).await,
                ItemAction::Delete => {
                    // Any active edit is exited first, even when it targets a
                    // different task than the one being deleted.
                    if let Some(editing) = self.store.editing_task().await {
                        self.store.enter_or_exit_edit(editing).await;
                    }
                    self.store.remove(id).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn change_filter(&self, filter: Filter) {
        self.store.set_filter(filter).await;
    }

    /// Today's UTC date as ISO `YYYY-MM-DD`; seeds the minimum selectable
    /// due date in the form.
    pub fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }
}
