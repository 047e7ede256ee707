//! Model side of the desktop TODO app: the task store, its edit-slot state
//! machine, and the rendering-collaborator seam.
//!
//! All store operations run to completion on the UI's event loop; the UI
//! surface serializes user actions, so no two mutating operations overlap.
//! Local state mutates only after the corresponding remote call succeeds.

use std::sync::Arc;

use reqwest::Client;
use shared::{
    domain::{Filter, Task, TaskId},
    protocol::TaskPatch,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub mod dispatcher;

pub use dispatcher::{ConfigurationError, Dispatcher, ItemAction};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:6432";

/// Rendering collaborator driven by the store after every state change.
pub trait TaskView: Send + Sync {
    fn render_visible(&self, tasks: &[Task]);
    fn clear_form(&self);
    fn notify_edit_state(&self, task: &Task, is_editing: bool);
}

/// Null view for stores constructed before the UI is wired. Every call
/// logs a warning; dispatcher construction rejects stores carrying it.
pub struct MissingTaskView;

impl TaskView for MissingTaskView {
    fn render_visible(&self, tasks: &[Task]) {
        warn!(count = tasks.len(), "render_visible called with no view attached");
    }

    fn clear_form(&self) {
        warn!("clear_form called with no view attached");
    }

    fn notify_edit_state(&self, task: &Task, is_editing: bool) {
        warn!(
            task_id = task.id.0,
            is_editing, "notify_edit_state called with no view attached"
        );
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to load tasks from the remote store: {source}")]
    Load { source: anyhow::Error },
    #[error("failed to add task to the remote store: {source}")]
    Add { source: anyhow::Error },
    #[error("failed to update task {} on the remote store: {source}", .id.0)]
    Update { id: TaskId, source: anyhow::Error },
    #[error("failed to delete task {} from the remote store: {source}", .id.0)]
    Delete { id: TaskId, source: anyhow::Error },
}

/// Single-slot edit state: at most one task is being edited at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditSlot {
    #[default]
    Idle,
    Editing { task_id: TaskId },
}

struct StoreState {
    tasks: Vec<Task>,
    next_id: i64,
    filter: Filter,
    edit: EditSlot,
}

impl StoreState {
    fn visible(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| self.filter.matches(task))
            .cloned()
            .collect()
    }
}

pub struct TaskStore {
    http: Client,
    server_url: String,
    view: Arc<dyn TaskView>,
    view_attached: bool,
    state: Mutex<StoreState>,
}

impl TaskStore {
    pub fn new(server_url: impl Into<String>, view: Arc<dyn TaskView>) -> Arc<Self> {
        Self::build(server_url.into(), view, true)
    }

    /// Store without a rendering view; useful while wiring is incomplete.
    /// Dispatcher construction rejects it.
    pub fn detached(server_url: impl Into<String>) -> Arc<Self> {
        Self::build(server_url.into(), Arc::new(MissingTaskView), false)
    }

    fn build(server_url: String, view: Arc<dyn TaskView>, view_attached: bool) -> Arc<Self> {
        Arc::new(Self {
            http: Client::new(),
            server_url,
            view,
            view_attached,
            state: Mutex::new(StoreState {
                tasks: Vec::new(),
                next_id: 1,
                filter: Filter::All,
                edit: EditSlot::Idle,
            }),
        })
    }

    pub fn has_view(&self) -> bool {
        self.view_attached
    }

    fn todos_url(&self) -> String {
        format!("{}/todos", self.server_url)
    }

    fn todo_url(&self, id: TaskId) -> String {
        format!("{}/todos/{}", self.server_url, id.0)
    }

    /// Replaces the collection with the remote listing and recomputes the id
    /// counter. All-or-nothing: on any failure the collection is untouched.
    pub async fn load(&self) -> Result<(), StoreError> {
        let response = self
            .http
            .get(self.todos_url())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| StoreError::Load {
                source: source.into(),
            })?;
        let body: serde_json::Value = response.json().await.map_err(|source| StoreError::Load {
            source: source.into(),
        })?;

        let mut tasks = decode_task_listing(body).map_err(|source| StoreError::Load { source })?;
        tasks.sort_by_key(|task| task.id);
        let count = tasks.len();

        let visible = {
            let mut state = self.state.lock().await;
            state.next_id = tasks.last().map(|task| task.id.0 + 1).unwrap_or(1);
            state.tasks = tasks;
            state.visible()
        };
        info!(count, "loaded tasks from remote store");
        self.view.render_visible(&visible);
        Ok(())
    }

    /// Persists a new task under the next free id, then appends it locally.
    /// The counter only advances after the remote accepts the task.
    pub async fn add(&self, text: &str, due_date: &str) -> Result<(), StoreError> {
        let task = {
            let state = self.state.lock().await;
            Task {
                id: TaskId(state.next_id),
                text: text.to_string(),
                due_date: due_date.to_string(),
                completed: false,
            }
        };

        self.http
            .post(self.todo_url(task.id))
            .json(&task)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| StoreError::Add {
                source: source.into(),
            })?;

        let visible = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            state.tasks.push(task.clone());
            state.visible()
        };
        info!(task_id = task.id.0, "task added");
        self.view.render_visible(&visible);
        Ok(())
    }

    /// Flips the completion flag. Unknown ids are ignored without touching
    /// the remote store.
    pub async fn toggle_completion(&self, id: TaskId) -> Result<(), StoreError> {
        let next_completed = {
            let state = self.state.lock().await;
            match state.tasks.iter().find(|task| task.id == id) {
                Some(task) => !task.completed,
                None => return Ok(()),
            }
        };

        let patch = TaskPatch {
            completed: Some(next_completed),
            ..Default::default()
        };
        self.put_patch(id, &patch)
            .await
            .map_err(|source| StoreError::Update { id, source })?;

        let visible = {
            let mut state = self.state.lock().await;
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                task.completed = next_completed;
            }
            state.visible()
        };
        info!(task_id = id.0, completed = next_completed, "task toggled");
        self.view.render_visible(&visible);
        Ok(())
    }

    /// Merges the patch into the task, remote first. Unknown ids are ignored
    /// without touching the remote store.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        let known = {
            let state = self.state.lock().await;
            state.tasks.iter().any(|task| task.id == id)
        };
        if !known {
            return Ok(());
        }

        self.put_patch(id, &patch)
            .await
            .map_err(|source| StoreError::Update { id, source })?;

        let visible = {
            let mut state = self.state.lock().await;
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                patch.apply_to(task);
            }
            state.visible()
        };
        info!(task_id = id.0, "task updated");
        self.view.render_visible(&visible);
        Ok(())
    }

    /// Deletes remotely, then drops the task from the collection. The id
    /// counter never moves backwards.
    pub async fn remove(&self, id: TaskId) -> Result<(), StoreError> {
        let known = {
            let state = self.state.lock().await;
            state.tasks.iter().any(|task| task.id == id)
        };
        if !known {
            return Ok(());
        }

        self.http
            .delete(self.todo_url(id))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| StoreError::Delete {
                id,
                source: source.into(),
            })?;

        let visible = {
            let mut state = self.state.lock().await;
            state.tasks.retain(|task| task.id != id);
            state.visible()
        };
        info!(task_id = id.0, "task removed");
        self.view.render_visible(&visible);
        Ok(())
    }

    pub async fn set_filter(&self, filter: Filter) {
        let visible = {
            let mut state = self.state.lock().await;
            state.filter = filter;
            state.visible()
        };
        self.view.render_visible(&visible);
    }

    /// Read-only projection of the collection under the active filter,
    /// insertion order preserved.
    pub async fn visible_tasks(&self) -> Vec<Task> {
        self.state.lock().await.visible()
    }

    /// Edit-slot transition. Entering while another task is being edited
    /// exits that edit first, then enters the new one; each transition
    /// notifies the view. Unknown ids do not transition.
    pub async fn enter_or_exit_edit(&self, id: TaskId) {
        let notifications = {
            let mut state = self.state.lock().await;
            let Some(target) = state.tasks.iter().find(|task| task.id == id).cloned() else {
                return;
            };

            match state.edit {
                EditSlot::Idle => {
                    state.edit = EditSlot::Editing { task_id: id };
                    vec![(target, true)]
                }
                EditSlot::Editing { task_id } if task_id == id => {
                    state.edit = EditSlot::Idle;
                    vec![(target, false)]
                }
                EditSlot::Editing { task_id } => {
                    let previous = state.tasks.iter().find(|task| task.id == task_id).cloned();
                    state.edit = EditSlot::Editing { task_id: id };
                    let mut out = Vec::new();
                    if let Some(previous) = previous {
                        out.push((previous, false));
                    }
                    out.push((target, true));
                    out
                }
            }
        };

        for (task, is_editing) in notifications {
            info!(task_id = task.id.0, is_editing, "edit state changed");
            self.view.notify_edit_state(&task, is_editing);
        }
    }

    pub async fn edit_slot(&self) -> EditSlot {
        self.state.lock().await.edit
    }

    pub async fn editing_task(&self) -> Option<TaskId> {
        match self.state.lock().await.edit {
            EditSlot::Idle => None,
            EditSlot::Editing { task_id } => Some(task_id),
        }
    }

    /// Another task with case-insensitively equal text and the same due date.
    pub async fn has_duplicate(&self, text: &str, due_date: &str) -> bool {
        let needle = text.to_lowercase();
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .any(|task| task.text.to_lowercase() == needle && task.due_date == due_date)
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn next_id(&self) -> i64 {
        self.state.lock().await.next_id
    }

    pub async fn filter(&self) -> Filter {
        self.state.lock().await.filter
    }

    pub fn clear_form(&self) {
        self.view.clear_form();
    }

    async fn put_patch(&self, id: TaskId, patch: &TaskPatch) -> anyhow::Result<()> {
        self.http
            .put(self.todo_url(id))
            .json(patch)
            .send()
            .await
            .and_then(|response| response.error_for_status())?;
        Ok(())
    }
}

/// The listing endpoint answers with a JSON object mapping arbitrary keys to
/// tasks; bare arrays are tolerated for older backends.
fn decode_task_listing(body: serde_json::Value) -> anyhow::Result<Vec<Task>> {
    let entries = match body {
        serde_json::Value::Object(map) => map.into_iter().map(|(_, value)| value).collect(),
        serde_json::Value::Array(entries) => entries,
        other => anyhow::bail!("unexpected task listing shape: {other}"),
    };

    entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).map_err(Into::into))
        .collect()
}

#[cfg(test)]
#[path = "tests/harness.rs"]
mod test_harness;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod dispatcher_tests;
