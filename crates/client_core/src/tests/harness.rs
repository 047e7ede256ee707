//! In-process fake of the remote todos API plus a recording view, shared by
//! the store and dispatcher tests.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use tokio::net::TcpListener;

use shared::{
    domain::{Task, TaskId},
    protocol::TaskPatch,
};

use crate::{TaskStore, TaskView};

#[derive(Clone, Default)]
pub struct RemoteState {
    tasks: Arc<Mutex<BTreeMap<i64, Task>>>,
    requests: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
}

impl RemoteState {
    pub fn seeded(tasks: &[Task]) -> Self {
        let state = Self::default();
        {
            let mut guard = state.tasks.lock().expect("lock");
            for task in tasks {
                guard.insert(task.id.0, task.clone());
            }
        }
        state
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn failing(&self) -> bool {
        self.fail.load(Ordering::SeqCst)
    }

    fn record(&self, method: &str, path: String) {
        self.requests
            .lock()
            .expect("lock")
            .push(format!("{method} {path}"));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn task(&self, id: i64) -> Option<Task> {
        self.tasks.lock().expect("lock").get(&id).cloned()
    }
}

async fn remote_list(State(state): State<RemoteState>) -> Response {
    state.record("GET", "/todos".to_string());
    if state.failing() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let keyed: BTreeMap<String, Task> = state
        .tasks
        .lock()
        .expect("lock")
        .iter()
        .map(|(id, task)| (id.to_string(), task.clone()))
        .collect();
    Json(keyed).into_response()
}

async fn remote_create(
    State(state): State<RemoteState>,
    Path(id): Path<i64>,
    Json(task): Json<Task>,
) -> Response {
    state.record("POST", format!("/todos/{id}"));
    if state.failing() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    state.tasks.lock().expect("lock").insert(id, task);
    StatusCode::CREATED.into_response()
}

async fn remote_update(
    State(state): State<RemoteState>,
    Path(id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> Response {
    state.record("PUT", format!("/todos/{id}"));
    if state.failing() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let mut tasks = state.tasks.lock().expect("lock");
    match tasks.get_mut(&id) {
        Some(task) => {
            patch.apply_to(task);
            StatusCode::OK.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn remote_delete(State(state): State<RemoteState>, Path(id): Path<i64>) -> Response {
    state.record("DELETE", format!("/todos/{id}"));
    if state.failing() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match state.tasks.lock().expect("lock").remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn spawn_remote(state: RemoteState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/todos", get(remote_list))
        .route("/todos/:id", post(remote_create))
        .route("/todos/:id", put(remote_update))
        .route("/todos/:id", delete(remote_delete))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[derive(Default)]
pub struct RecordingView {
    renders: Mutex<Vec<Vec<Task>>>,
    cleared: AtomicUsize,
    edit_events: Mutex<Vec<(i64, bool)>>,
}

impl RecordingView {
    pub fn last_render(&self) -> Option<Vec<Task>> {
        self.renders.lock().expect("lock").last().cloned()
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().expect("lock").len()
    }

    pub fn cleared_count(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }

    pub fn edit_events(&self) -> Vec<(i64, bool)> {
        self.edit_events.lock().expect("lock").clone()
    }
}

impl TaskView for RecordingView {
    fn render_visible(&self, tasks: &[Task]) {
        self.renders.lock().expect("lock").push(tasks.to_vec());
    }

    fn clear_form(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_edit_state(&self, task: &Task, is_editing: bool) {
        self.edit_events
            .lock()
            .expect("lock")
            .push((task.id.0, is_editing));
    }
}

pub fn sample_task(id: i64, text: &str, due_date: &str, completed: bool) -> Task {
    Task {
        id: TaskId(id),
        text: text.to_string(),
        due_date: due_date.to_string(),
        completed,
    }
}

pub async fn store_with_remote(
    seed: &[Task],
) -> (Arc<TaskStore>, Arc<RecordingView>, RemoteState) {
    let remote = RemoteState::seeded(seed);
    let server_url = spawn_remote(remote.clone()).await;
    let view = Arc::new(RecordingView::default());
    let store = TaskStore::new(server_url, view.clone());
    (store, view, remote)
}
