use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

use shared::{
    domain::{Task, TaskId},
    protocol::TaskPatch,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Tasks in id order, which is also insertion order since ids are
    /// assigned monotonically by the client.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT id, text, due_date, completed FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Task {
                id: TaskId(row.get(0)),
                text: row.get(1),
                due_date: row.get(2),
                completed: row.get(3),
            })
            .collect())
    }

    pub async fn task_exists(&self, id: TaskId) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM tasks WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        sqlx::query("INSERT INTO tasks (id, text, due_date, completed) VALUES (?, ?, ?, ?)")
            .bind(task.id.0)
            .bind(&task.text)
            .bind(&task.due_date)
            .bind(task.completed)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Merges the present patch fields into the row. Returns false when no
    /// row carries the id.
    pub async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET
                 text = COALESCE(?, text),
                 due_date = COALESCE(?, due_date),
                 completed = COALESCE(?, completed)
             WHERE id = ?",
        )
        .bind(patch.text.as_deref())
        .bind(patch.due_date.as_deref())
        .bind(patch.completed)
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return Ok(());
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return Ok(());
    }

    let Some(parent) = Path::new(path).parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
