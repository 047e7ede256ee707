//! Console rendering collaborator.

use client_core::TaskView;
use shared::domain::Task;

pub struct ConsoleView;

impl TaskView for ConsoleView {
    fn render_visible(&self, tasks: &[Task]) {
        if tasks.is_empty() {
            println!("  (no tasks)");
            return;
        }
        for task in tasks {
            let marker = if task.completed { "x" } else { " " };
            println!(
                "  [{marker}] {:>3}  {}  (due {})",
                task.id.0, task.text, task.due_date
            );
        }
    }

    fn clear_form(&self) {
        // Nothing to clear on a line-based console; the prompt is the form.
    }

    fn notify_edit_state(&self, task: &Task, is_editing: bool) {
        if is_editing {
            println!(
                "  editing task {} ('{}'); the next 'add' updates it",
                task.id.0, task.text
            );
        } else {
            println!("  stopped editing task {}", task.id.0);
        }
    }
}
