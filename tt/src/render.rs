//! Terminal rendering of task trees

use colored::{ColoredString, Colorize};

use crate::domain::{ChatRole, TaskNode, TaskStatus};

fn status_chip(status: TaskStatus) -> ColoredString {
    let label = format!("[{}]", status.as_str());
    match status {
        TaskStatus::Todo => label.yellow(),
        TaskStatus::InProgress => label.cyan(),
        TaskStatus::Done => label.green(),
    }
}

fn node_line(node: &TaskNode) -> String {
    let mut line = format!("{} {} {}", status_chip(node.task.status), node.task.name.bold(), node.task.id.dimmed());
    if node.has_subtasks() {
        let (done, total) = node.progress();
        line.push_str(&format!(" ({}/{})", done, total));
    }
    line
}

/// Render a forest with box-drawing branches, one task per line
pub fn render_forest(roots: &[TaskNode]) -> String {
    let mut out = String::new();
    // (node, prefix for its children, branch marker)
    let mut stack: Vec<(&TaskNode, String, &str)> = roots.iter().rev().map(|r| (r, String::new(), "")).collect();

    while let Some((node, prefix, marker)) = stack.pop() {
        out.push_str(&prefix);
        out.push_str(marker);
        out.push_str(&node_line(node));
        out.push('\n');

        let child_prefix = match marker {
            "├── " => format!("{}│   ", prefix),
            "└── " => format!("{}    ", prefix),
            _ => prefix.clone(),
        };
        let last = node.subtasks.len().saturating_sub(1);
        for (i, child) in node.subtasks.iter().enumerate().rev() {
            let marker = if i == last { "└── " } else { "├── " };
            stack.push((child, child_prefix.clone(), marker));
        }
    }
    out
}

/// Render one task in full: fields, result, history and subtree
pub fn render_detail(node: &TaskNode) -> String {
    let task = &node.task;
    let mut out = format!("{} {}\n", status_chip(task.status), task.name.bold());
    out.push_str(&format!("  id:       {}\n", task.id));
    if let Some(parent) = &task.parent_id {
        out.push_str(&format!("  parent:   {}\n", parent));
    }
    if let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("  details:  {}\n", description.trim()));
    }
    if let Some(assignee) = &task.assignee {
        out.push_str(&format!("  assignee: {}\n", assignee));
    }
    if let Some(result) = &task.execution_result {
        out.push_str(&format!("\n{}\n{}\n", "Result".underline(), result));
    }
    if !task.chat_history.is_empty() {
        out.push_str(&format!("\n{}\n", "Chat".underline()));
        for message in &task.chat_history {
            let who = match message.role {
                ChatRole::User => "user".blue(),
                ChatRole::System => "model".magenta(),
            };
            out.push_str(&format!("{}: {}\n", who, message.content));
        }
    }
    if node.has_subtasks() {
        out.push_str(&format!("\n{}\n", "Subtasks".underline()));
        out.push_str(&render_forest(&node.subtasks));
    }
    out
}
