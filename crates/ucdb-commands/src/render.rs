//! Text rendering of listings and errors.

use ucdb_core::error::Entity;
use ucdb_core::{ClusterRow, ClusterTasks, Error, ProcessorRow, TaskRow};

pub fn cluster_line(name: &str, address: &str) -> String {
    format!("{name:>20}  {address:>20}")
}

pub fn processor_line(address: &str, pid: &str, preemption: &str, spin: &str) -> String {
    format!("{address:>18}{pid:>20}{preemption:>20}{spin:>20}")
}

pub fn task_line(id: &str, name: &str, address: &str, state: &str) -> String {
    format!("{id:>4}{name:>20}{address:>18}{state:>25}")
}

fn cluster_heading(name: &str, address: &str) -> String {
    format!("{name:>20}{address:>18}")
}

pub fn clusters(rows: &[ClusterRow]) -> Vec<String> {
    let mut lines = vec![cluster_line("Name", "Address")];
    lines.extend(rows.iter().map(|row| cluster_line(&row.name, &row.address.to_string())));
    lines
}

pub fn processors(rows: &[ProcessorRow]) -> Vec<String> {
    let mut lines = vec![processor_line("Address", "PID", "Preemption", "Spin")];
    lines.extend(rows.iter().map(|row| {
        processor_line(
            &row.address.to_string(),
            &row.os_id.to_string(),
            &row.preemption.to_string(),
            &row.spin.to_string(),
        )
    }));
    lines
}

/// Task table; `state_prefix` qualifies enumerator names the way the
/// debugger prints them (`uBaseTask::Blocked`).
pub fn tasks(rows: &[TaskRow], state_prefix: &str) -> Vec<String> {
    let mut lines = vec![task_line("ID", "Task Name", "Address", "State")];
    lines.extend(rows.iter().map(|row| {
        let id = if row.current {
            format!("* {}", row.id)
        } else {
            row.id.to_string()
        };
        task_line(
            &id,
            &row.name,
            &row.address.to_string(),
            &format!("{state_prefix}::{}", row.state),
        )
    }));
    lines
}

/// Every cluster heading followed by its task table.
pub fn all_tasks(listing: &[ClusterTasks], state_prefix: &str) -> Vec<String> {
    let mut lines = vec![cluster_heading("Cluster Name", "Address")];
    for entry in listing {
        lines.push(cluster_heading(&entry.cluster.name, &entry.cluster.address.to_string()));
        if entry.tasks.is_empty() {
            lines.push(no_tasks(&entry.cluster.address.to_string()));
        } else {
            lines.extend(tasks(&entry.tasks, state_prefix));
        }
    }
    lines
}

pub fn no_processors(cluster: &str) -> String {
    format!("There are no processors for cluster at address: {cluster}")
}

pub fn no_tasks(cluster: &str) -> String {
    format!("There are no tasks for cluster at address: {cluster}")
}

pub fn usage(text: &str) -> String {
    format!("Usage: {text}")
}

/// The single line shown for a failed operation.
pub fn error(err: &Error) -> String {
    match err {
        Error::RuntimeNotInitialized => "No clusters, program terminated".to_string(),
        Error::EntityNotFound {
            entity: Entity::Cluster,
            key,
        } => format!("Cannot find a cluster with {key}."),
        Error::EntityNotFound {
            entity: Entity::Task,
            key,
        } => format!("Cannot find task {key}"),
        Error::InvalidSelector(reason) => format!("Invalid task selector: {reason}"),
        Error::UnsupportedContext(_) => "Not a supported command for this language".to_string(),
        Error::SwitchPrimitiveUnavailable { symbol } => format!("{symbol} symbol is unavailable"),
        Error::InvalidState { .. } => "Cannot switch to a terminated thread".to_string(),
        Error::EmptyHistory => "empty stack".to_string(),
        other => capitalize(&other.to_string()),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
