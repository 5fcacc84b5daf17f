//! Command execution against an [`Inspector`].

use tracing::{debug, info, warn};

use ucdb_core::{Address, DebuggerHost, Error, HostResult, Inspector, Result, TaskRow};

use crate::command::{Command, CommandName, TaskCommand};
use crate::error::UsageError;
use crate::render;

/// The registered command set: parses lines, runs them and renders the
/// outcome as text lines.
pub struct Console<H> {
    inspector: Inspector<H>,
}

impl<H: DebuggerHost> Console<H> {
    pub fn new(inspector: Inspector<H>) -> Self {
        Self { inspector }
    }

    pub fn inspector(&self) -> &Inspector<H> {
        &self.inspector
    }

    pub fn inspector_mut(&mut self) -> &mut Inspector<H> {
        &mut self.inspector
    }

    pub fn into_inspector(self) -> Inspector<H> {
        self.inspector
    }

    /// Tell the debugger to let the runtime's internal signals through
    /// without stopping.
    pub fn install(&mut self) -> HostResult<()> {
        let signals = self.inspector.layout().pass_signals.clone();
        for signal in &signals {
            let command = format!("handle {signal} nostop noprint pass");
            self.inspector.host_mut().execute_subcommand(&command)?;
        }
        info!(signals = ?signals, "commands installed");
        Ok(())
    }

    /// Run one command line and return what it prints.
    pub fn execute(&mut self, line: &str) -> Vec<String> {
        match Command::parse(line) {
            Ok(command) => {
                debug!(?command, "dispatch");
                self.run(command)
            }
            Err(err) => usage_lines(&err),
        }
    }

    /// Run a parsed command.
    pub fn run(&mut self, command: Command) -> Vec<String> {
        let name = command.name();
        let result = match command {
            Command::InfoClusters => self.info_clusters(),
            Command::InfoProcessors { cluster } => self.info_processors(cluster),
            Command::Task(task) => self.task(task),
            Command::PrevTask => self.prev_task(),
            Command::Reset => self.reset(),
        };

        match result {
            Ok(lines) => lines,
            Err(Error::EmptyHistory) if name == CommandName::Reset => Vec::new(),
            Err(err) => {
                warn!(command = %name, error = %err, "command failed");
                vec![render::error(&err)]
            }
        }
    }

    fn info_clusters(&mut self) -> Result<Vec<String>> {
        let rows = self.inspector.list_clusters()?;
        Ok(render::clusters(&rows))
    }

    fn info_processors(&mut self, cluster: Option<String>) -> Result<Vec<String>> {
        let cluster = cluster.unwrap_or_else(|| self.inspector.layout().clusters.user.clone());
        let rows = self.inspector.list_processors(&cluster)?;
        if rows.is_empty() {
            let address = self.cluster_address(&cluster)?;
            return Ok(vec![render::no_processors(&address.to_string())]);
        }
        Ok(render::processors(&rows))
    }

    fn task(&mut self, command: TaskCommand) -> Result<Vec<String>> {
        match command {
            TaskCommand::ListUser => {
                let cluster = self.inspector.layout().clusters.user.clone();
                let rows = self.inspector.list_tasks(&cluster, false)?;
                self.task_table(&cluster, &rows)
            }
            TaskCommand::ListCluster(cluster) => {
                let rows = self.inspector.list_tasks(&cluster, true)?;
                self.task_table(&cluster, &rows)
            }
            TaskCommand::ListAll => {
                let listing = self.inspector.list_all_tasks()?;
                Ok(render::all_tasks(&listing, &self.inspector.layout().types.task))
            }
            TaskCommand::Switch(target) => {
                let selector = target.into_selector(&self.inspector.layout().clusters.user);
                let outcome = self.inspector.switch_to(&selector)?;
                debug!(task = %outcome.task, depth = outcome.depth, "switched");
                Ok(self.frame_line())
            }
        }
    }

    fn prev_task(&mut self) -> Result<Vec<String>> {
        self.inspector.revert_last_switch()?;
        Ok(self.frame_line())
    }

    fn reset(&mut self) -> Result<Vec<String>> {
        self.inspector.reset_to_baseline()?;
        Ok(self.frame_line())
    }

    fn task_table(&mut self, cluster: &str, rows: &[TaskRow]) -> Result<Vec<String>> {
        if rows.is_empty() {
            let address = self.cluster_address(cluster)?;
            return Ok(vec![render::no_tasks(&address.to_string())]);
        }
        Ok(render::tasks(rows, &self.inspector.layout().types.task))
    }

    fn cluster_address(&mut self, name: &str) -> Result<Address> {
        self.inspector
            .list_clusters()?
            .into_iter()
            .find(|row| row.name == name)
            .map(|row| row.address)
            .ok_or_else(|| Error::cluster_not_found(name))
    }

    /// The debugger's own description of the newly selected frame.
    fn frame_line(&mut self) -> Vec<String> {
        match self.inspector.host_mut().execute_subcommand("frame") {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(err) => {
                warn!(error = %err, "cannot describe selected frame");
                Vec::new()
            }
        }
    }
}

fn usage_lines(err: &UsageError) -> Vec<String> {
    match err.command() {
        Some(command) => {
            let mut lines = Vec::new();
            if let UsageError::BadArguments { reason, .. } = err {
                lines.push(reason.clone());
            }
            lines.extend(render::usage(command.usage()).lines().map(|l| l.trim_end().to_string()));
            lines
        }
        None => vec![err.to_string()],
    }
}
