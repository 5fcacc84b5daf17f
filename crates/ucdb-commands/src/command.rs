//! Command grammar.

use std::fmt;

use ucdb_core::{Address, TaskId, TaskSelector};

use crate::argv;
use crate::error::UsageError;

/// The user commands the extension registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    InfoClusters,
    InfoProcessors,
    Task,
    PrevTask,
    Reset,
}

impl CommandName {
    pub const ALL: [CommandName; 5] = [
        CommandName::InfoClusters,
        CommandName::InfoProcessors,
        CommandName::Task,
        CommandName::PrevTask,
        CommandName::Reset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::InfoClusters => "info clusters",
            CommandName::InfoProcessors => "info vprocessors",
            CommandName::Task => "task",
            CommandName::PrevTask => "prevtask",
            CommandName::Reset => "reset",
        }
    }

    /// One-line summary shown by `help`
    pub fn summary(self) -> &'static str {
        match self {
            CommandName::InfoClusters => "Print list of clusters",
            CommandName::InfoProcessors => {
                "Print virtual processors in a given cluster (default userCluster)"
            }
            CommandName::Task => "Print information and switch stacks for tasks",
            CommandName::PrevTask => "Switch back to previous task on the stack",
            CommandName::Reset => "Reset to the origin frame prior to continue execution again",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            CommandName::InfoClusters => {
                "
    info clusters                   : print list of clusters"
            }
            CommandName::InfoProcessors => {
                "
    info vprocessors                : print virtual processors in userCluster
    info vprocessors <clusterName>  : print virtual processors in cluster <clusterName>"
            }
            CommandName::Task => {
                "
    task                            : print tasks (ids) in userCluster, application tasks only
    task <clusterName>              : print tasks (ids) in clusterName, all tasks
    task all                        : print all clusters, all tasks
    task <id>                       : switch debugging stack to task id on userCluster
    task 0x<address>                : switch debugging stack to task 0x<address> on any cluster
    task \"<variable>\"               : switch debugging stack to the task <variable> points to
    task <id> <clusterName>         : switch debugging stack to task id on cluster clusterName"
            }
            CommandName::PrevTask => "prevtask",
            CommandName::Reset => "reset",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a `task` command names the task to switch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTarget {
    /// Id on the given cluster, or on the user cluster when absent
    Id { id: TaskId, cluster: Option<String> },
    Address(Address),
    Variable(String),
}

impl TaskTarget {
    pub fn into_selector(self, default_cluster: &str) -> TaskSelector {
        match self {
            TaskTarget::Id { id, cluster } => TaskSelector::ById {
                id,
                cluster: cluster.unwrap_or_else(|| default_cluster.to_string()),
            },
            TaskTarget::Address(address) => TaskSelector::ByAddress(address),
            TaskTarget::Variable(name) => TaskSelector::ByVariableName(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// User tasks of the user cluster
    ListUser,
    /// All tasks of one cluster
    ListCluster(String),
    /// All tasks of every cluster
    ListAll,
    Switch(TaskTarget),
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InfoClusters,
    InfoProcessors { cluster: Option<String> },
    Task(TaskCommand),
    PrevTask,
    Reset,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let words = argv::split(line)?;
        let Some((first, rest)) = words.split_first() else {
            return Err(UsageError::UnknownCommand(String::new()));
        };

        match (first.as_str(), rest) {
            ("info", [sub, args @ ..]) if sub == "clusters" => parse_info_clusters(args),
            ("info", [sub, args @ ..]) if sub == "vprocessors" => parse_info_processors(args),
            ("task", args) => parse_task(args).map(Command::Task),
            ("prevtask", args) => no_arguments(CommandName::PrevTask, args, Command::PrevTask),
            ("reset", args) => no_arguments(CommandName::Reset, args, Command::Reset),
            _ => Err(UsageError::UnknownCommand(words.join(" "))),
        }
    }

    pub fn name(&self) -> CommandName {
        match self {
            Command::InfoClusters => CommandName::InfoClusters,
            Command::InfoProcessors { .. } => CommandName::InfoProcessors,
            Command::Task(_) => CommandName::Task,
            Command::PrevTask => CommandName::PrevTask,
            Command::Reset => CommandName::Reset,
        }
    }
}

fn parse_info_clusters(args: &[String]) -> Result<Command, UsageError> {
    no_arguments(CommandName::InfoClusters, args, Command::InfoClusters)
}

fn parse_info_processors(args: &[String]) -> Result<Command, UsageError> {
    match args {
        [] => Ok(Command::InfoProcessors { cluster: None }),
        [cluster] => Ok(Command::InfoProcessors {
            cluster: Some(cluster.clone()),
        }),
        _ => Err(UsageError::bad_arguments(
            CommandName::InfoProcessors,
            "expected at most one cluster name",
        )),
    }
}

fn parse_task(args: &[String]) -> Result<TaskCommand, UsageError> {
    match args {
        [] => Ok(TaskCommand::ListUser),
        [word] => {
            if let Ok(id) = word.parse::<i64>() {
                return Ok(TaskCommand::Switch(TaskTarget::Id {
                    id: TaskId(id),
                    cluster: None,
                }));
            }
            if word.starts_with("0x") || word.starts_with("0X") {
                let address = Address::parse_hex(word).ok_or_else(|| {
                    UsageError::bad_arguments(CommandName::Task, format!("invalid address `{word}`"))
                })?;
                return Ok(TaskCommand::Switch(TaskTarget::Address(address)));
            }
            if let Some(name) = argv::unquote(word) {
                let name = name.trim();
                if name.is_empty() {
                    return Err(UsageError::bad_arguments(CommandName::Task, "empty variable name"));
                }
                return Ok(TaskCommand::Switch(TaskTarget::Variable(name.to_string())));
            }
            if word == "all" {
                return Ok(TaskCommand::ListAll);
            }
            Ok(TaskCommand::ListCluster(word.clone()))
        }
        [id, cluster] => {
            let id = id.parse::<i64>().map_err(|_| {
                UsageError::bad_arguments(CommandName::Task, format!("invalid task id `{id}`"))
            })?;
            Ok(TaskCommand::Switch(TaskTarget::Id {
                id: TaskId(id),
                cluster: Some(cluster.clone()),
            }))
        }
        _ => Err(UsageError::bad_arguments(CommandName::Task, "parse error")),
    }
}

fn no_arguments(name: CommandName, args: &[String], command: Command) -> Result<Command, UsageError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(UsageError::bad_arguments(name, "takes no arguments"))
    }
}
