//! Queries over the runtime's scheduler topology.
//!
//! Clusters hang off a global circular list; each cluster embeds one list of
//! virtual processors and one of tasks. All queries here are read-only.

use tracing::{debug, warn};

use crate::classify::{IdAssigner, TaskClass};
use crate::error::{Entity, Error, ListKind, Result};
use crate::host::{DebuggerHost, HostError, Location};
use crate::layout::RuntimeLayout;
use crate::resolver::RuntimeTypes;
use crate::types::{Address, ClusterRow, ProcessorRow, TaskId, TaskRow, TaskState};
use crate::walker::{self, NodeKind, Ring};

/// A cluster found by a traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub name: String,
    pub location: Location,
}

impl ClusterRef {
    pub fn row(&self) -> ClusterRow {
        ClusterRow {
            name: self.name.clone(),
            address: self.location.address,
        }
    }
}

/// A task found by a traversal, with the id the traversal gave it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    pub location: Location,
}

/// Read access to the scheduler structures of one runtime layout
pub struct Topology<'a, H> {
    host: &'a mut H,
    layout: &'a RuntimeLayout,
    types: RuntimeTypes,
}

impl<'a, H: DebuggerHost> Topology<'a, H> {
    /// Resolve the runtime's types; fails with `UnsupportedContext` when the
    /// program carries none.
    pub fn new(host: &'a mut H, layout: &'a RuntimeLayout) -> Result<Self> {
        let types = RuntimeTypes::resolve(host, layout)?;
        Ok(Self {
            host,
            layout,
            types,
        })
    }

    pub fn types(&self) -> &RuntimeTypes {
        &self.types
    }

    pub fn host(&mut self) -> &mut H {
        self.host
    }

    /// First node of the global cluster list.
    pub fn cluster_root(&mut self) -> Result<Address> {
        let root = self.host.evaluate_expression(&self.layout.cluster_root)?;
        let address = self.host.read_address(&root)?;
        if address.is_null() {
            debug!("cluster list root is null");
            return Err(Error::RuntimeNotInitialized);
        }
        Ok(address)
    }

    /// All clusters, in list order.
    pub fn clusters(&mut self) -> Result<Vec<ClusterRef>> {
        let layout = self.layout;
        let root = self.cluster_root()?;
        let nodes = walker::walk(self.host, cluster_kind(&self.types, layout), root)?;

        let mut clusters = Vec::with_capacity(nodes.len());
        for node in nodes {
            clusters.push(ClusterRef {
                name: cluster_name(self.host, layout, &node.payload)?,
                location: node.payload,
            });
        }
        debug!(count = clusters.len(), "clusters enumerated");
        Ok(clusters)
    }

    /// Cluster called `name`.
    pub fn find_cluster(&mut self, name: &str) -> Result<ClusterRef> {
        let layout = self.layout;
        let root = self.cluster_root()?;
        let kind = cluster_kind(&self.types, layout);

        let node = walker::find(self.host, kind, root, |host, node| {
            Ok(cluster_name(host, layout, &node.payload)? == name)
        })?;

        match node {
            Some(node) => Ok(ClusterRef {
                name: name.to_string(),
                location: node.payload,
            }),
            None => Err(Error::cluster_not_found(name)),
        }
    }

    /// View `address` as a cluster without checking it is on the global list.
    pub fn cluster_at(&mut self, address: Address) -> Result<ClusterRef> {
        let location = Location::new(address, self.types.cluster.clone());
        let name = cluster_name(self.host, self.layout, &location)?;
        Ok(ClusterRef { name, location })
    }

    /// Virtual processors of `cluster`, in list order. Empty when the cluster
    /// has none.
    pub fn processors(&mut self, cluster: &ClusterRef) -> Result<Vec<ProcessorRow>> {
        let layout = self.layout;
        let fields = &layout.fields;
        let root = embedded_root(self.host, layout, &cluster.location, &fields.cluster_processors)?;
        let kind = NodeKind {
            list: ListKind::Processors,
            node_ty: &self.types.processor_node,
            payload_ty: &self.types.processor,
            payload_field: &fields.node_processor,
            next_field: &fields.next,
        };
        let nodes = walker::walk(self.host, kind, root)?;

        let mut rows = Vec::with_capacity(nodes.len());
        for node in nodes {
            let processor = &node.payload;
            let pid = self.host.member(processor, &fields.processor_pid)?;
            let preemption = self.host.member(processor, &fields.processor_preemption)?;
            let spin = self.host.member(processor, &fields.processor_spin)?;
            rows.push(ProcessorRow {
                address: processor.address,
                os_id: self.host.read_integer(&pid)?,
                preemption: read_unsigned(self.host, &preemption)?,
                spin: read_unsigned(self.host, &spin)?,
            });
        }
        debug!(cluster = %cluster.name, count = rows.len(), "processors enumerated");
        Ok(rows)
    }

    /// Tasks of `cluster` numbered in list order. Empty when the cluster
    /// has none.
    pub fn tasks(&mut self, cluster: &ClusterRef) -> Result<Vec<TaskRef>> {
        let layout = self.layout;
        let root = embedded_root(self.host, layout, &cluster.location, &layout.fields.cluster_tasks)?;
        let mut ring = Ring::new(task_kind(&self.types, layout), root);
        let mut ids = IdAssigner::new();
        let mut tasks = Vec::new();

        while let Some(node) = ring.advance(self.host)? {
            let name = task_name(self.host, layout, &node.payload)?;
            let state = task_state(self.host, layout, &node.payload)?;
            tasks.push(TaskRef {
                id: ids.assign(TaskClass::of(&name)),
                name,
                state,
                location: node.payload,
            });
        }
        debug!(
            cluster = %cluster.name,
            user = ids.user_count(),
            system = ids.system_count(),
            "tasks enumerated"
        );
        Ok(tasks)
    }

    /// Task numbered `id` in `cluster`.
    ///
    /// Runs the same single numbering traversal as [`Topology::tasks`] and
    /// stops at the first task whose running count reaches `id`.
    pub fn task_by_id(&mut self, cluster: &ClusterRef, id: TaskId) -> Result<TaskRef> {
        let layout = self.layout;
        if !id.is_system() && cluster.name == layout.clusters.system {
            return Err(Error::InvalidSelector(format!(
                "{} does not have ID >= 0",
                layout.clusters.system
            )));
        }

        let root = embedded_root(self.host, layout, &cluster.location, &layout.fields.cluster_tasks)?;
        let wanted = TaskClass::of_id(id);
        let mut ring = Ring::new(task_kind(&self.types, layout), root);
        let mut ids = IdAssigner::new();

        while let Some(node) = ring.advance(self.host)? {
            let name = task_name(self.host, layout, &node.payload)?;
            if ids.assign(TaskClass::of(&name)) == id {
                let state = task_state(self.host, layout, &node.payload)?;
                return Ok(TaskRef {
                    id,
                    name,
                    state,
                    location: node.payload,
                });
            }
        }

        let available = match wanted {
            TaskClass::User => ids.user_count(),
            TaskClass::System => ids.system_count(),
        };
        Err(Error::EntityNotFound {
            entity: Entity::Task,
            key: format!("ID: {id}. Only have {available} tasks"),
        })
    }

    /// Read a task's name and state given its address.
    pub fn task_at(&mut self, address: Address) -> Result<(String, TaskState)> {
        let location = Location::new(address, self.types.task.clone());
        Ok((
            task_name(self.host, self.layout, &location)?,
            task_state(self.host, self.layout, &location)?,
        ))
    }

    /// Saved `(SP, FP)` of a suspended task.
    pub fn saved_context(&mut self, task: &Location) -> Result<(Address, Address)> {
        let fields = &self.layout.fields;
        let context_ptr = self.host.member(task, &fields.task_context)?;
        let context = Location::new(
            self.host.read_address(&context_ptr)?,
            self.types.context.clone(),
        );
        let sp = self.host.member(&context, &fields.context_sp)?;
        let fp = self.host.member(&context, &fields.context_fp)?;
        Ok((self.host.read_address(&sp)?, self.host.read_address(&fp)?))
    }

    /// Address of the task the debugger is currently stopped in, recovered
    /// from the `this` argument of the outermost user frame of a backtrace.
    pub fn current_task(&mut self) -> Option<Address> {
        let backtrace = match self.host.execute_subcommand("bt") {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "cannot read backtrace");
                return None;
            }
        };
        let task = parse_task_frame(&backtrace);
        if task.is_none() {
            warn!("cannot locate current breakpoint");
        }
        task
    }

    /// Rows for `tasks`, marking the one the debugger is stopped in.
    pub fn task_rows(&mut self, tasks: Vec<TaskRef>, include_system: bool) -> Vec<TaskRow> {
        let current = self.current_task();
        tasks
            .into_iter()
            .filter(|task| include_system || !task.id.is_system())
            .map(|task| TaskRow {
                current: Some(task.location.address) == current,
                id: task.id,
                name: task.name,
                address: task.location.address,
                state: task.state,
            })
            .collect()
    }
}

fn embedded_root<H: DebuggerHost>(
    host: &mut H,
    layout: &RuntimeLayout,
    owner: &Location,
    seq_field: &str,
) -> Result<Address> {
    let seq = host.member(owner, seq_field)?;
    let root = host.member(&seq, &layout.fields.seq_root)?;
    Ok(host.read_address(&root)?)
}

fn cluster_name<H: DebuggerHost>(
    host: &mut H,
    layout: &RuntimeLayout,
    cluster: &Location,
) -> Result<String> {
    let name = host.member(cluster, &layout.fields.cluster_name)?;
    Ok(host.read_string(&name)?)
}

fn task_name<H: DebuggerHost>(host: &mut H, layout: &RuntimeLayout, task: &Location) -> Result<String> {
    let name = host.member(task, &layout.fields.task_name)?;
    Ok(host.read_string(&name)?)
}

fn task_state<H: DebuggerHost>(
    host: &mut H,
    layout: &RuntimeLayout,
    task: &Location,
) -> Result<TaskState> {
    let state = host.member(task, &layout.fields.task_state)?;
    let enumerator = host.read_enumerator(&state)?;
    enumerator.parse().map_err(|reason| {
        Error::Host(HostError::UnexpectedValue {
            address: state.address,
            reason,
        })
    })
}

fn read_unsigned<H: DebuggerHost>(host: &mut H, value: &Location) -> Result<u64> {
    let raw = host.read_integer(value)?;
    u64::try_from(raw).map_err(|_| {
        Error::Host(HostError::UnexpectedValue {
            address: value.address,
            reason: format!("expected an unsigned value, found {raw}"),
        })
    })
}

fn cluster_kind<'a>(types: &'a RuntimeTypes, layout: &'a RuntimeLayout) -> NodeKind<'a> {
    NodeKind {
        list: ListKind::Clusters,
        node_ty: &types.cluster_node,
        payload_ty: &types.cluster,
        payload_field: &layout.fields.node_cluster,
        next_field: &layout.fields.next,
    }
}

fn task_kind<'a>(types: &'a RuntimeTypes, layout: &'a RuntimeLayout) -> NodeKind<'a> {
    NodeKind {
        list: ListKind::Tasks,
        node_ty: &types.task_node,
        payload_ty: &types.task,
        payload_field: &layout.fields.node_task,
        next_field: &layout.fields.next,
    }
}

/// Pull the task pointer out of a gdb backtrace.
///
/// A task's stack bottoms out in `uMachContext::invokeTask` and a null frame,
/// so the task's own `main` is the third line from the end:
///
/// ```text
/// #1  0x000055555557745f in uMain::main (this=0x7fffffffe3e0) at driver.cc:86
/// #2  0x000055555557ffa6 in UPP::uMachContext::invokeTask (This=...) at uMachContext.cc:130
/// #3  0x0000000000000000 in ?? ()
/// ```
pub fn parse_task_frame(backtrace: &str) -> Option<Address> {
    let lines: Vec<&str> = backtrace.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 3 {
        return None;
    }
    let frame = lines[lines.len() - 3];
    let (_, rest) = frame.split_once("this=")?;
    let end = rest.find([',', ')']).unwrap_or(rest.len());
    Address::parse_hex(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::snapshot::{ImageBuilder, SnapshotHost};

    fn scenario_host() -> (SnapshotHost, RuntimeLayout) {
        let layout = RuntimeLayout::default();
        let image = ImageBuilder::new()
            .cluster("userCluster", |c| {
                c.processor(4101, 10, 1000)
                    .processor(4102, 0, 0)
                    .task("mainTask", TaskState::Running)
                    .task("uProcessorTask", TaskState::Blocked)
                    .task("workerA", TaskState::Ready);
            })
            .cluster("systemCluster", |c| {
                c.processor(4100, 0, 1000)
                    .task("uSystemTask", TaskState::Blocked)
                    .task("uProcessorTask", TaskState::Blocked);
            })
            .build();
        (SnapshotHost::new(image, &layout), layout)
    }

    #[test]
    fn test_clusters_in_list_order() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();

        let names: Vec<String> = topo.clusters().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["userCluster", "systemCluster"]);
    }

    #[test]
    fn test_uninitialized_runtime() {
        let layout = RuntimeLayout::default();
        let mut host = SnapshotHost::new(ImageBuilder::new().uninitialized().build(), &layout);
        let mut topo = Topology::new(&mut host, &layout).unwrap();

        assert_eq!(topo.clusters().unwrap_err().kind(), ErrorKind::RuntimeNotInitialized);
        assert_eq!(
            topo.find_cluster("userCluster").unwrap_err().kind(),
            ErrorKind::RuntimeNotInitialized
        );
    }

    #[test]
    fn test_unknown_cluster() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();

        let err = topo.find_cluster("ioCluster").unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { entity: Entity::Cluster, .. }));
    }

    #[test]
    fn test_processors_rows() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();

        let cluster = topo.find_cluster("userCluster").unwrap();
        let rows = topo.processors(&cluster).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].os_id, 4101);
        assert!(rows[0].preemption_enabled());
        assert!(rows[0].spins());
        assert!(!rows[1].preemption_enabled());
        assert!(!rows[1].spins());
    }

    #[test]
    fn test_task_numbering_matches_reverse_lookup() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();
        let cluster = topo.find_cluster("userCluster").unwrap();

        let tasks = topo.tasks(&cluster).unwrap();
        let ids: Vec<(i64, &str)> = tasks.iter().map(|t| (t.id.0, t.name.as_str())).collect();
        assert_eq!(ids, vec![(0, "mainTask"), (-1, "uProcessorTask"), (1, "workerA")]);

        for task in &tasks {
            let found = topo.task_by_id(&cluster, task.id).unwrap();
            assert_eq!(&found, task);
        }
    }

    #[test]
    fn test_task_id_out_of_range() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();
        let cluster = topo.find_cluster("userCluster").unwrap();

        let err = topo.task_by_id(&cluster, TaskId(2)).unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { entity: Entity::Task, ref key } if key.contains("Only have 2")));
        let err = topo.task_by_id(&cluster, TaskId(-2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntityNotFound);
    }

    #[test]
    fn test_non_negative_id_on_system_cluster_is_rejected() {
        let (mut host, layout) = scenario_host();
        let mut topo = Topology::new(&mut host, &layout).unwrap();
        let cluster = topo.find_cluster("systemCluster").unwrap();

        let err = topo.task_by_id(&cluster, TaskId(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSelector);
        let task = topo.task_by_id(&cluster, TaskId(-2)).unwrap();
        assert_eq!(task.name, "uProcessorTask");
    }

    #[test]
    fn test_cluster_without_tasks_or_processors() {
        let layout = RuntimeLayout::default();
        let image = ImageBuilder::new().cluster("userCluster", |_| {}).build();
        let mut host = SnapshotHost::new(image, &layout);
        let mut topo = Topology::new(&mut host, &layout).unwrap();
        let cluster = topo.find_cluster("userCluster").unwrap();

        assert!(topo.processors(&cluster).unwrap().is_empty());
        assert!(topo.tasks(&cluster).unwrap().is_empty());
    }

    #[test]
    fn test_parse_task_frame() {
        let bt = "\
#0  Worker::main (this=0x55555576ae70) at driver.cc:42
#1  0x000055555557ffa6 in UPP::uMachContext::invokeTask (This=...) at uMachContext.cc:130
#2  0x0000000000000000 in ?? ()
";
        assert_eq!(parse_task_frame(bt), Some(Address(0x5555_5576_ae70)));

        let with_args = "#0 f (this=0x10, n=3) at a.cc:1\n#1 g ()\n#2 ?? ()\n";
        assert_eq!(parse_task_frame(with_args), Some(Address(0x10)));

        assert_eq!(parse_task_frame("#0 main () at a.cc:1\n"), None);
        assert_eq!(parse_task_frame("#0 a ()\n#1 b ()\n#2 c ()\n"), None);
    }

    #[test]
    fn test_current_task_is_marked() {
        let (mut host, layout) = scenario_host();
        host.set_current_task("userCluster", "workerA").unwrap();
        let mut topo = Topology::new(&mut host, &layout).unwrap();
        let cluster = topo.find_cluster("userCluster").unwrap();

        let tasks = topo.tasks(&cluster).unwrap();
        let rows = topo.task_rows(tasks, false);
        let current: Vec<&str> = rows.iter().filter(|r| r.current).map(|r| r.name.as_str()).collect();
        assert_eq!(current, vec!["workerA"]);
        assert_eq!(rows.len(), 2);
    }
}
