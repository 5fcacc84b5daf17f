//! The inspection façade the command layer drives.

use tracing::{debug, instrument};

use crate::error::Result;
use crate::host::DebuggerHost;
use crate::layout::RuntimeLayout;
use crate::switch::{self, RevertOutcome, SwitchHistory, SwitchOutcome, TaskSelector};
use crate::topology::Topology;
use crate::types::{Address, ClusterRow, ClusterTasks, ProcessorRow, TaskRow};

/// Lists scheduler entities and switches the debugger between task stacks.
///
/// Owns the host session and the switch history for its lifetime. Each call
/// resolves the runtime types afresh, so nothing read from the inferior is
/// cached between calls.
pub struct Inspector<H> {
    host: H,
    layout: RuntimeLayout,
    history: SwitchHistory,
}

impl<H: DebuggerHost> Inspector<H> {
    pub fn new(host: H, layout: RuntimeLayout) -> Self {
        Self::with_history(host, layout, SwitchHistory::new())
    }

    /// Start from an existing history.
    pub fn with_history(host: H, layout: RuntimeLayout, history: SwitchHistory) -> Self {
        Self {
            host,
            layout,
            history,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    pub fn history(&self) -> &SwitchHistory {
        &self.history
    }

    fn topology(&mut self) -> Result<Topology<'_, H>> {
        Topology::new(&mut self.host, &self.layout)
    }

    /// Every cluster, in list order.
    #[instrument(skip(self))]
    pub fn list_clusters(&mut self) -> Result<Vec<ClusterRow>> {
        let clusters = self.topology()?.clusters()?;
        Ok(clusters.iter().map(|c| c.row()).collect())
    }

    /// Virtual processors of the cluster called `cluster`.
    #[instrument(skip(self))]
    pub fn list_processors(&mut self, cluster: &str) -> Result<Vec<ProcessorRow>> {
        let mut topo = self.topology()?;
        let cluster = topo.find_cluster(cluster)?;
        topo.processors(&cluster)
    }

    /// Tasks of the cluster called `cluster`, numbered. System tasks are
    /// left out unless `include_system` is set.
    #[instrument(skip(self))]
    pub fn list_tasks(&mut self, cluster: &str, include_system: bool) -> Result<Vec<TaskRow>> {
        let mut topo = self.topology()?;
        let cluster = topo.find_cluster(cluster)?;
        let tasks = topo.tasks(&cluster)?;
        Ok(topo.task_rows(tasks, include_system))
    }

    /// Like [`Inspector::list_tasks`], for the cluster record at `address`.
    #[instrument(skip(self))]
    pub fn list_tasks_at(&mut self, address: Address, include_system: bool) -> Result<Vec<TaskRow>> {
        let mut topo = self.topology()?;
        let cluster = topo.cluster_at(address)?;
        let tasks = topo.tasks(&cluster)?;
        Ok(topo.task_rows(tasks, include_system))
    }

    /// Every cluster with all of its tasks.
    #[instrument(skip(self))]
    pub fn list_all_tasks(&mut self) -> Result<Vec<ClusterTasks>> {
        let mut topo = self.topology()?;
        let clusters = topo.clusters()?;

        let mut listing = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let tasks = topo.tasks(&cluster)?;
            listing.push(ClusterTasks {
                cluster: cluster.row(),
                tasks: topo.task_rows(tasks, true),
            });
        }
        debug!(clusters = listing.len(), "all tasks listed");
        Ok(listing)
    }

    /// Point the debugger at the stack of the selected task.
    #[instrument(skip(self), fields(selector = %selector))]
    pub fn switch_to(&mut self, selector: &TaskSelector) -> Result<SwitchOutcome> {
        switch::switch_to(&mut self.host, &self.layout, &mut self.history, selector)
    }

    /// Undo the most recent switch.
    #[instrument(skip(self), fields(depth = self.history.depth()))]
    pub fn revert_last_switch(&mut self) -> Result<RevertOutcome> {
        switch::revert(&mut self.host, &mut self.history)
    }

    /// Undo every switch at once.
    #[instrument(skip(self), fields(depth = self.history.depth()))]
    pub fn reset_to_baseline(&mut self) -> Result<RevertOutcome> {
        switch::reset(&mut self.host, &mut self.history)
    }
}
