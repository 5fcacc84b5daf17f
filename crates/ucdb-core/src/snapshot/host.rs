//! A [`DebuggerHost`] over a simulated inferior.
//!
//! [`SnapshotHost::new`] lays a [`RuntimeImage`] out in a small object
//! memory shaped the way the layout profile describes the runtime: records
//! with named members, intrusive circular lists with a `root` pointer, and
//! task records pointing at their saved machine context. Reads go through
//! the same member/pointer walking a real debugger would do.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::image::{RuntimeImage, TaskPath};
use crate::host::{DebuggerHost, HostError, HostResult, Location, SymbolHandle, TypeHandle};
use crate::layout::RuntimeLayout;
use crate::types::{Address, Register, SavedDebugContext};

const HEAP_BASE: u64 = 0x5555_5576_0000;
const STACK_BASE: u64 = 0x7fff_f000_0000;
const STACK_SIZE: u64 = 0x1_0000;
const SEQUENCE_TYPE: &str = "uSequence";

/// Value stored in one member cell
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Pointer(Address),
    Integer(i64),
    Text(String),
    Enumerator(String),
    /// A record stored inline, itself an object
    Embedded(Address),
}

#[derive(Debug, Clone)]
struct Cell {
    ty: String,
    slot: Slot,
}

#[derive(Debug, Clone)]
struct Object {
    ty: String,
    members: IndexMap<String, Address>,
}

#[derive(Debug, Clone)]
struct ClusterEntry {
    name: String,
    address: Address,
    tasks: Vec<(String, Address)>,
}

/// Simulated debugger session over a [`RuntimeImage`].
#[derive(Debug, Clone)]
pub struct SnapshotHost {
    objects: HashMap<Address, Object>,
    cells: HashMap<Address, Cell>,
    next_free: u64,
    known_types: HashSet<String>,
    missing_types: HashSet<String>,
    expressions: HashMap<String, Location>,
    symbols: IndexMap<String, Address>,
    clusters: Vec<ClusterEntry>,
    registers: SavedDebugContext,
    selected_frame: u32,
    frame_depth: u32,
    current_task: Option<Address>,
    register_writes: Vec<(Register, Address)>,
    frame_selections: Vec<u32>,
    commands: Vec<String>,
    fail_write_after: Option<usize>,
}

impl SnapshotHost {
    /// Lay `image` out in memory using the names in `layout`.
    pub fn new(image: RuntimeImage, layout: &RuntimeLayout) -> Self {
        let types = &layout.types;
        let known_types = [
            &types.cluster,
            &types.cluster_node,
            &types.processor,
            &types.processor_node,
            &types.task,
            &types.task_node,
            &types.context,
        ]
        .into_iter()
        .cloned()
        .chain([SEQUENCE_TYPE.to_string()])
        .collect();

        let mut host = Self {
            objects: HashMap::new(),
            cells: HashMap::new(),
            next_free: HEAP_BASE,
            known_types,
            missing_types: image.missing_types.iter().cloned().collect(),
            expressions: HashMap::new(),
            symbols: image.symbols.clone(),
            clusters: Vec::new(),
            registers: image.registers,
            selected_frame: 0,
            frame_depth: image.frame_depth,
            current_task: None,
            register_writes: Vec::new(),
            frame_selections: Vec::new(),
            commands: Vec::new(),
            fail_write_after: None,
        };
        host.lay_out(&image, layout);
        debug!(
            clusters = host.clusters.len(),
            objects = host.objects.len(),
            "snapshot laid out"
        );
        host
    }

    fn lay_out(&mut self, image: &RuntimeImage, layout: &RuntimeLayout) {
        let fields = &layout.fields;
        let types = &layout.types;

        let global = self.sequence(&fields.seq_root);
        let root_cell = self.member_cell(global, &fields.seq_root);
        self.expressions.insert(
            layout.cluster_root.clone(),
            Location::new(root_cell, TypeHandle::new(format!("{} *", types.cluster_node))),
        );

        let mut stack = STACK_BASE;
        let mut cluster_nodes = Vec::new();
        for cluster in &image.clusters {
            let processors = self.sequence(&fields.seq_root);
            let tasks = self.sequence(&fields.seq_root);
            let address = self.object(
                &types.cluster,
                vec![
                    (&fields.cluster_name, "const char *", Slot::Text(cluster.name.clone())),
                    (&fields.cluster_processors, SEQUENCE_TYPE, Slot::Embedded(processors)),
                    (&fields.cluster_tasks, SEQUENCE_TYPE, Slot::Embedded(tasks)),
                ],
            );
            cluster_nodes.push(self.node(layout, &types.cluster_node, &fields.node_cluster, address));

            let mut nodes = Vec::new();
            for processor in &cluster.processors {
                let payload = self.object(
                    &types.processor,
                    vec![
                        (&fields.processor_pid, "pid_t", Slot::Integer(processor.pid)),
                        (
                            &fields.processor_preemption,
                            "unsigned int",
                            Slot::Integer(processor.preemption as i64),
                        ),
                        (&fields.processor_spin, "unsigned int", Slot::Integer(processor.spin as i64)),
                    ],
                );
                nodes.push(self.node(layout, &types.processor_node, &fields.node_processor, payload));
            }
            self.link(layout, processors, &nodes);

            let mut entry = ClusterEntry {
                name: cluster.name.clone(),
                address,
                tasks: Vec::new(),
            };
            let mut nodes = Vec::new();
            for task in &cluster.tasks {
                let (sp, fp) = match task.context {
                    Some(context) => (context.sp, context.fp),
                    None => {
                        stack += STACK_SIZE;
                        (Address(stack - 0x200), Address(stack - 0x100))
                    }
                };
                let context = self.object(
                    &types.context,
                    vec![
                        (&fields.context_sp, "void *", Slot::Pointer(sp)),
                        (&fields.context_fp, "void *", Slot::Pointer(fp)),
                    ],
                );
                let payload = self.object(
                    &types.task,
                    vec![
                        (&fields.task_name, "const char *", Slot::Text(task.name.clone())),
                        (
                            &fields.task_state,
                            "uBaseTask::State",
                            Slot::Enumerator(format!("uBaseTask::{}", task.state)),
                        ),
                        (&fields.task_context, "void *", Slot::Pointer(context)),
                    ],
                );
                nodes.push(self.node(layout, &types.task_node, &fields.node_task, payload));
                entry.tasks.push((task.name.clone(), payload));
            }
            self.link(layout, tasks, &nodes);
            self.clusters.push(entry);
        }

        if image.initialized {
            self.link(layout, global, &cluster_nodes);
        }

        for (name, path) in &image.variables {
            let target = self.resolve_path(path).unwrap_or_else(|| {
                warn!(variable = %name, cluster = %path.cluster, task = %path.task, "variable target missing");
                Address::NULL
            });
            let cell = self.cell(format!("{} *", types.task), Slot::Pointer(target));
            self.expressions
                .insert(name.clone(), Location::new(cell, TypeHandle::new(format!("{} *", types.task))));
        }

        self.current_task = image.current_task.as_ref().and_then(|path| self.resolve_path(path));
    }

    fn alloc(&mut self, size: u64) -> Address {
        let address = Address(self.next_free);
        self.next_free += size.max(8).next_multiple_of(16);
        address
    }

    fn cell(&mut self, ty: impl Into<String>, slot: Slot) -> Address {
        let address = self.alloc(8);
        self.cells.insert(address, Cell { ty: ty.into(), slot });
        address
    }

    fn object(&mut self, ty: &str, members: Vec<(&String, &str, Slot)>) -> Address {
        let base = self.alloc(8 * (members.len() as u64 + 1));
        let mut object = Object {
            ty: ty.to_string(),
            members: IndexMap::new(),
        };
        for (index, (name, member_ty, slot)) in members.into_iter().enumerate() {
            let address = base.offset(8 * (index as i64 + 1));
            self.cells.insert(
                address,
                Cell {
                    ty: member_ty.to_string(),
                    slot,
                },
            );
            object.members.insert(name.clone(), address);
        }
        self.objects.insert(base, object);
        base
    }

    fn sequence(&mut self, root_field: &String) -> Address {
        self.object(SEQUENCE_TYPE, vec![(root_field, "void *", Slot::Pointer(Address::NULL))])
    }

    fn node(&mut self, layout: &RuntimeLayout, ty: &str, payload_field: &String, payload: Address) -> Address {
        self.object(
            ty,
            vec![
                (&layout.fields.next, "void *", Slot::Pointer(Address::NULL)),
                (payload_field, "void *", Slot::Pointer(payload)),
            ],
        )
    }

    /// Close `nodes` into a ring hanging off `sequence`.
    fn link(&mut self, layout: &RuntimeLayout, sequence: Address, nodes: &[Address]) {
        for (index, &node) in nodes.iter().enumerate() {
            let next = nodes[(index + 1) % nodes.len()];
            let cell = self.member_cell(node, &layout.fields.next);
            self.set_slot(cell, Slot::Pointer(next));
        }
        if let Some(&first) = nodes.first() {
            let cell = self.member_cell(sequence, &layout.fields.seq_root);
            self.set_slot(cell, Slot::Pointer(first));
        }
    }

    fn member_cell(&self, object: Address, field: &str) -> Address {
        self.objects
            .get(&object)
            .and_then(|o| o.members.get(field).copied())
            .unwrap_or(Address::NULL)
    }

    fn set_slot(&mut self, address: Address, slot: Slot) {
        if let Some(cell) = self.cells.get_mut(&address) {
            cell.slot = slot;
        }
    }

    fn resolve_path(&self, path: &TaskPath) -> Option<Address> {
        self.task_address(&path.cluster, &path.task)
    }

    fn slot(&self, value: &Location) -> HostResult<&Slot> {
        self.cells
            .get(&value.address)
            .map(|cell| &cell.slot)
            .ok_or(HostError::MemoryAccess(value.address))
    }

    fn unexpected(value: &Location, expected: &str) -> HostError {
        HostError::UnexpectedValue {
            address: value.address,
            reason: format!("expected {expected} for `{}`", value.ty),
        }
    }

    /// Location of the cluster record called `name`.
    pub fn cluster_location(&self, name: &str) -> Option<Location> {
        let entry = self.clusters.iter().find(|c| c.name == name)?;
        let ty = self.objects.get(&entry.address)?.ty.clone();
        Some(Location::new(entry.address, TypeHandle::new(ty)))
    }

    /// Address of the first task called `task` on `cluster`.
    pub fn task_address(&self, cluster: &str, task: &str) -> Option<Address> {
        self.clusters
            .iter()
            .find(|c| c.name == cluster)?
            .tasks
            .iter()
            .find(|(name, _)| name == task)
            .map(|&(_, address)| address)
    }

    /// Overwrite the pointer stored at `address`.
    pub fn poke_pointer(&mut self, address: Address, value: Address) -> HostResult<()> {
        match self.cells.get_mut(&address) {
            Some(Cell {
                slot: slot @ Slot::Pointer(_),
                ..
            }) => {
                *slot = Slot::Pointer(value);
                Ok(())
            }
            _ => Err(HostError::MemoryAccess(address)),
        }
    }

    /// Make the debugger appear stopped inside `task` of `cluster`.
    pub fn set_current_task(&mut self, cluster: &str, task: &str) -> HostResult<()> {
        let address = self.task_address(cluster, task).ok_or_else(|| HostError::Evaluation {
            expr: format!("{cluster}::{task}"),
            reason: "no such task".to_string(),
        })?;
        self.current_task = Some(address);
        Ok(())
    }

    /// Live register values
    pub fn registers(&self) -> SavedDebugContext {
        self.registers
    }

    /// Successful register writes, in order
    pub fn register_writes(&self) -> &[(Register, Address)] {
        &self.register_writes
    }

    pub fn selected_frame(&self) -> u32 {
        self.selected_frame
    }

    /// Every frame level selected, in order
    pub fn frame_selections(&self) -> &[u32] {
        &self.frame_selections
    }

    /// Every command run through [`DebuggerHost::execute_subcommand`]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Let `writes` register writes succeed, then fail the next one.
    pub fn fail_register_write_after(&mut self, writes: usize) {
        self.fail_write_after = Some(writes);
    }

    fn backtrace(&self) -> String {
        match self.current_task {
            Some(task) => {
                let name = self
                    .clusters
                    .iter()
                    .flat_map(|c| c.tasks.iter())
                    .find(|(_, address)| *address == task)
                    .map(|(name, _)| name.as_str())
                    .unwrap_or("uBaseTask");
                format!(
                    "#0  {pc} in uSwitch () at uSwitch-x86_64.S:64\n\
                     #1  0x0000555555577f3c in {name}::main (this={task}) at program.cc:42\n\
                     #2  0x000055555557ffa6 in UPP::uMachContext::invokeTask (This=...) at uMachContext.cc:130\n\
                     #3  0x0000000000000000 in ?? ()\n",
                    pc = self.registers.pc,
                )
            }
            None => format!("#0  {} in main () at program.cc:12\n", self.registers.pc),
        }
    }
}

impl DebuggerHost for SnapshotHost {
    fn resolve_type(&mut self, name: &str) -> HostResult<TypeHandle> {
        if self.missing_types.contains(name) || !self.known_types.contains(name) {
            return Err(HostError::UnknownType(name.to_string()));
        }
        Ok(TypeHandle::new(name))
    }

    fn evaluate_expression(&mut self, expr: &str) -> HostResult<Location> {
        self.expressions
            .get(expr)
            .cloned()
            .ok_or_else(|| HostError::Evaluation {
                expr: expr.to_string(),
                reason: "no symbol in current context".to_string(),
            })
    }

    fn member(&mut self, value: &Location, field: &str) -> HostResult<Location> {
        let object = self
            .objects
            .get(&value.address)
            .ok_or(HostError::MemoryAccess(value.address))?;
        let address = object
            .members
            .get(field)
            .copied()
            .ok_or_else(|| HostError::UnknownMember {
                ty: value.ty.name().to_string(),
                member: field.to_string(),
            })?;
        let cell = self.cells.get(&address).ok_or(HostError::MemoryAccess(address))?;
        match cell.slot {
            Slot::Embedded(inner) => {
                let ty = self
                    .objects
                    .get(&inner)
                    .map(|o| o.ty.clone())
                    .ok_or(HostError::MemoryAccess(inner))?;
                Ok(Location::new(inner, TypeHandle::new(ty)))
            }
            _ => Ok(Location::new(address, TypeHandle::new(cell.ty.clone()))),
        }
    }

    fn read_address(&mut self, value: &Location) -> HostResult<Address> {
        match self.slot(value)? {
            Slot::Pointer(address) => Ok(*address),
            _ => Err(Self::unexpected(value, "a pointer")),
        }
    }

    fn read_integer(&mut self, value: &Location) -> HostResult<i64> {
        match self.slot(value)? {
            Slot::Integer(n) => Ok(*n),
            _ => Err(Self::unexpected(value, "an integer")),
        }
    }

    fn read_string(&mut self, value: &Location) -> HostResult<String> {
        match self.slot(value)? {
            Slot::Text(text) => Ok(text.clone()),
            _ => Err(Self::unexpected(value, "a string")),
        }
    }

    fn read_enumerator(&mut self, value: &Location) -> HostResult<String> {
        match self.slot(value)? {
            Slot::Enumerator(name) => Ok(name.clone()),
            _ => Err(Self::unexpected(value, "an enumerator")),
        }
    }

    fn read_register(&mut self, register: Register) -> HostResult<Address> {
        Ok(self.registers.get(register))
    }

    fn write_register(&mut self, register: Register, value: Address) -> HostResult<()> {
        match self.fail_write_after {
            Some(0) => {
                self.fail_write_after = None;
                return Err(HostError::RegisterWrite {
                    register,
                    reason: "injected failure".to_string(),
                });
            }
            Some(n) => self.fail_write_after = Some(n - 1),
            None => {}
        }
        match register {
            Register::StackPointer => self.registers.sp = value,
            Register::FramePointer => self.registers.fp = value,
            Register::InstructionPointer => self.registers.pc = value,
        }
        self.register_writes.push((register, value));
        Ok(())
    }

    fn select_frame(&mut self, level: u32) -> HostResult<()> {
        if level >= self.frame_depth {
            return Err(HostError::NoFrame(level));
        }
        self.selected_frame = level;
        self.frame_selections.push(level);
        Ok(())
    }

    fn execute_subcommand(&mut self, text: &str) -> HostResult<String> {
        self.commands.push(text.to_string());
        let command = text.split_whitespace().next().unwrap_or_default();
        match command {
            "bt" | "backtrace" | "where" => Ok(self.backtrace()),
            "frame" | "f" => Ok(format!("#{}  {}\n", self.selected_frame, self.registers.pc)),
            "handle" => Ok(String::new()),
            _ => Err(HostError::Command {
                command: text.to_string(),
                reason: "undefined command".to_string(),
            }),
        }
    }

    fn lookup_symbol(&mut self, name: &str) -> HostResult<Option<SymbolHandle>> {
        Ok(self.symbols.get(name).map(|&address| SymbolHandle {
            name: name.to_string(),
            address,
        }))
    }
}
