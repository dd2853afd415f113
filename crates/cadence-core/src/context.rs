//! The runtime context: tables, scheduler, pool, graph, receivers and hooks.
//!
//! A [`Context`] is what a host drives. It is built once from a compiled patch
//! (tables, objects, edges, receiver routes), then called once per audio block
//! with [`process`](Context::process) or one of its buffer-layout variants.
//!
//! # Block processing
//!
//! A block is processed one vector ([`VECTOR_WIDTH`] samples) at a time:
//!
//! 1. Every scheduled message whose timestamp lies before the end of the
//!    vector is popped, released from the pool and delivered to the routes of
//!    its receiver.
//! 2. Every signal object runs once, producers before consumers.
//! 3. The vector is copied to the host's output channels.
//!
//! Messages are therefore sample-accurate to within one vector, and parameter
//! changes made by control messages are latched for the whole vector.
//!
//! # Message injection
//!
//! `send_*` deliver at the current block-start timestamp, which means on the
//! first vector of the next processed block. [`schedule_message`] adds a delay
//! in milliseconds: `timestamp = block_start + floor(delay_ms * sr / 1000)`.
//! Unknown receivers are not an error; the message is dropped and `Ok(None)`
//! is returned.
//!
//! [`schedule_message`]: Context::schedule_message

#[cfg(not(feature = "std"))]
use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString},
    vec,
    vec::Vec,
};
#[cfg(feature = "std")]
use std::collections::BTreeMap;

use core::any::Any;
use core::fmt::Write as _;

use crate::config::ContextConfig;
use crate::graph::{GraphError, NodeId, SignalGraph};
use crate::message::{Element, Message, MessageError, symbol_hash};
use crate::objects::{ObjectContext, SignalObject};
use crate::pool::{MessageHandle, MessagePool, PoolError};
use crate::scheduler::{ReceiverId, Scheduler};
use crate::table::{Table, TableError, TableId, TableSet};
use crate::vector::{Backend, SILENCE, VECTOR_WIDTH, Vector, floor_to_vector};

/// Print hook: `(timestamp_ms, source, text)`.
pub type PrintHook = Box<dyn FnMut(f64, &str, &str) + Send>;

/// Send hook: `(timestamp_ms, receiver, message)`. The message is borrowed
/// for the duration of the call; clone it to keep it.
pub type SendHook = Box<dyn FnMut(f64, &str, &Message) + Send>;

/// Errors returned by the context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    /// A caller-supplied value is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The message pool rejected an allocation or handle.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// A table operation failed.
    #[error(transparent)]
    Table(#[from] TableError),
    /// A graph operation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A message could not be built.
    #[error(transparent)]
    Message(#[from] MessageError),
    /// Two receiver names share a hash.
    #[error("receiver '{name}' collides with existing receiver '{existing}'")]
    ReceiverCollision {
        /// Name being registered.
        name: String,
        /// Name already registered under the same hash.
        existing: String,
    },
    /// [`Context::compile`] has not run since the graph last changed.
    #[error("graph is not compiled")]
    NotCompiled,
}

/// One destination of a receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Deliver to an object inlet.
    Inlet {
        /// Target node.
        node: NodeId,
        /// Target inlet.
        inlet: usize,
    },
    /// Hand to the send hook under this name.
    Send(String),
    /// Hand the text rendering to the print hook under this source name.
    Print(String),
    /// Re-schedule to another receiver after a delay, measured from the
    /// message's own timestamp.
    Forward {
        /// Target receiver name.
        receiver: String,
        /// Delay in milliseconds.
        delay_ms: f64,
    },
    /// Table control: `resize <n>` or a bare float resizes, `clear` zeroes,
    /// `head <n>` sets the head.
    Table(TableId),
}

impl Route {
    /// Route to `node:inlet`.
    pub fn inlet(node: NodeId, inlet: usize) -> Self {
        Route::Inlet { node, inlet }
    }

    /// Route to the send hook.
    pub fn send(name: impl Into<String>) -> Self {
        Route::Send(name.into())
    }

    /// Route to the print hook.
    pub fn print(name: impl Into<String>) -> Self {
        Route::Print(name.into())
    }

    /// Delayed forward to another receiver.
    pub fn forward(receiver: impl Into<String>, delay_ms: f64) -> Self {
        Route::Forward {
            receiver: receiver.into(),
            delay_ms,
        }
    }
}

/// A structured argument for [`Context::schedule_formatted`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatArg<'a> {
    /// Consumed by `f`.
    Float(f32),
    /// Consumed by `s` and `h`.
    Symbol(&'a str),
}

impl From<f32> for FormatArg<'_> {
    fn from(value: f32) -> Self {
        FormatArg::Float(value)
    }
}

impl<'a> From<&'a str> for FormatArg<'a> {
    fn from(value: &'a str) -> Self {
        FormatArg::Symbol(value)
    }
}

struct Receiver {
    name: String,
    routes: Vec<Route>,
}

/// The real-time runtime.
///
/// `Context` is `Send` but every mutating method takes `&mut self`: hosts
/// sharing one context between an audio thread and a control thread put it
/// behind a lock.
pub struct Context {
    config: ContextConfig,
    graph: SignalGraph,
    tables: TableSet,
    pool: MessagePool,
    scheduler: Scheduler,
    receivers: Vec<Receiver>,
    receiver_index: BTreeMap<u32, ReceiverId>,
    block_start: u64,
    print_hook: Option<PrintHook>,
    send_hook: Option<SendHook>,
    print_buf: String,
    user_data: Option<Box<dyn Any + Send>>,
    in_vectors: Vec<Vector>,
    out_vectors: Vec<Vector>,
}

impl Context {
    /// Creates a context with default settings at `sample_rate`.
    pub fn new(sample_rate: f64) -> Result<Self, ContextError> {
        Self::with_config(ContextConfig::new(sample_rate))
    }

    /// Creates a context from a full configuration.
    pub fn with_config(config: ContextConfig) -> Result<Self, ContextError> {
        config.validate().map_err(ContextError::InvalidArgument)?;
        let pool = MessagePool::with_kilobytes(config.pool_kb);
        let scheduler = Scheduler::with_capacity(pool.max_messages());

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "context_new: '{}' {} Hz, {} in / {} out, pool {} KB, {:?}",
            config.name,
            config.sample_rate,
            config.num_input_channels,
            config.num_output_channels,
            config.pool_kb,
            config.backend
        );

        Ok(Self {
            graph: SignalGraph::new(config.num_input_channels, config.num_output_channels),
            tables: TableSet::new(),
            pool,
            scheduler,
            receivers: Vec::new(),
            receiver_index: BTreeMap::new(),
            block_start: 0,
            print_hook: None,
            send_hook: None,
            print_buf: String::with_capacity(256),
            user_data: None,
            in_vectors: vec![SILENCE; config.num_input_channels],
            out_vectors: vec![SILENCE; config.num_output_channels],
            config,
        })
    }

    // --- Wiring ---

    /// Adds a zeroed table of `len` samples.
    pub fn add_table(&mut self, name: &str, len: usize) -> Result<TableId, ContextError> {
        Ok(self.tables.insert(name, len)?)
    }

    /// Adds a prepared table.
    pub fn insert_table(&mut self, table: Table) -> Result<TableId, ContextError> {
        Ok(self.tables.insert_table(table)?)
    }

    /// Adds a signal object node.
    pub fn add_object(&mut self, object: Box<dyn SignalObject>) -> NodeId {
        self.graph.add_object(object)
    }

    /// Adds a node emitting host input channel `channel`.
    pub fn add_input(&mut self, channel: usize) -> Result<NodeId, ContextError> {
        Ok(self.graph.add_input(channel)?)
    }

    /// Adds a node feeding host output channel `channel`.
    pub fn add_output(&mut self, channel: usize) -> Result<NodeId, ContextError> {
        Ok(self.graph.add_output(channel)?)
    }

    /// Connects `from` to inlet `inlet` of `to`.
    pub fn connect(&mut self, from: NodeId, to: NodeId, inlet: usize) -> Result<(), ContextError> {
        self.graph.connect(from, to, inlet)?;
        Ok(())
    }

    /// Adds `route` to receiver `name`, creating the receiver if needed.
    ///
    /// # Errors
    ///
    /// - [`ContextError::Graph`] if an inlet route targets a missing inlet
    /// - [`ContextError::Table`] if a table route names a foreign table
    /// - [`ContextError::InvalidArgument`] for a negative forward delay, or a
    ///   forward that would loop back to `name` without any delay
    /// - [`ContextError::ReceiverCollision`] if `name` hashes like another
    ///   receiver
    pub fn add_route(&mut self, name: &str, route: Route) -> Result<ReceiverId, ContextError> {
        match &route {
            Route::Inlet { node, inlet } => self.graph.validate_inlet(*node, *inlet)?,
            Route::Table(id) => {
                if id.index() as usize >= self.tables.len() {
                    return Err(TableError::UnknownTable(id.index().to_string()).into());
                }
            }
            Route::Forward { receiver, delay_ms } => {
                let delay = delay_to_samples(*delay_ms, self.config.sample_rate)?;
                if delay == 0 && self.zero_delay_path(receiver, name) {
                    return Err(ContextError::InvalidArgument(
                        "forward would loop without delay",
                    ));
                }
            }
            Route::Send(_) | Route::Print(_) => {}
        }

        let id = self.register_receiver(name)?;
        self.receivers[id.0 as usize].routes.push(route);
        Ok(id)
    }

    fn register_receiver(&mut self, name: &str) -> Result<ReceiverId, ContextError> {
        let hash = symbol_hash(name);
        if let Some(&id) = self.receiver_index.get(&hash) {
            let existing = &self.receivers[id.0 as usize].name;
            if existing != name {
                return Err(ContextError::ReceiverCollision {
                    name: name.to_string(),
                    existing: existing.clone(),
                });
            }
            return Ok(id);
        }
        let id = ReceiverId(self.receivers.len() as u32);
        self.receivers.push(Receiver {
            name: name.to_string(),
            routes: Vec::new(),
        });
        self.receiver_index.insert(hash, id);
        Ok(id)
    }

    /// True if `start` reaches `goal` through forwards that add no delay.
    fn zero_delay_path(&self, start: &str, goal: &str) -> bool {
        let mut visited = vec![false; self.receivers.len()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if current == goal {
                return true;
            }
            let Some(id) = self.receiver_id(current) else {
                continue;
            };
            if visited[id.0 as usize] {
                continue;
            }
            visited[id.0 as usize] = true;
            for route in &self.receivers[id.0 as usize].routes {
                if let Route::Forward { receiver, delay_ms } = route
                    && delay_to_samples(*delay_ms, self.config.sample_rate) == Ok(0)
                {
                    stack.push(receiver);
                }
            }
        }
        false
    }

    /// Compiles the signal graph. Required before processing and after any
    /// change to nodes or edges.
    pub fn compile(&mut self) -> Result<(), ContextError> {
        self.graph.compile()?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "context_compile: {} nodes, {} edges, {} receivers, {} tables",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.receivers.len(),
            self.tables.len()
        );
        Ok(())
    }

    // --- Processing ---

    /// Processes `n` frames from per-channel slices.
    ///
    /// `n` is rounded down to a multiple of [`VECTOR_WIDTH`]; the return value
    /// is the number of frames actually processed. Every input and output
    /// slice must hold at least that many frames.
    pub fn process(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        n: usize,
    ) -> Result<usize, ContextError> {
        let frames = floor_to_vector(n);
        if inputs.len() < self.num_input_channels()
            || outputs.len() < self.num_output_channels()
            || inputs.iter().any(|c| c.len() < frames)
            || outputs.iter().any(|c| c.len() < frames)
        {
            return Err(ContextError::InvalidArgument(
                "channel buffers shorter than the frame count",
            ));
        }
        self.run_frames(
            frames,
            |ch, i| inputs[ch][i],
            |ch, i, v| outputs[ch][i] = v,
        )
    }

    /// Processes `n` frames from non-interleaved buffers: channel `c`
    /// occupies `[c * n, (c + 1) * n)`.
    pub fn process_inline(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        n: usize,
    ) -> Result<usize, ContextError> {
        if input.len() < self.num_input_channels() * n
            || output.len() < self.num_output_channels() * n
        {
            return Err(ContextError::InvalidArgument(
                "inline buffers shorter than channels * frames",
            ));
        }
        let frames = floor_to_vector(n);
        self.run_frames(
            frames,
            |ch, i| input[ch * n + i],
            |ch, i, v| output[ch * n + i] = v,
        )
    }

    /// Processes `n` frames from interleaved buffers: frame `i` of channel
    /// `c` is at `i * channels + c`.
    pub fn process_interleaved(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        n: usize,
    ) -> Result<usize, ContextError> {
        let n_in = self.num_input_channels();
        let n_out = self.num_output_channels();
        let frames = floor_to_vector(n);
        if input.len() < n_in * frames || output.len() < n_out * frames {
            return Err(ContextError::InvalidArgument(
                "interleaved buffers shorter than channels * frames",
            ));
        }
        self.run_frames(
            frames,
            |ch, i| input[i * n_in + ch],
            |ch, i, v| output[i * n_out + ch] = v,
        )
    }

    /// Processes `n` frames from interleaved 16-bit buffers.
    ///
    /// Input samples are scaled by `1 / 32767`; output samples are clamped
    /// to `[-1, 1]`, scaled by `32767` and rounded to the nearest integer.
    pub fn process_inline_short(
        &mut self,
        input: &[i16],
        output: &mut [i16],
        n: usize,
    ) -> Result<usize, ContextError> {
        let n_in = self.num_input_channels();
        let n_out = self.num_output_channels();
        let frames = floor_to_vector(n);
        if input.len() < n_in * frames || output.len() < n_out * frames {
            return Err(ContextError::InvalidArgument(
                "interleaved buffers shorter than channels * frames",
            ));
        }
        self.run_frames(
            frames,
            |ch, i| f32::from(input[i * n_in + ch]) / SHORT_SCALE,
            |ch, i, v| {
                output[i * n_out + ch] = libm::roundf(v.clamp(-1.0, 1.0) * SHORT_SCALE) as i16;
            },
        )
    }

    fn run_frames(
        &mut self,
        frames: usize,
        read: impl Fn(usize, usize) -> f32,
        mut write: impl FnMut(usize, usize, f32),
    ) -> Result<usize, ContextError> {
        if !self.graph.is_compiled() {
            return Err(ContextError::NotCompiled);
        }
        for start in (0..frames).step_by(VECTOR_WIDTH) {
            for (ch, v) in self.in_vectors.iter_mut().enumerate() {
                for (j, s) in v.iter_mut().enumerate() {
                    *s = read(ch, start + j);
                }
            }
            self.tick();
            for (ch, v) in self.out_vectors.iter().enumerate() {
                for (j, &s) in v.iter().enumerate() {
                    write(ch, start + j, s);
                }
            }
        }
        Ok(frames)
    }

    /// Dispatches due messages and runs the graph for one vector.
    fn tick(&mut self) {
        let vector_end = self.block_start + VECTOR_WIDTH as u64;
        while let Some(event) = self.scheduler.pop_due(vector_end) {
            match self.pool.free(event.handle) {
                Ok(message) => self.deliver(event.receiver, &message),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("dispatch: {_e} for {}", event.handle);
                }
            }
        }

        self.out_vectors.fill(SILENCE);
        let mut cx = ObjectContext {
            tables: &mut self.tables,
            sample_rate: self.config.sample_rate,
            backend: self.config.backend,
        };
        self.graph
            .run_vector(&mut cx, &self.in_vectors, &mut self.out_vectors);
        self.block_start = vector_end;
    }

    fn deliver(&mut self, receiver: ReceiverId, message: &Message) {
        let Self {
            config,
            graph,
            tables,
            pool,
            scheduler,
            receivers,
            receiver_index,
            print_hook,
            send_hook,
            print_buf,
            ..
        } = self;
        let Some(entry) = receivers.get(receiver.0 as usize) else {
            return;
        };
        let ms = message.timestamp() as f64 * 1000.0 / config.sample_rate;

        for route in &entry.routes {
            match route {
                Route::Inlet { node, inlet } => {
                    let mut cx = ObjectContext {
                        tables: &mut *tables,
                        sample_rate: config.sample_rate,
                        backend: config.backend,
                    };
                    if let Err(_e) = graph.send_message(&mut cx, *node, *inlet, message) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!("dispatch '{}': {_e}", entry.name);
                    }
                }
                Route::Send(name) => {
                    if let Some(hook) = send_hook.as_mut() {
                        hook(ms, name, message);
                    }
                }
                Route::Print(name) => {
                    if let Some(hook) = print_hook.as_mut() {
                        print_buf.clear();
                        let _ = write!(print_buf, "{message}");
                        hook(ms, name, print_buf);
                    }
                }
                Route::Forward { receiver, delay_ms } => {
                    let Some(target) = lookup(receivers, receiver_index, receiver) else {
                        continue;
                    };
                    let delay = delay_to_samples(*delay_ms, config.sample_rate).unwrap_or(0);
                    let timestamp = message.timestamp().saturating_add(delay);
                    let mut copy = message.clone();
                    copy.set_timestamp(timestamp);
                    match pool.alloc(copy) {
                        Ok(handle) => {
                            scheduler.schedule(timestamp, target, handle);
                        }
                        Err(_e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("forward '{}' → '{receiver}': {_e}", entry.name);
                        }
                    }
                }
                Route::Table(id) => apply_table_control(tables.get_mut(*id), message),
            }
        }
    }

    // --- Message injection ---

    /// Sends a bang to `receiver` at the current block start.
    pub fn send_bang(&mut self, receiver: &str) -> Result<Option<MessageHandle>, ContextError> {
        self.schedule_message(receiver, 0.0, Message::bang(0))
    }

    /// Sends a float to `receiver` at the current block start.
    pub fn send_float(
        &mut self,
        receiver: &str,
        value: f32,
    ) -> Result<Option<MessageHandle>, ContextError> {
        self.schedule_message(receiver, 0.0, Message::float(0, value))
    }

    /// Sends a symbol to `receiver` at the current block start.
    pub fn send_symbol(
        &mut self,
        receiver: &str,
        value: &str,
    ) -> Result<Option<MessageHandle>, ContextError> {
        self.schedule_message(receiver, 0.0, Message::symbol(0, value))
    }

    /// Sends `message` to `receiver` at the current block start.
    pub fn send_message(
        &mut self,
        receiver: &str,
        message: Message,
    ) -> Result<Option<MessageHandle>, ContextError> {
        self.schedule_message(receiver, 0.0, message)
    }

    /// Schedules `message` for `receiver` after `delay_ms` milliseconds.
    ///
    /// The message's own timestamp is overwritten. Returns the handle of the
    /// pooled copy, which can be passed to
    /// [`cancel_message`](Self::cancel_message) until it is dispatched, or
    /// `None` if no receiver has that name.
    ///
    /// # Errors
    ///
    /// - [`ContextError::InvalidArgument`] for a negative or non-finite delay
    /// - [`ContextError::Pool`] if the pool has no room for the message
    pub fn schedule_message(
        &mut self,
        receiver: &str,
        delay_ms: f64,
        mut message: Message,
    ) -> Result<Option<MessageHandle>, ContextError> {
        let delay = delay_to_samples(delay_ms, self.config.sample_rate)?;
        let Some(id) = self.receiver_id(receiver) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("schedule: no receiver named '{receiver}', dropped");
            return Ok(None);
        };
        // a timestamp saturated at u64::MAX is never due
        let timestamp = self.block_start.saturating_add(delay);
        message.set_timestamp(timestamp);
        let handle = self.pool.alloc(message)?;
        self.scheduler.schedule(timestamp, id, handle);
        Ok(Some(handle))
    }

    /// Builds a message from a format string and schedules it.
    ///
    /// Format codes: `b` bang, `f` float, `s` symbol, `h` hash of a symbol.
    /// `f`, `s` and `h` each consume the next argument, which must have the
    /// matching type.
    ///
    /// ```rust
    /// use cadence_core::{Context, FormatArg, Route};
    /// use cadence_core::objects::Var;
    ///
    /// let mut cx = Context::new(48_000.0).unwrap();
    /// let node = cx.add_object(Box::new(Var::new(0.0)));
    /// cx.add_route("gain", Route::inlet(node, 0)).unwrap();
    /// let handle = cx.schedule_formatted("gain", 0.0, "f", &[FormatArg::Float(0.5)]).unwrap();
    /// assert!(handle.is_some());
    /// ```
    pub fn schedule_formatted(
        &mut self,
        receiver: &str,
        delay_ms: f64,
        format: &str,
        args: &[FormatArg<'_>],
    ) -> Result<Option<MessageHandle>, ContextError> {
        let mut message = Message::new(format.len(), 0)?;
        let mut args = args.iter();
        for (i, code) in format.chars().enumerate() {
            let arg = if code == 'b' { None } else { args.next() };
            let element = match (code, arg) {
                ('b', _) => Element::Bang,
                ('f', Some(FormatArg::Float(f))) => Element::Float(*f),
                ('s', Some(FormatArg::Symbol(s))) => Element::from(*s),
                ('h', Some(FormatArg::Symbol(s))) => Element::Hash(symbol_hash(s)),
                ('f' | 's' | 'h', _) => {
                    return Err(ContextError::InvalidArgument(
                        "format argument missing or of the wrong type",
                    ));
                }
                _ => return Err(ContextError::InvalidArgument("unknown format code")),
            };
            message.set(i, element);
        }
        if args.next().is_some() {
            return Err(ContextError::InvalidArgument("more arguments than format codes"));
        }
        self.schedule_message(receiver, delay_ms, message)
    }

    /// Cancels a pending message and releases its pool slot.
    ///
    /// Returns [`PoolError::StaleHandle`] if the message was already
    /// dispatched or cancelled.
    pub fn cancel_message(&mut self, handle: MessageHandle) -> Result<Message, ContextError> {
        if !self.scheduler.cancel(handle) {
            return Err(PoolError::StaleHandle.into());
        }
        Ok(self.pool.free(handle)?)
    }

    // --- Hooks ---

    /// Installs the print hook.
    pub fn set_print_hook(&mut self, hook: impl FnMut(f64, &str, &str) + Send + 'static) {
        self.print_hook = Some(Box::new(hook));
    }

    /// Installs the send hook.
    pub fn set_send_hook(&mut self, hook: impl FnMut(f64, &str, &Message) + Send + 'static) {
        self.send_hook = Some(Box::new(hook));
    }

    /// Removes both hooks.
    pub fn clear_hooks(&mut self) {
        self.print_hook = None;
        self.send_hook = None;
    }

    // --- Accessors ---

    /// Looks up a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.by_name(name)
    }

    /// Looks up a table by name, mutably (for preloading or resizing).
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.by_name_mut(name)
    }

    /// All tables.
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// Looks up a receiver by name.
    pub fn receiver_id(&self, name: &str) -> Option<ReceiverId> {
        lookup(&self.receivers, &self.receiver_index, name)
    }

    /// Names of all receivers, in registration order.
    pub fn receiver_names(&self) -> impl Iterator<Item = &str> {
        self.receivers.iter().map(|r| r.name.as_str())
    }

    /// The signal graph.
    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Number of host input channels.
    pub fn num_input_channels(&self) -> usize {
        self.config.num_input_channels
    }

    /// Number of host output channels.
    pub fn num_output_channels(&self) -> usize {
        self.config.num_output_channels
    }

    /// Kernel backend.
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    /// Sample time of the first frame of the next block.
    pub fn block_start_timestamp(&self) -> u64 {
        self.block_start
    }

    /// [`block_start_timestamp`](Self::block_start_timestamp) in
    /// milliseconds.
    pub fn current_time_ms(&self) -> f64 {
        self.block_start as f64 * 1000.0 / self.config.sample_rate
    }

    /// Patch name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Base path for patch-relative resources.
    pub fn base_path(&self) -> Option<&str> {
        self.config.base_path.as_deref()
    }

    /// Sets the base path.
    pub fn set_base_path(&mut self, path: impl Into<String>) {
        self.config.base_path = Some(path.into());
    }

    /// Host data stored on the context, if it has type `T`.
    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.as_ref()?.downcast_ref()
    }

    /// Mutable host data, if it has type `T`.
    pub fn user_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.user_data.as_mut()?.downcast_mut()
    }

    /// Stores host data, returning the previous value.
    pub fn set_user_data(&mut self, data: Box<dyn Any + Send>) -> Option<Box<dyn Any + Send>> {
        self.user_data.replace(data)
    }

    /// The message pool, for budget statistics.
    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Number of scheduled messages not yet dispatched.
    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }
}

/// Full scale of a 16-bit sample.
const SHORT_SCALE: f32 = 32767.0;

fn lookup(
    receivers: &[Receiver],
    index: &BTreeMap<u32, ReceiverId>,
    name: &str,
) -> Option<ReceiverId> {
    let id = *index.get(&symbol_hash(name))?;
    (receivers[id.0 as usize].name == name).then_some(id)
}

/// Converts a delay to whole samples. Delays past the end of the clock
/// saturate at `u64::MAX`.
fn delay_to_samples(delay_ms: f64, sample_rate: f64) -> Result<u64, ContextError> {
    if !(delay_ms.is_finite() && delay_ms >= 0.0) {
        return Err(ContextError::InvalidArgument(
            "delay must be finite and non-negative",
        ));
    }
    Ok(libm::floor(delay_ms * sample_rate / 1000.0) as u64)
}

fn apply_table_control(table: &mut Table, message: &Message) {
    let as_len = |f: f32| if f.is_finite() && f > 0.0 { f as usize } else { 0 };
    let result = if message.is_float(0) {
        table.resize(as_len(message.get_float(0))).map(|_| ())
    } else if message.is_symbol_eq(0, "resize") && message.len() >= 2 && message.is_float(1) {
        table.resize(as_len(message.get_float(1))).map(|_| ())
    } else if message.is_symbol_eq(0, "clear") {
        table.clear();
        Ok(())
    } else if message.is_symbol_eq(0, "head") && message.len() >= 2 && message.is_float(1) {
        table.set_head(as_len(message.get_float(1)));
        Ok(())
    } else {
        Ok(())
    };
    if let Err(_e) = result {
        #[cfg(feature = "tracing")]
        tracing::warn!("table '{}': {_e}", table.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Binop, BinopKind, Var};
    use std::sync::{Arc, Mutex};

    fn gain_context() -> Context {
        let config = ContextConfig::new(1000.0).with_channels(1, 1);
        let mut cx = Context::with_config(config).unwrap();
        let input = cx.add_input(0).unwrap();
        let gain = cx.add_object(Box::new(Binop::new(BinopKind::Mul, 1.0)));
        let output = cx.add_output(0).unwrap();
        cx.connect(input, gain, 0).unwrap();
        cx.connect(gain, output, 0).unwrap();
        cx.add_route("gain", Route::inlet(gain, 1)).unwrap();
        cx.compile().unwrap();
        cx
    }

    fn render(cx: &mut Context, input: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; input.len()];
        let n = cx.process(&[input], &mut [&mut out], input.len()).unwrap();
        assert_eq!(n, input.len());
        out
    }

    #[test]
    fn processing_requires_compile() {
        let mut cx = Context::new(48_000.0).unwrap();
        cx.add_object(Box::new(Var::new(1.0)));
        let mut l = [0.0; 4];
        let mut r = [0.0; 4];
        assert_eq!(
            cx.process(&[], &mut [&mut l, &mut r], 4),
            Err(ContextError::NotCompiled)
        );
    }

    #[test]
    fn frames_round_down_to_vector_width() {
        let mut cx = gain_context();
        let input = [1.0; 10];
        let mut out = [0.0; 10];
        assert_eq!(cx.process(&[&input], &mut [&mut out], 10), Ok(8));
        assert_eq!(cx.block_start_timestamp(), 8);
        assert_eq!(&out[8..], &[0.0, 0.0]);
    }

    #[test]
    fn send_float_applies_on_next_block() {
        let mut cx = gain_context();
        let input = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let before = render(&mut cx, &input);
        cx.send_float("gain", 0.5).unwrap();
        let after = render(&mut cx, &input);
        let halved: Vec<f32> = before.iter().map(|s| s * 0.5).collect();
        assert_eq!(after, halved);
    }

    #[test]
    fn delayed_message_lands_on_its_vector() {
        let mut cx = gain_context();
        // 6 ms at 1 kHz is sample 6, inside the second vector
        cx.schedule_message("gain", 6.0, Message::float(0, 0.0)).unwrap();
        let out = render(&mut cx, &[1.0; 12]);
        assert_eq!(out, [1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(cx.pending_events(), 0);
        assert_eq!(cx.pool().live_count(), 0);
    }

    #[test]
    fn unknown_receiver_is_dropped_without_allocating() {
        let mut cx = gain_context();
        assert_eq!(cx.send_float("nobody", 1.0), Ok(None));
        assert_eq!(cx.pool().live_count(), 0);
        assert_eq!(cx.pending_events(), 0);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut cx = gain_context();
        for delay in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                cx.schedule_message("gain", delay, Message::bang(0)),
                Err(ContextError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn cancel_prevents_dispatch_and_frees_slot() {
        let mut cx = gain_context();
        let h = cx
            .schedule_message("gain", 2.0, Message::float(0, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(cx.pool().live_count(), 1);
        let msg = cx.cancel_message(h).unwrap();
        assert_eq!(msg.get_float(0), 0.0);
        assert_eq!(cx.pool().live_count(), 0);
        assert_eq!(render(&mut cx, &[1.0; 8]), vec![1.0; 8]);
        assert_eq!(
            cx.cancel_message(h),
            Err(ContextError::Pool(PoolError::StaleHandle))
        );
    }

    #[test]
    fn formatted_messages_check_arguments() {
        let mut cx = gain_context();
        assert!(
            cx.schedule_formatted("gain", 0.0, "f", &[FormatArg::Float(0.25)])
                .unwrap()
                .is_some()
        );
        assert!(cx.schedule_formatted("gain", 0.0, "f", &[]).is_err());
        assert!(
            cx.schedule_formatted("gain", 0.0, "s", &[FormatArg::Float(1.0)])
                .is_err()
        );
        assert!(cx.schedule_formatted("gain", 0.0, "x", &[]).is_err());
        assert!(
            cx.schedule_formatted("gain", 0.0, "b", &["extra".into()])
                .is_err()
        );
        assert!(matches!(
            cx.schedule_formatted("gain", 0.0, "", &[]),
            Err(ContextError::Message(MessageError::Empty))
        ));
        assert_eq!(render(&mut cx, &[2.0; 4]), vec![0.5; 4]);
    }

    #[test]
    fn hooks_receive_routed_messages() {
        let mut cx = gain_context();
        cx.add_route("gain", Route::send("gain_out")).unwrap();
        cx.add_route("gain", Route::print("gain_print")).unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        let printed = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&sent);
        cx.set_send_hook(move |ms, name, m| {
            s.lock().unwrap().push((ms, name.to_string(), m.clone()));
        });
        let p = Arc::clone(&printed);
        cx.set_print_hook(move |ms, name, text| {
            p.lock().unwrap().push((ms, name.to_string(), text.to_string()));
        });

        render(&mut cx, &[0.0; 8]);
        cx.schedule_message("gain", 2.0, Message::float(0, 0.5)).unwrap();
        render(&mut cx, &[0.0; 8]);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 10.0);
        assert_eq!(sent[0].1, "gain_out");
        assert_eq!(sent[0].2.get_float(0), 0.5);
        let printed = printed.lock().unwrap();
        assert_eq!(printed.as_slice(), &[(10.0, "gain_print".to_string(), "0.5".to_string())]);
    }

    #[test]
    fn forward_reschedules_with_delay() {
        let mut cx = gain_context();
        cx.add_route("later", Route::forward("gain", 4.0)).unwrap();
        cx.send_float("later", 0.0).unwrap();
        let out = render(&mut cx, &[1.0; 12]);
        assert_eq!(&out[..4], &[1.0; 4]);
        assert_eq!(&out[4..], &[0.0; 8]);
    }

    #[test]
    fn zero_delay_forward_loops_are_rejected() {
        let mut cx = gain_context();
        assert!(cx.add_route("a", Route::forward("a", 0.0)).is_err());
        cx.add_route("a", Route::forward("b", 0.0)).unwrap();
        assert!(cx.add_route("b", Route::forward("a", 0.0)).is_err());
        assert!(cx.add_route("b", Route::forward("a", 5.0)).is_ok());
        assert!(cx.add_route("c", Route::forward("c", -1.0)).is_err());
    }

    #[test]
    fn table_routes_resize_and_clear() {
        let mut cx = gain_context();
        let id = cx.add_table("buf", 4).unwrap();
        cx.add_route("buf", Route::Table(id)).unwrap();
        cx.table_mut("buf").unwrap().samples_mut().fill(1.0);

        cx.send_float("buf", 8.0).unwrap();
        render(&mut cx, &[0.0; 4]);
        assert_eq!(cx.table("buf").unwrap().len(), 8);
        assert_eq!(&cx.table("buf").unwrap().samples()[..4], &[1.0; 4]);

        cx.send_symbol("buf", "clear").unwrap();
        render(&mut cx, &[0.0; 4]);
        assert!(cx.table("buf").unwrap().samples().iter().all(|&s| s == 0.0));

        // resizing to zero is refused and leaves the table alone
        cx.send_float("buf", 0.0).unwrap();
        render(&mut cx, &[0.0; 4]);
        assert_eq!(cx.table("buf").unwrap().len(), 8);
    }

    #[test]
    fn inline_and_interleaved_layouts() {
        let config = ContextConfig::new(1000.0).with_channels(2, 2);
        let mut cx = Context::with_config(config).unwrap();
        let l_in = cx.add_input(0).unwrap();
        let r_in = cx.add_input(1).unwrap();
        let l_out = cx.add_output(0).unwrap();
        let r_out = cx.add_output(1).unwrap();
        // swap channels
        cx.connect(l_in, r_out, 0).unwrap();
        cx.connect(r_in, l_out, 0).unwrap();
        cx.compile().unwrap();

        let input = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let mut output = [0.0; 8];
        assert_eq!(cx.process_inline(&input, &mut output, 4), Ok(4));
        assert_eq!(output, [2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0]);

        let input = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        assert_eq!(cx.process_interleaved(&input, &mut output, 4), Ok(4));
        assert_eq!(output, [2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0]);

        assert!(cx.process_inline(&input[..6], &mut output, 4).is_err());
    }

    #[test]
    fn short_buffers_scale_and_clip() {
        let config = ContextConfig::new(1000.0).with_channels(1, 2);
        let mut cx = Context::with_config(config).unwrap();
        let input = cx.add_input(0).unwrap();
        let double = cx.add_object(Box::new(Binop::new(BinopKind::Mul, 2.0)));
        let straight = cx.add_output(0).unwrap();
        let doubled = cx.add_output(1).unwrap();
        cx.connect(input, straight, 0).unwrap();
        cx.connect(input, double, 0).unwrap();
        cx.connect(double, doubled, 0).unwrap();
        cx.compile().unwrap();

        let input = [0, 1000, -16383, 32767];
        let mut output = [0i16; 8];
        assert_eq!(cx.process_inline_short(&input, &mut output, 4), Ok(4));
        // channel 0 round-trips, channel 1 doubles and clips at full scale
        assert_eq!(output, [0, 0, 1000, 2000, -16383, -32766, 32767, 32767]);

        let input = [i16::MIN; 4];
        assert_eq!(cx.process_inline_short(&input, &mut output, 4), Ok(4));
        assert_eq!(output, [-32767; 8]);

        assert!(cx.process_inline_short(&input[..3], &mut output, 4).is_err());
    }

    #[test]
    fn accessors_and_user_data() {
        let mut cx = Context::with_config(
            ContextConfig::new(44_100.0)
                .with_name("patch")
                .with_channels(1, 2),
        )
        .unwrap();
        assert_eq!(cx.name(), "patch");
        assert_eq!(cx.sample_rate(), 44_100.0);
        assert_eq!(cx.num_input_channels(), 1);
        assert_eq!(cx.num_output_channels(), 2);
        assert_eq!(cx.current_time_ms(), 0.0);
        assert!(cx.base_path().is_none());
        cx.set_base_path("/tmp/patch");
        assert_eq!(cx.base_path(), Some("/tmp/patch"));

        assert!(cx.set_user_data(Box::new(7u32)).is_none());
        assert_eq!(cx.user_data::<u32>(), Some(&7));
        assert!(cx.user_data::<String>().is_none());
        *cx.user_data_mut::<u32>().unwrap() += 1;
        assert_eq!(cx.user_data::<u32>(), Some(&8));
    }

    #[test]
    fn context_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Context>();
    }
}
