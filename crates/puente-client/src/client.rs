//! Client lifecycle and the application-side half of the block exchange.
//!
//! [`Client`] is the context object owning everything session-scoped: the
//! boxed engine, the port registry, the event latch, the sync flag, and the
//! application-side staging generations with their channel endpoints. The
//! real-time half lives inside the process callback and is reached only
//! through the state mailbox (see [`process`](crate::process)).
//!
//! Lifecycle: `Detached → attach → Attached → activate → Active`, with
//! `deactivate` stepping back to Attached and `detach` (from any state)
//! back to Detached. Port registration and therefore geometry changes are
//! only legal while Attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use puente_core::{
    BlockBuffer, BlockLayout, BlockReceiver, BlockSender, Direction, EventFlags, EventLatch,
    PortFlags, PortRegistry, SampleMatrix, SyncFlag, block_channel, gather_block, scatter_block,
};
use tracing::{debug, info, warn};

use crate::engine::{
    AudioEngine, EngineCallbacks, NotifyCallback, ProcessCallback, SampleRateCallback,
};
use crate::process::{RtState, process_callback};
use crate::{Error, Result};

/// Retired real-time states awaiting an application-side free.
///
/// At most one state is replaced per activation, and the queue is drained on
/// every activate, deactivate, and detach; four slots is comfortable slack.
const RETIRE_SLOTS: usize = 4;

/// Lifecycle position of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No engine session.
    Detached,
    /// Session open; ports may be registered; the callback is idle.
    Attached,
    /// The engine is invoking the process callback every period.
    Active,
}

/// Clonable handle that winds a session down from any thread.
///
/// Raising it latches the sticky hangup flag (visible to the next
/// [`Client::poll_events`]) and marks the connection dead, after which
/// engine-touching operations report [`Error::NotConnected`]. It does not
/// interrupt an exchange already blocked on the engine.
#[derive(Debug, Clone)]
pub struct HangupSignal {
    events: Arc<EventLatch>,
    alive: Arc<AtomicBool>,
}

impl HangupSignal {
    /// Latches hangup and marks the connection dead.
    pub fn raise(&self) {
        warn!("hangup raised");
        self.events.note_hangup();
        self.alive.store(false, Ordering::Release);
    }
}

/// Application-side halves of the exchange: one staging generation and one
/// channel endpoint per direction.
struct AppSide {
    input_staging: BlockBuffer,
    output_staging: BlockBuffer,
    from_engine: BlockReceiver,
    to_engine: BlockSender,
}

/// A client session against an external audio engine.
///
/// Owns the full exchange machinery and delegates everything graph-shaped
/// to the engine. All methods take `&mut self` or `&self` on one thread;
/// the only supported cross-thread touchpoints are [`HangupSignal`] and the
/// channels inside.
pub struct Client {
    engine: Box<dyn AudioEngine>,
    state: ClientState,
    client_name: Option<String>,
    frames_per_block: usize,
    ports: PortRegistry,
    events: Arc<EventLatch>,
    alive: Arc<AtomicBool>,
    sync: SyncFlag,
    side: Option<AppSide>,
    pending_rt: Option<RtState>,
    rt_tx: Option<Sender<RtState>>,
    retired_rx: Option<Receiver<RtState>>,
}

impl Client {
    /// Wraps an engine; the client starts Detached.
    pub fn new(engine: Box<dyn AudioEngine>) -> Self {
        Self {
            engine,
            state: ClientState::Detached,
            client_name: None,
            frames_per_block: 0,
            ports: PortRegistry::new(),
            events: Arc::new(EventLatch::new()),
            alive: Arc::new(AtomicBool::new(false)),
            sync: SyncFlag::new(),
            side: None,
            pending_rt: None,
            rt_tx: None,
            retired_rx: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The session name, while attached.
    pub fn name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Opens an engine session under `name` and wires every callback.
    ///
    /// Captures the engine's frames-per-period for the whole session and
    /// resets the event latch, so stale notifications from an earlier
    /// session cannot leak into this one. On engine failure the client
    /// stays Detached.
    pub fn attach(&mut self, name: &str) -> Result<()> {
        if self.state != ClientState::Detached {
            return Err(Error::Usage("a session is already attached".into()));
        }

        self.events.reset();
        self.alive.store(true, Ordering::Release);
        self.sync.reset();

        let (rt_tx, rt_rx) = crossbeam_channel::unbounded();
        let (retired_tx, retired_rx) = crossbeam_channel::bounded(RETIRE_SLOTS);
        let callbacks = self.callback_bundle(process_callback(rt_rx, retired_tx));
        self.engine.open(name, callbacks)?;

        self.rt_tx = Some(rt_tx);
        self.retired_rx = Some(retired_rx);
        self.frames_per_block = self.engine.buffer_size() as usize;
        self.ports.clear();
        self.client_name = Some(name.to_owned());
        self.state = ClientState::Attached;
        self.rebuild_exchange();

        info!(
            client = name,
            engine = self.engine.name(),
            frames_per_block = self.frames_per_block,
            sample_rate = self.engine.sample_rate(),
            "attached"
        );
        Ok(())
    }

    /// Tears the session down and resets every client-side resource.
    ///
    /// Idempotent and infallible: from Active it first asks the engine to
    /// deactivate, then closes; engine complaints during teardown are
    /// logged, not returned. Latched events stay readable afterwards.
    pub fn detach(&mut self) {
        if self.state == ClientState::Detached {
            return;
        }

        if self.state == ClientState::Active && self.alive.load(Ordering::Acquire) {
            if let Err(err) = self.engine.deactivate() {
                debug!(%err, "deactivate during detach failed");
            }
        }
        if let Err(err) = self.engine.close() {
            debug!(%err, "engine close during detach failed");
        }

        self.state = ClientState::Detached;
        self.client_name = None;
        self.ports.clear();
        self.side = None;
        self.pending_rt = None;
        self.drain_retired();
        self.rt_tx = None;
        self.retired_rx = None;
        self.sync.reset();
        self.alive.store(false, Ordering::Release);
        info!("detached");
    }

    /// Registers a port under this session and rebuilds the exchange
    /// geometry around the new port count.
    ///
    /// Only legal while Attached (not Active). `flags` must include at
    /// least one direction bit; a port carrying both lands in both
    /// direction tables. Each direction accepts at most
    /// [`puente_core::MAX_PORTS_PER_DIRECTION`] ports; the cap is enforced
    /// before the engine is asked to create anything.
    pub fn register_port(&mut self, name: &str, flags: PortFlags) -> Result<()> {
        self.ensure_attached()?;
        if self.state == ClientState::Active {
            return Err(Error::Usage(
                "ports cannot be registered while the client is active".into(),
            ));
        }
        if !flags.intersects(PortFlags::INPUT.union(PortFlags::OUTPUT)) {
            return Err(Error::Usage(
                "port flags must include a direction (input or output)".into(),
            ));
        }
        self.ports
            .ensure_capacity(flags)
            .map_err(|full| Error::Usage(full.to_string()))?;

        let handle = self.engine.register_port(name, flags)?;
        self.ports.insert(name, handle, flags);
        self.rebuild_exchange();

        debug!(
            port = name,
            flags = flags.bits(),
            inputs = self.ports.count(Direction::Input),
            outputs = self.ports.count(Direction::Output),
            "registered port"
        );
        Ok(())
    }

    /// Starts the engine invoking the process callback.
    ///
    /// Publishes any pending exchange geometry to the callback first, so
    /// its first period already runs the current port set. The sync flag
    /// restarts desynchronized and recovers on the first delivered block.
    pub fn activate(&mut self) -> Result<()> {
        self.ensure_attached()?;
        if self.state == ClientState::Active {
            return Err(Error::Usage("client is already active".into()));
        }

        self.drain_retired();
        self.sync.reset();
        if let Some(state) = self.pending_rt.take() {
            self.publish_rt(state)?;
        }
        self.engine.activate()?;
        self.state = ClientState::Active;
        info!("activated");
        Ok(())
    }

    /// Stops per-period invocation; the session and its ports survive.
    pub fn deactivate(&mut self) -> Result<()> {
        self.ensure_attached()?;
        if self.state != ClientState::Active {
            return Err(Error::Usage("client is not active".into()));
        }

        self.engine.deactivate()?;
        self.state = ClientState::Attached;
        self.drain_retired();
        info!("deactivated");
        Ok(())
    }

    /// Routes `source` into `destination` in the engine graph.
    ///
    /// Ports owned by this client can only be connected while Active: an
    /// inactive client's ports carry no data, so the engine would accept a
    /// route that cannot work yet.
    pub fn connect(&mut self, source: &str, destination: &str) -> Result<()> {
        self.ensure_attached()?;
        if self.state != ClientState::Active
            && (self.engine.owns_port(source)? || self.engine.owns_port(destination)?)
        {
            return Err(Error::Usage(
                "client must be active before connecting its own ports".into(),
            ));
        }
        self.engine.connect_ports(source, destination)?;
        debug!(source, destination, "connected");
        Ok(())
    }

    /// Removes the `source` → `destination` route in the engine graph.
    pub fn disconnect(&mut self, source: &str, destination: &str) -> Result<()> {
        self.ensure_attached()?;
        self.engine.disconnect_ports(source, destination)?;
        debug!(source, destination, "disconnected");
        Ok(())
    }

    /// Full names of every port in the engine graph (not just this
    /// client's).
    pub fn list_ports(&self) -> Result<Vec<String>> {
        self.ensure_attached()?;
        Ok(self.engine.port_names()?)
    }

    /// Flags of the named port, as the engine reports them.
    pub fn port_flags(&self, name: &str) -> Result<PortFlags> {
        self.ensure_attached()?;
        Ok(self.engine.port_flags(name)?)
    }

    /// Full names of every port connected to the named port.
    pub fn connections(&self, name: &str) -> Result<Vec<String>> {
        self.ensure_attached()?;
        Ok(self.engine.port_connections(name)?)
    }

    /// Frames per period, as currently reported by the engine.
    pub fn buffer_size(&self) -> Result<u32> {
        self.ensure_attached()?;
        Ok(self.engine.buffer_size())
    }

    /// Sample rate in Hz, as currently reported by the engine.
    pub fn sample_rate(&self) -> Result<u32> {
        self.ensure_attached()?;
        Ok(self.engine.sample_rate())
    }

    /// Drains the sticky event flags.
    ///
    /// Callable in any state; `attach` clears leftovers from earlier
    /// sessions, and flags latched before a detach stay readable after it.
    pub fn poll_events(&self) -> EventFlags {
        self.events.poll()
    }

    /// A handle for winding the session down from another thread.
    pub fn hangup_signal(&self) -> HangupSignal {
        HangupSignal {
            events: Arc::clone(&self.events),
            alive: Arc::clone(&self.alive),
        }
    }

    /// Exchanges one block with the engine: plays `output`, fills `input`.
    ///
    /// This is the rate-matching point: the call blocks until the engine
    /// has produced the period's input block, then scatters it into
    /// `input`, gathers `output`, and offers it to the engine without
    /// blocking.
    ///
    /// Matrix shapes must match the registered geometry (rows equal to the
    /// direction's port count, columns equal to `frames_per_block`), except
    /// that a direction with zero ports ignores its matrix entirely. Shape
    /// violations are reported before anything touches the channels.
    ///
    /// # Errors
    ///
    /// - [`Error::Usage`] when not Active.
    /// - [`Error::Validation`] on a shape mismatch (no channel I/O happens).
    /// - [`Error::InputDesync`] when the engine's last capture send did not
    ///   go through; `input` still receives the stale block, and the output
    ///   half is skipped.
    /// - [`Error::OutputDesync`] when the engine-bound channel would not
    ///   accept this period's output block.
    /// - [`Error::NotConnected`] when the connection died (engine shutdown
    ///   or hangup), or the engine side closed the channel mid-wait.
    pub fn exchange(&mut self, output: &SampleMatrix, input: &mut SampleMatrix) -> Result<()> {
        self.ensure_attached()?;
        if self.state != ClientState::Active {
            return Err(Error::Usage("client is not active".into()));
        }

        let inputs = self.ports.count(Direction::Input);
        let outputs = self.ports.count(Direction::Output);
        let frames = self.frames_per_block;
        if outputs > 0 && (output.rows() != outputs || output.cols() != frames) {
            return Err(Error::Validation(format!(
                "output matrix must be {outputs}x{frames} (ports x frames), got {}x{}",
                output.rows(),
                output.cols()
            )));
        }
        if inputs > 0 && (input.rows() != inputs || input.cols() != frames) {
            return Err(Error::Validation(format!(
                "input matrix must be {inputs}x{frames} (ports x frames), got {}x{}",
                input.rows(),
                input.cols()
            )));
        }

        let Some(side) = self.side.as_mut() else {
            return Err(Error::NotConnected);
        };

        side.from_engine
            .recv_block(side.input_staging.as_mut_slice())
            .map_err(|_| Error::NotConnected)?;
        if inputs > 0 {
            scatter_block(&side.input_staging, input);
        }

        // The stale block was scattered above on purpose: the caller sees
        // what the engine last managed to hand over, and the error tells
        // them not to trust it.
        if !self.sync.is_synced() {
            return Err(Error::InputDesync);
        }

        if outputs > 0 {
            gather_block(output, &mut side.output_staging);
        }
        if !side.to_engine.try_send_block(side.output_staging.as_slice()) {
            return Err(Error::OutputDesync);
        }
        Ok(())
    }

    /// Builds fresh staging generations, channels, and the pending
    /// real-time state for the current port counts.
    ///
    /// Runs on attach and after every registration, always while the
    /// callback is idle, so all allocation happens here and never once the
    /// engine is running the callback.
    fn rebuild_exchange(&mut self) {
        let frames = self.frames_per_block;
        let input_layout = BlockLayout::new(self.ports.count(Direction::Input), frames);
        let output_layout = BlockLayout::new(self.ports.count(Direction::Output), frames);

        let (to_app, from_engine) = block_channel(input_layout.len());
        let (to_engine, from_app) = block_channel(output_layout.len());

        self.sync.reset();
        self.side = Some(AppSide {
            input_staging: BlockBuffer::new(input_layout),
            output_staging: BlockBuffer::new(output_layout),
            from_engine,
            to_engine,
        });
        self.pending_rt = Some(RtState {
            frames,
            input_handles: self.ports.handles(Direction::Input),
            output_handles: self.ports.handles(Direction::Output),
            capture: BlockBuffer::new(input_layout),
            playback: BlockBuffer::new(output_layout),
            to_app,
            from_app,
            sync: self.sync.clone(),
        });
    }

    /// Bundles the process callback with latch-driven notification
    /// callbacks.
    fn callback_bundle(&self, process: ProcessCallback) -> EngineCallbacks {
        let rate_latch = Arc::clone(&self.events);
        let on_sample_rate_change: SampleRateCallback = Box::new(move |rate| {
            debug!(rate, "sample rate change notified");
            rate_latch.note_sample_rate_change();
        });

        let reorder_latch = Arc::clone(&self.events);
        let on_graph_reorder: NotifyCallback = Box::new(move || {
            reorder_latch.note_graph_reorder();
        });

        let ports_latch = Arc::clone(&self.events);
        let on_port_registration: NotifyCallback = Box::new(move || {
            ports_latch.note_port_registration();
        });

        let shutdown_latch = Arc::clone(&self.events);
        let shutdown_alive = Arc::clone(&self.alive);
        let on_shutdown: NotifyCallback = Box::new(move || {
            warn!("engine shut the session down");
            shutdown_latch.note_shutdown();
            shutdown_alive.store(false, Ordering::Release);
        });

        EngineCallbacks {
            process,
            on_sample_rate_change,
            on_graph_reorder,
            on_port_registration,
            on_shutdown,
        }
    }

    /// Not-connected gate shared by every engine-touching operation.
    fn ensure_attached(&self) -> Result<()> {
        if self.state == ClientState::Detached || !self.alive.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn publish_rt(&mut self, state: RtState) -> Result<()> {
        let Some(tx) = self.rt_tx.as_ref() else {
            return Err(Error::NotConnected);
        };
        tx.send(state).map_err(|_| Error::NotConnected)
    }

    /// Frees real-time states the callback has swapped out.
    fn drain_retired(&mut self) {
        if let Some(rx) = self.retired_rx.as_ref() {
            while rx.try_recv().is_ok() {}
        }
    }
}
