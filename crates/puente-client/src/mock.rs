//! A deterministic in-process engine for tests and examples.
//!
//! [`MockEngine`] implements [`AudioEngine`] over shared in-memory state,
//! and its [`MockController`] plays the role of the audio server: it runs
//! process periods on demand, feeds capture data into ports, reads what the
//! client played back, and fires notifications. Nothing here spawns a
//! thread or waits on a clock, so tests drive the exchange period by period
//! and every outcome is reproducible.
//!
//! The controller may be driven from a second thread when a test needs the
//! blocking half of the exchange; the shared state sits behind a mutex
//! either way.

use std::sync::{Arc, Mutex, MutexGuard};

use puente_core::{PortFlags, PortHandle};

use crate::engine::{AudioEngine, EngineCallbacks, EngineError, PortIo};

/// Construction-time knobs for [`MockEngine`].
#[derive(Debug, Clone)]
pub struct MockEngineConfig {
    /// Frames per process period.
    pub buffer_size: u32,
    /// Initial sample rate in Hz.
    pub sample_rate: u32,
    /// Ports that exist before any client registers, as `(full name,
    /// flags)`. Stands in for an engine's hardware ports.
    pub ambient_ports: Vec<(String, PortFlags)>,
}

impl Default for MockEngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 128,
            sample_rate: 48_000,
            ambient_ports: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct MockPort {
    full_name: String,
    handle: PortHandle,
    flags: PortFlags,
    /// Registered by the open client, as opposed to ambient.
    owned: bool,
    /// One period of samples. Written by [`MockController::set_input`] and
    /// by the process callback's playback scatter.
    data: Vec<f32>,
}

#[derive(Debug)]
struct MockState {
    config: MockEngineConfig,
    client_name: Option<String>,
    callbacks: Option<EngineCallbacks>,
    active: bool,
    ports: Vec<MockPort>,
    connections: Vec<(String, String)>,
    next_handle: u64,
    cycles_run: u64,
}

impl MockState {
    fn new(config: MockEngineConfig) -> Self {
        let frames = config.buffer_size as usize;
        let mut next_handle = 0;
        let ports = config
            .ambient_ports
            .iter()
            .map(|(name, flags)| {
                let handle = PortHandle::new(next_handle);
                next_handle += 1;
                MockPort {
                    full_name: name.clone(),
                    handle,
                    flags: *flags,
                    owned: false,
                    data: vec![0.0; frames],
                }
            })
            .collect();
        Self {
            config,
            client_name: None,
            callbacks: None,
            active: false,
            ports,
            connections: Vec::new(),
            next_handle,
            cycles_run: 0,
        }
    }

    fn port(&self, name: &str) -> Option<&MockPort> {
        self.ports.iter().find(|port| port.full_name == name)
    }

    /// Drops the open client's footprint: owned ports and any connection
    /// touching one.
    fn evict_client(&mut self) {
        let owned: Vec<String> = self
            .ports
            .iter()
            .filter(|port| port.owned)
            .map(|port| port.full_name.clone())
            .collect();
        self.connections
            .retain(|(a, b)| !owned.contains(a) && !owned.contains(b));
        self.ports.retain(|port| !port.owned);
        self.client_name = None;
        self.callbacks = None;
        self.active = false;
    }
}

fn lock(shared: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Port views handed to the process callback for one period.
struct MockPortIo<'a> {
    frames: usize,
    ports: &'a mut [MockPort],
}

impl MockPortIo<'_> {
    fn index_of(&self, handle: PortHandle) -> usize {
        self.ports
            .iter()
            .position(|port| port.handle == handle)
            .unwrap_or_else(|| panic!("no port with handle {handle:?}"))
    }
}

impl PortIo for MockPortIo<'_> {
    fn frames(&self) -> usize {
        self.frames
    }

    fn input(&self, port: PortHandle) -> &[f32] {
        &self.ports[self.index_of(port)].data
    }

    fn output(&mut self, port: PortHandle) -> &mut [f32] {
        let index = self.index_of(port);
        &mut self.ports[index].data
    }
}

/// An [`AudioEngine`] backed by plain shared memory.
///
/// Box it into a [`Client`](crate::Client) and keep the
/// [`controller`](Self::controller) on the test side:
///
/// ```rust,ignore
/// let engine = MockEngine::new(MockEngineConfig::default());
/// let controller = engine.controller();
/// let mut client = Client::new(Box::new(engine));
/// ```
#[derive(Debug)]
pub struct MockEngine {
    shared: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// Builds an engine with the given clocking and ambient ports.
    pub fn new(config: MockEngineConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(MockState::new(config))),
        }
    }

    /// The server-side handle onto the same engine.
    pub fn controller(&self) -> MockController {
        MockController {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl AudioEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn open(&mut self, client_name: &str, callbacks: EngineCallbacks) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        if state.client_name.is_some() {
            return Err(EngineError::new("a client is already open"));
        }
        state.client_name = Some(client_name.to_owned());
        state.callbacks = Some(callbacks);
        state.active = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        // Idempotent: closing a session that is already gone is a no-op.
        lock(&self.shared).evict_client();
        Ok(())
    }

    fn register_port(&mut self, name: &str, flags: PortFlags) -> Result<PortHandle, EngineError> {
        let mut state = lock(&self.shared);
        let Some(client) = state.client_name.as_ref() else {
            return Err(EngineError::new("no client is open"));
        };
        let full_name = format!("{client}:{name}");
        if state.port(&full_name).is_some() {
            return Err(EngineError::new(format!(
                "port {full_name} already exists"
            )));
        }
        let handle = PortHandle::new(state.next_handle);
        state.next_handle += 1;
        let frames = state.config.buffer_size as usize;
        state.ports.push(MockPort {
            full_name,
            handle,
            flags,
            owned: true,
            data: vec![0.0; frames],
        });
        Ok(handle)
    }

    fn activate(&mut self) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        if state.client_name.is_none() {
            return Err(EngineError::new("no client is open"));
        }
        if state.active {
            return Err(EngineError::new("client is already active"));
        }
        state.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        if !state.active {
            return Err(EngineError::new("client is not active"));
        }
        state.active = false;
        Ok(())
    }

    fn connect_ports(&mut self, source: &str, destination: &str) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        let Some(src) = state.port(source) else {
            return Err(EngineError::new(format!("no port named {source}")));
        };
        if !src.flags.contains(PortFlags::OUTPUT) {
            return Err(EngineError::new(format!("{source} is not an output port")));
        }
        let Some(dst) = state.port(destination) else {
            return Err(EngineError::new(format!("no port named {destination}")));
        };
        if !dst.flags.contains(PortFlags::INPUT) {
            return Err(EngineError::new(format!(
                "{destination} is not an input port"
            )));
        }
        let edge = (source.to_owned(), destination.to_owned());
        if state.connections.contains(&edge) {
            return Err(EngineError::new(format!(
                "{source} and {destination} are already connected"
            )));
        }
        state.connections.push(edge);
        Ok(())
    }

    fn disconnect_ports(&mut self, source: &str, destination: &str) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        let before = state.connections.len();
        state
            .connections
            .retain(|(a, b)| !(a == source && b == destination));
        if state.connections.len() == before {
            return Err(EngineError::new(format!(
                "{source} and {destination} are not connected"
            )));
        }
        Ok(())
    }

    fn port_names(&self) -> Result<Vec<String>, EngineError> {
        let state = lock(&self.shared);
        Ok(state
            .ports
            .iter()
            .map(|port| port.full_name.clone())
            .collect())
    }

    fn port_flags(&self, name: &str) -> Result<PortFlags, EngineError> {
        let state = lock(&self.shared);
        state
            .port(name)
            .map(|port| port.flags)
            .ok_or_else(|| EngineError::new(format!("no port named {name}")))
    }

    fn port_connections(&self, name: &str) -> Result<Vec<String>, EngineError> {
        let state = lock(&self.shared);
        if state.port(name).is_none() {
            return Err(EngineError::new(format!("no port named {name}")));
        }
        Ok(state
            .connections
            .iter()
            .filter_map(|(a, b)| {
                if a == name {
                    Some(b.clone())
                } else if b == name {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect())
    }

    fn owns_port(&self, name: &str) -> Result<bool, EngineError> {
        let state = lock(&self.shared);
        state
            .port(name)
            .map(|port| port.owned)
            .ok_or_else(|| EngineError::new(format!("no port named {name}")))
    }

    fn buffer_size(&self) -> u32 {
        lock(&self.shared).config.buffer_size
    }

    fn sample_rate(&self) -> u32 {
        lock(&self.shared).config.sample_rate
    }
}

/// Drives a [`MockEngine`] the way the audio server would.
#[derive(Debug, Clone)]
pub struct MockController {
    shared: Arc<Mutex<MockState>>,
}

impl MockController {
    /// Runs one process period if the client is active.
    ///
    /// Inert when no client is open, the client is inactive, or the session
    /// has been shut down, exactly like a server that has nothing to call.
    pub fn run_cycle(&self) {
        let mut state = lock(&self.shared);
        if !state.active {
            return;
        }
        let Some(mut callbacks) = state.callbacks.take() else {
            return;
        };
        let frames = state.config.buffer_size as usize;
        let mut io = MockPortIo {
            frames,
            ports: &mut state.ports,
        };
        (callbacks.process)(&mut io);
        state.cycles_run += 1;
        state.callbacks = Some(callbacks);
    }

    /// Fills a port's period buffer, as upstream audio would.
    ///
    /// # Panics
    ///
    /// Panics when the port does not exist or `samples` is not exactly one
    /// period long; both are test bugs.
    pub fn set_input(&self, name: &str, samples: &[f32]) {
        let mut state = lock(&self.shared);
        let frames = state.config.buffer_size as usize;
        assert_eq!(
            samples.len(),
            frames,
            "set_input needs one full period of samples"
        );
        let port = state
            .ports
            .iter_mut()
            .find(|port| port.full_name == name)
            .unwrap_or_else(|| panic!("no port named {name}"));
        port.data.copy_from_slice(samples);
    }

    /// Snapshot of a port's period buffer, after any playback scatter.
    ///
    /// # Panics
    ///
    /// Panics when the port does not exist.
    pub fn output_of(&self, name: &str) -> Vec<f32> {
        let state = lock(&self.shared);
        state
            .port(name)
            .map(|port| port.data.clone())
            .unwrap_or_else(|| panic!("no port named {name}"))
    }

    /// Fires the graph-reorder notification.
    pub fn fire_graph_reorder(&self) {
        let mut state = lock(&self.shared);
        if let Some(callbacks) = state.callbacks.as_mut() {
            (callbacks.on_graph_reorder)();
        }
    }

    /// Fires the port-registration notification.
    pub fn fire_port_registration(&self) {
        let mut state = lock(&self.shared);
        if let Some(callbacks) = state.callbacks.as_mut() {
            (callbacks.on_port_registration)();
        }
    }

    /// Changes the engine sample rate and notifies the client.
    pub fn set_sample_rate(&self, rate: u32) {
        let mut state = lock(&self.shared);
        state.config.sample_rate = rate;
        if let Some(callbacks) = state.callbacks.as_mut() {
            (callbacks.on_sample_rate_change)(rate);
        }
    }

    /// Kills the session from the server side.
    ///
    /// Fires the shutdown notification, then drops the callback bundle.
    /// Dropping the process callback closes its channel endpoints, which
    /// unblocks an application thread waiting in an exchange.
    pub fn shutdown(&self) {
        let mut state = lock(&self.shared);
        if let Some(mut callbacks) = state.callbacks.take() {
            (callbacks.on_shutdown)();
        }
        state.evict_client();
    }

    /// Connection pairs currently in the graph.
    pub fn connections(&self) -> Vec<(String, String)> {
        lock(&self.shared).connections.clone()
    }

    /// How many process periods have run.
    pub fn cycles(&self) -> u64 {
        lock(&self.shared).cycles_run
    }
}
