//! Port identity, direction flags, and the per-direction registration table.
//!
//! Ports are created by the audio engine; this module only tracks what the
//! client has registered, in registration order. That order matters: it is
//! the channel order used by the block copy routines in
//! [`block`](crate::block).
//!
//! # Capacity
//!
//! Each direction holds at most [`MAX_PORTS_PER_DIRECTION`] ports. The cap is
//! checked with [`PortRegistry::ensure_capacity`] *before* asking the engine
//! to create anything, so a rejected registration leaves both the table and
//! the engine untouched.

use core::fmt;

/// Hard upper bound on registered ports per direction.
pub const MAX_PORTS_PER_DIRECTION: usize = 256;

/// Bit-set of port capabilities and directions.
///
/// The two direction bits decide which tables a registration lands in; the
/// remaining bits describe engine-side properties reported by port queries.
///
/// # Example
///
/// ```rust
/// use puente_core::PortFlags;
///
/// let flags = PortFlags::INPUT.union(PortFlags::PHYSICAL);
/// assert!(flags.contains(PortFlags::INPUT));
/// assert!(!flags.contains(PortFlags::OUTPUT));
/// assert!(flags.intersects(PortFlags::INPUT.union(PortFlags::OUTPUT)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortFlags(u32);

impl PortFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Port receives data from the graph.
    pub const INPUT: Self = Self(1);
    /// Port feeds data into the graph.
    pub const OUTPUT: Self = Self(1 << 1);
    /// Port corresponds to a physical device connector.
    pub const PHYSICAL: Self = Self(1 << 2);
    /// Engine can route this port to a monitor mix.
    pub const CAN_MONITOR: Self = Self(1 << 3);
    /// Port terminates a signal chain (no passthrough behind it).
    pub const TERMINAL: Self = Self(1 << 4);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if any bit is shared between `self` and `other`.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Reconstructs a flag set from raw bits (unknown bits are kept).
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

/// Data-flow direction of a port, seen from the engine graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Engine → client: the client captures from these ports.
    Input,
    /// Client → engine: the client plays back through these ports.
    Output,
}

impl Direction {
    /// The flag bit that selects this direction at registration time.
    #[inline]
    pub const fn flag(self) -> PortFlags {
        match self {
            Direction::Input => PortFlags::INPUT,
            Direction::Output => PortFlags::OUTPUT,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Opaque engine-assigned token identifying a registered port.
///
/// Handles are minted by the engine at registration and stay valid until the
/// client detaches. The registry never interprets the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle(u64);

impl PortHandle {
    /// Wraps a raw engine token.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw engine token.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// One registered port: the short name the client asked for plus the handle
/// the engine answered with.
#[derive(Debug, Clone)]
pub struct RegisteredPort {
    /// Short (client-local) port name.
    pub name: String,
    /// Engine token for per-cycle buffer access.
    pub handle: PortHandle,
}

/// A direction's port table has hit [`MAX_PORTS_PER_DIRECTION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{direction} port table is full ({MAX_PORTS_PER_DIRECTION} ports)")]
pub struct DirectionFull {
    /// The direction whose table is exhausted.
    pub direction: Direction,
}

/// Per-direction tables of registered ports, in registration order.
#[derive(Debug, Default)]
pub struct PortRegistry {
    inputs: Vec<RegisteredPort>,
    outputs: Vec<RegisteredPort>,
}

impl PortRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that every direction named in `flags` still has room.
    ///
    /// Inputs are checked before outputs; a registration carrying both
    /// direction bits needs room in both tables.
    pub fn ensure_capacity(&self, flags: PortFlags) -> Result<(), DirectionFull> {
        if flags.contains(PortFlags::INPUT) && self.inputs.len() >= MAX_PORTS_PER_DIRECTION {
            return Err(DirectionFull {
                direction: Direction::Input,
            });
        }
        if flags.contains(PortFlags::OUTPUT) && self.outputs.len() >= MAX_PORTS_PER_DIRECTION {
            return Err(DirectionFull {
                direction: Direction::Output,
            });
        }
        Ok(())
    }

    /// Appends a port to every direction named in `flags`.
    ///
    /// Callers must have passed [`ensure_capacity`](Self::ensure_capacity)
    /// for the same flags first.
    pub fn insert(&mut self, name: &str, handle: PortHandle, flags: PortFlags) {
        debug_assert!(self.ensure_capacity(flags).is_ok());
        if flags.contains(PortFlags::INPUT) {
            self.inputs.push(RegisteredPort {
                name: name.to_owned(),
                handle,
            });
        }
        if flags.contains(PortFlags::OUTPUT) {
            self.outputs.push(RegisteredPort {
                name: name.to_owned(),
                handle,
            });
        }
    }

    /// Number of ports registered for `direction`.
    #[inline]
    pub fn count(&self, direction: Direction) -> usize {
        self.table(direction).len()
    }

    /// Registered ports for `direction`, in registration (= channel) order.
    #[inline]
    pub fn ports(&self, direction: Direction) -> &[RegisteredPort] {
        self.table(direction)
    }

    /// Engine handles for `direction`, in channel order.
    pub fn handles(&self, direction: Direction) -> Vec<PortHandle> {
        self.table(direction).iter().map(|p| p.handle).collect()
    }

    /// Drops every registration (used on detach).
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    fn table(&self, direction: Direction) -> &[RegisteredPort] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }
}
