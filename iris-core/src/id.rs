//! Time-ordered 64-bit identifiers.
//!
//! Layout, most significant bit first:
//!
//! ```text
//! | 1 reserved | 39 timestamp (10ms ticks) | 8 sequence | 16 machine |
//! ```
//!
//! The machine field is the low half of the host's private IPv4 address, so
//! instances never coordinate. The sequence wraps silently: more than 256
//! identifiers in one tick on one host will repeat an earlier value.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::errors::{IrisError, IrisResult};

pub const TIMESTAMP_BITS: u32 = 39;
pub const SEQUENCE_BITS: u32 = 8;
pub const MACHINE_ID_BITS: u32 = 16;
pub const TICK_MILLIS: u64 = 10;

const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + MACHINE_ID_BITS;
const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const MACHINE_ID_MASK: u64 = (1 << MACHINE_ID_BITS) - 1;

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait TimeSource: Send + Sync {
    fn current_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// The fields of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    pub id: u64,
    pub reserved: u8,
    /// 10ms ticks since the Unix epoch.
    pub timestamp: u64,
    pub sequence: u8,
    pub machine_id: u16,
}

impl IdParts {
    pub fn decompose(id: u64) -> Self {
        Self {
            id,
            reserved: (id >> 63) as u8,
            timestamp: (id >> TIMESTAMP_SHIFT) & TIMESTAMP_MASK,
            sequence: ((id >> MACHINE_ID_BITS) & SEQUENCE_MASK) as u8,
            machine_id: (id & MACHINE_ID_MASK) as u16,
        }
    }

    /// Pack the fields back into an identifier. The reserved bit is always 0.
    pub fn compose(&self) -> u64 {
        pack(self.timestamp, self.sequence, self.machine_id)
    }

    pub fn timestamp_millis(&self) -> u64 {
        self.timestamp * TICK_MILLIS
    }
}

fn pack(ticks: u64, sequence: u8, machine_id: u16) -> u64 {
    (ticks & TIMESTAMP_MASK) << TIMESTAMP_SHIFT
        | u64::from(sequence) << MACHINE_ID_BITS
        | u64::from(machine_id)
}

/// One per process. Safe to share across request tasks.
pub struct IdGenerator<T: TimeSource = SystemClock> {
    sequence: Mutex<u8>,
    machine_id: u16,
    time: T,
}

impl IdGenerator<SystemClock> {
    /// Derive the machine field from the first private, non-loopback IPv4
    /// address. Fails with `NoPrivateAddress` when the host has none.
    pub fn new() -> IrisResult<Self> {
        let machine_id = machine_id_from_interfaces()?;
        tracing::info!(machine_id, "id generator ready");
        Ok(Self::with_machine_id(machine_id, SystemClock))
    }
}

impl<T: TimeSource> IdGenerator<T> {
    pub fn with_machine_id(machine_id: u16, time: T) -> Self {
        Self {
            sequence: Mutex::new(0),
            machine_id,
            time,
        }
    }

    pub fn machine_id(&self) -> u16 {
        self.machine_id
    }

    pub fn next_id(&self) -> u64 {
        let mut sequence = self.sequence.lock();
        *sequence = sequence.wrapping_add(1);
        // read under the lock so ids order with lock acquisition
        let ticks = self.time.current_millis() / TICK_MILLIS;
        pack(ticks, *sequence, self.machine_id)
    }

    pub fn decompose(id: u64) -> IdParts {
        IdParts::decompose(id)
    }
}

/// Low 16 bits of the first private IPv4 address in `addrs`.
pub fn machine_id_from<I>(addrs: I) -> Option<u16>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if !v4.is_loopback() && v4.is_private() => {
            let [_, _, c, d] = v4.octets();
            Some(u16::from_be_bytes([c, d]))
        }
        _ => None,
    })
}

fn machine_id_from_interfaces() -> IrisResult<u16> {
    let interfaces = if_addrs::get_if_addrs().map_err(|e| {
        IrisError::no_private_address(format!("cannot list network interfaces: {e}")).with_source(e)
    })?;

    machine_id_from(
        interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip()),
    )
    .ok_or_else(|| IrisError::no_private_address("no private IPv4 address on any interface"))
}
