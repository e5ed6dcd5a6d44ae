// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Canonical SCMI server configuration.
//!
//! The configuration is a densely indexed tree: one slot per agent id, one
//! channel per agent, and per channel one array per resource category. It is
//! produced by [`crate::build`] and handed to the embedded protocol engine by
//! ownership transfer; releasing it is an ordinary drop.

use crate::{
    bridge::ChannelProcessor,
    error::{Error, Result},
    platform::Platform,
};
use alloc::{string::String, vec::Vec};
use bitflags::bitflags;

bitflags! {
    /// Capabilities of a clock exposed through SCMI, read from the clock
    /// subnode `flags` property. Unknown bits are discarded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClockFlags: u32 {
        /// The agent may change the clock rate.
        const ALLOW_SET_RATE = 1 << 0;
    }
}

/// A shared-memory message buffer, mapped non-secure read/write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedMemory {
    /// Physical base address of the buffer.
    pub pa: u64,
    /// Mapped virtual address of the buffer.
    pub va: usize,
    /// Size of the buffer in bytes.
    pub size: usize,
}

/// Description of a clock domain.
pub struct ClockDomain<C> {
    /// Domain name exposed through SCMI.
    pub name: String,
    /// Clock controlled by the domain, or `None` for a placeholder entry.
    pub clock: Option<C>,
    /// Capabilities of the domain.
    pub flags: ClockFlags,
    /// Default state of the clock.
    pub enabled: bool,
}

impl<C> ClockDomain<C> {
    /// An inaccessible entry filling a domain id hole. SCMI
    /// requires every domain id in range to be defined even when the resource
    /// is not exposed.
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            clock: None,
            flags: ClockFlags::empty(),
            enabled: false,
        }
    }

    /// Returns whether the domain controls a real clock.
    pub fn is_accessible(&self) -> bool {
        self.clock.is_some()
    }
}

/// Description of a reset domain.
pub struct ResetDomain<R> {
    /// Domain name exposed through SCMI.
    pub name: String,
    /// Reset line controlled by the domain, or `None` for a placeholder.
    pub reset: Option<R>,
}

impl<R> ResetDomain<R> {
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            reset: None,
        }
    }

    /// Returns whether the domain controls a real reset line.
    pub fn is_accessible(&self) -> bool {
        self.reset.is_some()
    }
}

/// Description of a voltage domain.
pub struct VoltageDomain<V> {
    /// Domain name exposed through SCMI.
    pub name: String,
    /// Regulator controlled by the domain, or `None` for a placeholder.
    pub regulator: Option<V>,
    /// Default state of the regulator.
    pub enabled: bool,
}

impl<V> VoltageDomain<V> {
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            regulator: None,
            enabled: false,
        }
    }

    /// Returns whether the domain controls a real regulator.
    pub fn is_accessible(&self) -> bool {
        self.regulator.is_some()
    }
}

/// Description of a power domain. A power domain drives a clock and a supply
/// together.
pub struct PowerDomain<C, V> {
    /// Domain name exposed through SCMI.
    pub name: String,
    /// Clock controlled by the domain, or `None` for a placeholder.
    pub clock: Option<C>,
    /// Regulator controlled by the domain, or `None` for a placeholder.
    pub regulator: Option<V>,
}

impl<C, V> PowerDomain<C, V> {
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            clock: None,
            regulator: None,
        }
    }

    /// Returns whether the domain controls real resources.
    pub fn is_accessible(&self) -> bool {
        self.clock.is_some() || self.regulator.is_some()
    }
}

/// One operating point of a performance domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingPoint {
    /// Frequency in kHz.
    pub frequency_khz: u32,
    /// Supply voltage in mV.
    pub voltage_mv: u32,
}

/// Description of a DVFS/performance domain.
///
/// `operating_points` is ordered by increasing frequency, as the protocol
/// engine's DVFS module expects.
pub struct PerformanceDomain<C, V> {
    /// Domain name exposed through SCMI.
    pub name: String,
    /// Index of the initial operating point in `operating_points`.
    pub initial_opp: usize,
    /// Supported operating points, ascending by frequency.
    pub operating_points: Vec<OperatingPoint>,
    /// Clock used by the DVFS service.
    pub clock: C,
    /// Regulator used by the DVFS service.
    pub regulator: V,
}

/// SCMI channel resources.
pub struct ChannelConfig<P: Platform> {
    /// Channel name.
    pub name: String,
    /// Channel id within the owning agent (always 0 today).
    pub channel_id: u32,
    /// Global mailbox index, assigned sequentially in agent encounter order
    /// across all agents that use a mailbox. `None` for direct channels.
    pub mailbox_index: Option<u32>,
    /// Shared memory carrying the SCMI messages, if the agent declares one.
    pub shared_memory: Option<SharedMemory>,
    /// Clock domains exposed on the channel.
    pub clocks: Vec<ClockDomain<P::Clock>>,
    /// Reset domains exposed on the channel.
    pub resets: Vec<ResetDomain<P::Reset>>,
    /// Voltage domains exposed on the channel.
    pub voltage_domains: Vec<VoltageDomain<P::Regulator>>,
    /// Power domains exposed on the channel.
    pub power_domains: Vec<PowerDomain<P::Clock, P::Regulator>>,
    /// Performance domains exposed on the channel.
    pub performance_domains: Vec<PerformanceDomain<P::Clock, P::Regulator>>,
}

impl<P: Platform> ChannelConfig<P> {
    pub(crate) fn new(
        channel_id: u32,
        mailbox_index: Option<u32>,
        shared_memory: Option<SharedMemory>,
    ) -> Self {
        Self {
            name: String::from("channel"),
            channel_id,
            mailbox_index,
            shared_memory,
            clocks: Vec::new(),
            resets: Vec::new(),
            voltage_domains: Vec::new(),
            power_domains: Vec::new(),
            performance_domains: Vec::new(),
        }
    }
}

/// SCMI agent description.
pub struct AgentConfig<P: Platform> {
    /// Agent name exposed through SCMI, taken from the device-tree node name.
    pub name: String,
    /// Agent id exposed through SCMI.
    pub agent_id: u32,
    /// Channels exposed by the agent (length 1 today).
    pub channels: Vec<ChannelConfig<P>>,
}

impl<P: Platform> AgentConfig<P> {
    /// An empty slot for an agent id that was not discovered.
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            agent_id: 0,
            channels: Vec::new(),
        }
    }
}

/// The configuration exposed to the embedded protocol engine. Reserved slot 0
/// has already been stripped; `agents[0]` is the agent with the lowest id.
pub struct Config<P: Platform> {
    /// Agents exposed through SCMI, in ascending agent id slot order.
    pub agents: Vec<AgentConfig<P>>,
}

/// The canonical configuration as built, still carrying the reserved slot 0
/// which belongs to the server itself and is never exposed.
pub struct ServerConfig<P: Platform> {
    pub(crate) slots: Vec<AgentConfig<P>>,
}

impl<P: Platform> ServerConfig<P> {
    /// Strips the reserved server slot and returns the externally visible
    /// configuration.
    ///
    /// Consuming `self` makes the non-idempotent slot adjustment a one-shot
    /// operation by construction; there is no second call to guard against.
    pub fn into_configuration(mut self) -> Config<P> {
        assert!(!self.slots.is_empty());
        // Slot 0 is always empty: discovery rejects agent id 0.
        debug_assert!(self.slots[0].channels.is_empty());
        self.slots.remove(0);
        Config {
            agents: self.slots,
        }
    }

    /// Hands the configuration to the protocol engine, stripping the reserved
    /// slot first.
    pub fn start<E: ProtocolEngine<P>>(self, engine: &mut E) {
        engine.configure(self.into_configuration());
    }
}

/// The embedded SCMI protocol engine, as seen from this crate.
pub trait ProtocolEngine<P: Platform>: ChannelProcessor {
    /// One-shot configuration entry point, invoked with the full resource
    /// tree once the build has succeeded.
    fn configure(&mut self, config: Config<P>);
}

/// Allocates an empty table with room for `len` entries, reporting exhaustion
/// as an error instead of aborting. Rollback on failure is the drop of the
/// containers built so far.
pub(crate) fn reserve_table<T>(len: usize) -> Result<Vec<T>> {
    let mut table = Vec::new();
    table.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    Ok(table)
}

/// Appends `entry` to a growing table, reporting exhaustion as an error. The
/// table is unchanged on failure.
pub(crate) fn push_entry<T>(table: &mut Vec<T>, entry: T) -> Result<()> {
    table.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
    table.push(entry);
    Ok(())
}
