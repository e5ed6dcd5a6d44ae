// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Canonical configuration build.
//!
//! Turns the discovered agent list into the dense slot table the protocol
//! engine consumes: one slot per agent id including the reserved server
//! slot 0, one channel per agent, and the per-channel resource arrays filled
//! in by the consumer registrars. The build runs in two passes: every agent
//! gets its channel allocated and its bridge registered with the
//! notification dispatcher first, then the registrars resolve resources. A
//! doorbell arriving early therefore finds a live handler, and no resource
//! is attached before the full channel table exists.

use crate::bridge::{ChannelBridge, NotificationDispatcher};
use crate::config::{AgentConfig, ChannelConfig, ServerConfig, push_entry, reserve_table};
use crate::consumers::{clock, perf, power_domain, regulator, reset};
use crate::discover::{DiscoveredAgent, Transport};
use crate::error::{BindingViolation, Result};
use crate::platform::Platform;
use alloc::vec::Vec;
use fdt::Fdt;
use log::error;
use num_enum::TryFromPrimitive;

/// SCMI protocol ids accepted as `protocol@*` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum ProtocolId {
    /// Power domain management.
    PowerDomain = 0x11,
    /// Performance domain management. Never declared as a protocol node;
    /// performance data comes from the OPP table.
    PerformanceDomain = 0x13,
    /// Clock management.
    Clock = 0x14,
    /// Reset domain management.
    ResetDomain = 0x16,
    /// Voltage domain management.
    VoltageDomain = 0x17,
}

/// Builds the canonical configuration from the discovered agents.
///
/// On error everything built so far, including resources attached to earlier
/// agents, is released by drop. Bridges already handed to the dispatcher stay
/// registered; their channels simply never become part of a configuration.
pub fn build<'a, P: Platform, D: NotificationDispatcher<P>>(
    fdt: &'a Fdt<'a>,
    platform: &mut P,
    agents: Vec<DiscoveredAgent<'a, P>>,
    dispatcher: &mut D,
) -> Result<ServerConfig<P>> {
    // Slot 0 is the server's own reserved entry, so the table spans
    // [0, max agent id] even when ids are sparse.
    let slot_count = agents.iter().map(|a| a.agent_id).max().unwrap_or(0) as usize + 1;
    let mut slots = reserve_table(slot_count)?;
    for _ in 0..slot_count {
        slots.push(AgentConfig::placeholder());
    }

    // First pass: allocate every agent's channel and register mailbox
    // bridges with the dispatcher.
    let mut pending = reserve_table(slot_count)?;
    let mut next_mailbox_index = 0;
    for agent in agents {
        let DiscoveredAgent {
            name,
            agent_id,
            transport,
            shared_memory,
            protocols,
        } = agent;

        let channel_id = transport.channel_id();
        if channel_id != 0 {
            error!("Agent {name} requests unsupported channel id {channel_id}");
            return Err(BindingViolation::UnsupportedChannelId(channel_id).into());
        }

        let mut mailbox_index = None;
        if let Transport::Mailbox { channel, doorbell } = transport {
            let index = next_mailbox_index;
            next_mailbox_index += 1;
            dispatcher.register(index, ChannelBridge::new(index, channel, doorbell));
            mailbox_index = Some(index);
        }

        let slot = &mut slots[agent_id as usize];
        slot.name = name;
        slot.agent_id = agent_id;
        push_entry(
            &mut slot.channels,
            ChannelConfig::new(channel_id, mailbox_index, shared_memory),
        )?;
        pending.push((agent_id, protocols));
    }

    // Second pass: resolve resources only once every channel exists.
    for (agent_id, protocols) in pending {
        let slot = &mut slots[agent_id as usize];
        let channel = &mut slot.channels[0];

        perf::init_performance(fdt, agent_id, channel, platform)?;

        for protocol in &protocols {
            match ProtocolId::try_from(protocol.protocol_id) {
                Ok(ProtocolId::PowerDomain) => {
                    power_domain::init_power_domains(fdt, &protocol.node, agent_id, channel, platform)?
                }
                Ok(ProtocolId::Clock) => {
                    clock::init_clocks(fdt, &protocol.node, agent_id, channel, platform)?
                }
                Ok(ProtocolId::ResetDomain) => {
                    reset::init_resets(fdt, &protocol.node, agent_id, channel, platform)?
                }
                Ok(ProtocolId::VoltageDomain) => {
                    regulator::init_voltage_domains(fdt, &protocol.node, agent_id, channel, platform)?
                }
                Ok(ProtocolId::PerformanceDomain) | Err(_) => {
                    error!(
                        "Agent {} requests unknown protocol {:#x}",
                        slot.name, protocol.protocol_id
                    );
                    return Err(BindingViolation::UnknownProtocol(protocol.protocol_id).into());
                }
            }
        }
    }

    Ok(ServerConfig { slots })
}
