// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Device-tree discovery of SCMI agents.
//!
//! Walks the `agent@*` children of the server node, binds each agent's
//! transport (mailbox channel or direct invocation), maps its shared memory
//! buffer and collects its `protocol@*` subnodes for the builder. Discovery
//! validates the description but attaches no protocol resources yet.

use crate::bridge::{BottomHalfNotifier, Doorbell};
use crate::config::{SharedMemory, push_entry};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, ResourceError};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use fdt::{Fdt, node::FdtNode};
use log::{debug, error};

/// `compatible` string of agents reached through a mailbox doorbell.
pub const MAILBOX_AGENT_COMPATIBLE: &str = "arm,scmi";
/// `compatible` string of agents invoking the server directly.
pub const DIRECT_AGENT_COMPATIBLE: &str = "linaro,scmi-optee";

/// How an agent reaches the server.
pub(crate) enum Transport<P: Platform> {
    /// Doorbell interrupts through a bound mailbox channel. The channel id
    /// is implicitly 0.
    Mailbox {
        channel: P::MailboxChannel,
        doorbell: Doorbell,
    },
    /// Direct invocation; the caller names the channel itself.
    Direct { channel_id: u32 },
}

impl<P: Platform> Transport<P> {
    pub(crate) fn channel_id(&self) -> u32 {
        match self {
            Self::Mailbox { .. } => 0,
            Self::Direct { channel_id } => *channel_id,
        }
    }
}

/// One protocol requested by an agent, still pointing at its device-tree
/// node; the builder resolves the resources below it.
pub struct DiscoveredProtocol<'a> {
    pub(crate) protocol_id: u32,
    pub(crate) node: FdtNode<'a, 'a>,
}

/// One agent as found in the device tree, with its transport bound and its
/// shared memory mapped.
pub struct DiscoveredAgent<'a, P: Platform> {
    pub(crate) name: String,
    pub(crate) agent_id: u32,
    pub(crate) transport: Transport<P>,
    pub(crate) shared_memory: Option<SharedMemory>,
    pub(crate) protocols: Vec<DiscoveredProtocol<'a>>,
}

/// Discovers every agent below `server_node`.
///
/// Fails fatally on any violation of the binding contract (missing ids,
/// duplicate ids, unknown compatibles, broken shared memory references).
/// Everything bound so far is released by drop on the error return.
pub fn discover<'a, P: Platform>(
    fdt: &'a Fdt<'a>,
    server_node: &FdtNode<'a, 'a>,
    platform: &mut P,
    notifier: &Arc<dyn BottomHalfNotifier>,
) -> Result<Vec<DiscoveredAgent<'a, P>>> {
    let mut agents: Vec<DiscoveredAgent<'a, P>> = Vec::new();

    for node in server_node.children() {
        if !node.name.starts_with("agent@") {
            continue;
        }
        let agent = discover_agent(fdt, &node, platform, notifier)?;
        if agents.iter().any(|a| a.agent_id == agent.agent_id) {
            error!("Duplicate agent id {} at node {}", agent.agent_id, node.name);
            return Err(BindingViolation::DuplicateAgentId(agent.agent_id).into());
        }
        push_entry(&mut agents, agent)?;
    }

    Ok(agents)
}

fn discover_agent<'a, P: Platform>(
    fdt: &'a Fdt<'a>,
    node: &FdtNode<'a, 'a>,
    platform: &mut P,
    notifier: &Arc<dyn BottomHalfNotifier>,
) -> Result<DiscoveredAgent<'a, P>> {
    let agent_id = required_reg(node)?;
    if agent_id == 0 {
        error!("Agent id 0 is reserved ({})", node.name);
        return Err(BindingViolation::ReservedAgentId.into());
    }

    let transport = bind_transport(fdt, node, platform, notifier)?;
    let shared_memory = map_shmem(fdt, node, platform)?;

    let mut protocols: Vec<DiscoveredProtocol<'a>> = Vec::new();
    for child in node.children() {
        if !child.name.starts_with("protocol@") {
            continue;
        }
        let protocol_id = required_reg(&child)?;
        if protocols.iter().any(|p| p.protocol_id == protocol_id) {
            error!(
                "Duplicate protocol id {:#x} under agent {}",
                protocol_id, node.name
            );
            return Err(BindingViolation::DuplicateProtocolId {
                agent_id,
                protocol_id,
            }
            .into());
        }
        debug!("Agent {} requests protocol {:#x}", node.name, protocol_id);
        push_entry(
            &mut protocols,
            DiscoveredProtocol {
                protocol_id,
                node: child,
            },
        )?;
    }

    Ok(DiscoveredAgent {
        name: String::from(node.name),
        agent_id,
        transport,
        shared_memory,
        protocols,
    })
}

fn bind_transport<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    platform: &mut P,
    notifier: &Arc<dyn BottomHalfNotifier>,
) -> Result<Transport<P>> {
    if is_compatible(node, MAILBOX_AGENT_COMPATIBLE) {
        let doorbell = Doorbell::new(notifier.clone());
        let channel = match platform.register_mailbox(fdt, node, doorbell.clone()) {
            Ok(channel) => channel,
            Err(ResourceError::DeferProbe) => {
                // The mailbox driver must be up before the server probes.
                error!("Mailbox deferred its probe for {}", node.name);
                return Err(BindingViolation::MailboxDeferred.into());
            }
            Err(err) => {
                error!("Failed to register mailbox for {}: {}", node.name, err);
                return Err(BindingViolation::MailboxRegistration.into());
            }
        };
        Ok(Transport::Mailbox { channel, doorbell })
    } else if is_compatible(node, DIRECT_AGENT_COMPATIBLE) {
        let Some(channel_id) = node
            .property("scmi-channel-id")
            .and_then(|p| p.as_usize())
        else {
            error!("scmi-channel-id property not found in {}", node.name);
            return Err(BindingViolation::MissingChannelId.into());
        };
        Ok(Transport::Direct {
            channel_id: channel_id as u32,
        })
    } else {
        error!("Unsupported compatible in agent node {}", node.name);
        Err(BindingViolation::UnsupportedCompatible.into())
    }
}

fn map_shmem<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    platform: &mut P,
) -> Result<Option<SharedMemory>> {
    let Some(phandle) = node.property("shmem").and_then(|p| p.as_usize()) else {
        return Ok(None);
    };
    let Some(shmem_node) = fdt.find_phandle(phandle as u32) else {
        error!("shmem phandle of {} does not resolve", node.name);
        return Err(BindingViolation::BadSharedMemory.into());
    };
    let Some(region) = shmem_node.reg().and_then(|mut regions| regions.next()) else {
        error!("Shared memory node {} has no usable reg", shmem_node.name);
        return Err(BindingViolation::BadSharedMemory.into());
    };
    let Some(size) = region.size.filter(|size| *size != 0) else {
        error!("Shared memory node {} has no size", shmem_node.name);
        return Err(BindingViolation::BadSharedMemory.into());
    };

    let pa = region.starting_address as u64;
    // The message buffer belongs to the non-secure client.
    let va = platform
        .map_shared_memory(pa, size)
        .map_err(|_| Error::Fatal(BindingViolation::BadSharedMemory))?;

    Ok(Some(SharedMemory { pa, va, size }))
}

fn required_reg(node: &FdtNode) -> Result<u32> {
    match node.property("reg").and_then(|p| p.as_usize()) {
        Some(value) => Ok(value as u32),
        None => {
            error!("Missing reg property in node {}", node.name);
            Err(BindingViolation::MissingReg.into())
        }
    }
}

fn is_compatible(node: &FdtNode, with: &str) -> bool {
    node.compatible()
        .is_some_and(|compatible| compatible.all().any(|s| s == with))
}
