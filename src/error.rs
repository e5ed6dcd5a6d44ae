// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Error classes of the configuration build.
//!
//! Most failure conditions on this path indicate a provisioning defect in the
//! hardware description and carry no defined recovery; they are reported as
//! [`Error::Fatal`] and the probing caller is expected to abort boot. The two
//! recoverable classes are memory exhaustion (full rollback, the caller may
//! retry or abort cleanly) and driver probe deferral (re-enter discovery from
//! the top once the missing driver has probed).

use core::fmt::{self, Display, Formatter};

/// Result type used throughout discovery and configuration build.
pub type Result<T> = core::result::Result<T, Error>;

/// An unrecoverable violation of the SCMI server device-tree binding contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingViolation {
    /// No node compatible with the SCMI server binding was found.
    ServerNodeMissing,
    /// An `agent@*` or `protocol@*` node lacks its mandatory `reg` property.
    MissingReg,
    /// Agent id 0 is reserved for the server itself.
    ReservedAgentId,
    /// Two agent nodes declare the same agent id.
    DuplicateAgentId(u32),
    /// Two protocol nodes under one agent declare the same protocol id.
    DuplicateProtocolId {
        /// Owning agent id.
        agent_id: u32,
        /// The colliding protocol id.
        protocol_id: u32,
    },
    /// The agent node carries no supported `compatible` string.
    UnsupportedCompatible,
    /// A direct-channel agent lacks the `scmi-channel-id` property.
    MissingChannelId,
    /// Agents are limited to a single channel, id 0.
    UnsupportedChannelId(u32),
    /// The mailbox driver deferred its probe while binding an agent channel.
    /// At this stage the mailbox driver must already be resolvable.
    MailboxDeferred,
    /// The mailbox driver refused the channel registration.
    MailboxRegistration,
    /// The `shmem` phandle does not resolve to a region with a defined base
    /// address and size, or the region could not be mapped.
    BadSharedMemory,
    /// A protocol id with no matching resource registrar was requested.
    UnknownProtocol(u32),
    /// A resource category was populated twice on the same channel.
    DoubleRegistration {
        /// Owning agent id.
        agent_id: u32,
        /// Channel id within the agent.
        channel_id: u32,
    },
    /// Two resources of one category share a domain id.
    DuplicateDomainId(u32),
    /// The OPP table carries no default operating point marker.
    NoDefaultOpp,
}

/// Errors returned by discovery and configuration build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The hardware description violates the server's binding contract. The
    /// system cannot safely continue; callers must treat this as an abort.
    Fatal(BindingViolation),
    /// A table allocation failed. Everything built so far has been released;
    /// the caller may retry boot or abort without leaking memory.
    OutOfMemory,
    /// A required lower-level driver has not completed its own probe yet.
    /// Discovery may be re-entered from the top on a later attempt.
    DeferProbe,
}

impl Display for BindingViolation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::ServerNodeMissing => write!(f, "SCMI server node not found"),
            Self::MissingReg => write!(f, "missing mandatory reg property"),
            Self::ReservedAgentId => write!(f, "agent id 0 is reserved for the server"),
            Self::DuplicateAgentId(id) => write!(f, "duplicate agent id {id}"),
            Self::DuplicateProtocolId {
                agent_id,
                protocol_id,
            } => write!(
                f,
                "duplicate protocol id {protocol_id:#x} under agent {agent_id}"
            ),
            Self::UnsupportedCompatible => write!(f, "unsupported agent compatible string"),
            Self::MissingChannelId => write!(f, "scmi-channel-id property not found"),
            Self::UnsupportedChannelId(id) => write!(f, "unsupported channel id {id}"),
            Self::MailboxDeferred => write!(f, "mailbox requested an impossible probe defer"),
            Self::MailboxRegistration => write!(f, "failed to register mailbox channel"),
            Self::BadSharedMemory => write!(f, "invalid shared memory description"),
            Self::UnknownProtocol(id) => write!(f, "unknown protocol id {id:#x}"),
            Self::DoubleRegistration {
                agent_id,
                channel_id,
            } => write!(
                f,
                "resources already loaded: agent {agent_id}, channel {channel_id}"
            ),
            Self::DuplicateDomainId(id) => write!(f, "domain id {id} already used"),
            Self::NoDefaultOpp => write!(f, "no default operating point in OPP table"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Fatal(violation) => write!(f, "binding contract violation: {violation}"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::DeferProbe => write!(f, "driver probe deferred"),
        }
    }
}

impl From<BindingViolation> for Error {
    fn from(violation: BindingViolation) -> Self {
        Self::Fatal(violation)
    }
}
