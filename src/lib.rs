// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! SCMI server configuration builder and mailbox transport bridge.
//!
//! An SCMI server embedded in a trusted execution environment needs two
//! things from the firmware around it before it can serve clients: a
//! description of its agents, channels and exposed resources, and a path
//! from the transport doorbell interrupt to its message processing loop.
//! This crate provides both.
//!
//! [`probe`] walks the hardware description, binds each agent's transport
//! through the [`platform::Platform`] seam, resolves every declared resource
//! to a driver handle and produces the canonical [`config::ServerConfig`]
//! tree. [`config::ServerConfig::start`] then hands the configuration to the
//! embedded protocol engine. At runtime, [`bridge::Doorbell`] and
//! [`bridge::ChannelBridge`] carry each mailbox doorbell from interrupt
//! context to the engine's channel processing entry point and ring the
//! response back to the peer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bridge;
pub mod build;
pub mod config;
mod consumers;
pub mod discover;
pub mod error;
pub mod platform;

use alloc::sync::Arc;
use fdt::Fdt;
use log::error;

pub use bridge::{
    BottomHalfNotifier, ChannelBridge, ChannelProcessor, Doorbell, MailboxChannel,
    NotificationDispatcher,
};
pub use config::{Config, ProtocolEngine, ServerConfig};
pub use error::{BindingViolation, Error, Result};
pub use platform::Platform;

/// `compatible` string of the SCMI server node.
pub const SERVER_COMPATIBLE: &str = "optee,scmi-server";

/// Probes the SCMI server from the hardware description.
///
/// Locates the server node, discovers its agents, binds their transports and
/// builds the canonical configuration. Mailbox channels are registered with
/// `dispatcher` as they are bound; `notifier` is what their doorbells use to
/// schedule bottom-half processing.
///
/// On success the returned configuration is ready for
/// [`ServerConfig::start`]. On error everything bound so far is released by
/// drop; [`Error::DeferProbe`] means a required driver has not probed yet
/// and the whole probe may be retried later.
pub fn probe<'a, P, D>(
    fdt: &'a Fdt<'a>,
    platform: &mut P,
    notifier: &Arc<dyn BottomHalfNotifier>,
    dispatcher: &mut D,
) -> Result<ServerConfig<P>>
where
    P: Platform,
    D: NotificationDispatcher<P>,
{
    let Some(server_node) = fdt.find_compatible(&[SERVER_COMPATIBLE]) else {
        error!("SCMI server node not found");
        return Err(BindingViolation::ServerNodeMissing.into());
    };
    let agents = discover::discover(fdt, &server_node, platform, notifier)?;
    build::build(fdt, platform, agents, dispatcher)
}
