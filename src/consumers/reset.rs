// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Reset domain registrar.

use super::{domain_id, domain_name, list_node, max_domain_id};
use crate::config::{ChannelConfig, ResetDomain, reserve_table};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, ResourceError};
use fdt::{Fdt, node::FdtNode};
use log::{debug, error, warn};

/// Fills the reset domain array of `channel` from the `resets` list below
/// the protocol node.
pub(crate) fn init_resets<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    agent_id: u32,
    channel: &mut ChannelConfig<P>,
    platform: &mut P,
) -> Result<()> {
    if !channel.resets.is_empty() {
        error!(
            "Resets already loaded: agent {agent_id}, channel {}",
            channel.channel_id
        );
        return Err(BindingViolation::DoubleRegistration {
            agent_id,
            channel_id: channel.channel_id,
        }
        .into());
    }

    let Some(list) = list_node(node, "resets") else {
        return Ok(());
    };
    let Some(max_id) = max_domain_id(&list) else {
        return Ok(());
    };

    let count = max_id as usize + 1;
    let mut resets = reserve_table(count)?;
    for _ in 0..count {
        resets.push(ResetDomain::placeholder());
    }

    for subnode in list.children() {
        let Some(domain_id) = domain_id(&subnode) else {
            warn!("Can't get SCMI reset id for node {}, skipped", subnode.name);
            continue;
        };

        let reset = match platform.reset_by_index(fdt, &subnode, 0) {
            Ok(reset) => reset,
            Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
            Err(err) => {
                warn!("Can't get reset for node {} ({err}), skipped", subnode.name);
                continue;
            }
        };

        let slot = &mut resets[domain_id as usize];
        if slot.reset.is_some() {
            error!("Reset domain id {domain_id} already used ({})", subnode.name);
            return Err(BindingViolation::DuplicateDomainId(domain_id).into());
        }

        let name = domain_name(&subnode);
        debug!("SCMI reset {name} on domain id {domain_id}");
        *slot = ResetDomain {
            name,
            reset: Some(reset),
        };
    }

    channel.resets = resets;
    Ok(())
}
