// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Power domain registrar.
//!
//! A power domain couples a clock and a supply; both references must resolve
//! for the domain to be exposed.

use super::{domain_id, domain_name, list_node, max_domain_id};
use crate::config::{ChannelConfig, PowerDomain, reserve_table};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, ResourceError};
use fdt::{Fdt, node::FdtNode};
use log::{debug, error, warn};

/// Fills the power domain array of `channel` from the `power-domains` list
/// below the protocol node.
pub(crate) fn init_power_domains<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    agent_id: u32,
    channel: &mut ChannelConfig<P>,
    platform: &mut P,
) -> Result<()> {
    if !channel.power_domains.is_empty() {
        error!(
            "Power domains already loaded: agent {agent_id}, channel {}",
            channel.channel_id
        );
        return Err(BindingViolation::DoubleRegistration {
            agent_id,
            channel_id: channel.channel_id,
        }
        .into());
    }

    let Some(list) = list_node(node, "power-domains") else {
        return Ok(());
    };
    let Some(max_id) = max_domain_id(&list) else {
        return Ok(());
    };

    let count = max_id as usize + 1;
    let mut domains = reserve_table(count)?;
    for _ in 0..count {
        domains.push(PowerDomain::placeholder());
    }

    for subnode in list.children() {
        let Some(domain_id) = domain_id(&subnode) else {
            warn!("Can't get SCMI pd id for node {}, skipped", subnode.name);
            continue;
        };

        let regulator = match platform.regulator_supply(fdt, &subnode, "voltd") {
            Ok(regulator) => regulator,
            Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
            Err(err) => {
                warn!(
                    "Can't get regulator for node {} ({err}), skipped",
                    subnode.name
                );
                continue;
            }
        };
        let clock = match platform.clock_by_index(fdt, &subnode, 0) {
            Ok(clock) => clock,
            Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
            Err(err) => {
                warn!("Can't get clock for node {} ({err}), skipped", subnode.name);
                continue;
            }
        };

        let slot = &mut domains[domain_id as usize];
        if slot.is_accessible() {
            error!("Pd domain id {domain_id} already used ({})", subnode.name);
            return Err(BindingViolation::DuplicateDomainId(domain_id).into());
        }

        let name = domain_name(&subnode);
        debug!("SCMI pd {name} on domain id {domain_id}");
        *slot = PowerDomain {
            name,
            clock: Some(clock),
            regulator: Some(regulator),
        };
    }

    channel.power_domains = domains;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::MAILBOX_AGENT_COMPATIBLE;
    use crate::platform::test::{FakePlatform, agent, protocol, server_dtb};
    use alloc::vec::Vec;

    fn pd_dtb(list: impl FnOnce(&mut vm_fdt::FdtWriter)) -> Vec<u8> {
        server_dtb(|w| {
            let a = agent(w, MAILBOX_AGENT_COMPATIBLE, 1);
            let p = protocol(w, 0x11);
            let node = w.begin_node("power-domains").unwrap();
            list(w);
            w.end_node(node).unwrap();
            w.end_node(p).unwrap();
            w.end_node(a).unwrap();
        })
    }

    fn protocol_node<'a>(fdt: &'a Fdt<'a>) -> FdtNode<'a, 'a> {
        fdt.find_node("/scmi/agent@1/protocol@11").unwrap()
    }

    #[test]
    fn resolves_clock_and_regulator() {
        let blob = pd_dtb(|w| {
            let d = w.begin_node("domain@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_string("domain-name", "gpu").unwrap();
            w.property_u32("clocks", 5).unwrap();
            w.property_u32("voltd-supply", 7).unwrap();
            w.end_node(d).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        let mut channel = ChannelConfig::new(0, None, None);

        init_power_domains(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap();

        assert_eq!(channel.power_domains.len(), 1);
        let domain = &channel.power_domains[0];
        assert_eq!(domain.name, "gpu");
        assert_eq!(domain.clock.unwrap().0, 5);
        assert_eq!(domain.regulator.as_ref().unwrap().id, 7);
    }

    #[test]
    fn domain_with_unresolved_clock_is_skipped() {
        let blob = pd_dtb(|w| {
            let d = w.begin_node("domain@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 5).unwrap();
            w.property_u32("voltd-supply", 7).unwrap();
            w.end_node(d).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform {
            missing_clocks: alloc::vec![5],
            ..FakePlatform::default()
        };
        let mut channel = ChannelConfig::new(0, None, None);

        init_power_domains(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap();

        assert_eq!(channel.power_domains.len(), 1);
        assert!(!channel.power_domains[0].is_accessible());
    }

    #[test]
    fn driver_defer_propagates() {
        let blob = pd_dtb(|w| {
            let d = w.begin_node("domain@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 5).unwrap();
            w.property_u32("voltd-supply", 7).unwrap();
            w.end_node(d).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform {
            defer_regulators: true,
            ..FakePlatform::default()
        };
        let mut channel = ChannelConfig::new(0, None, None);

        let err = init_power_domains(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform)
            .unwrap_err();

        assert_eq!(err, Error::DeferProbe);
    }
}
