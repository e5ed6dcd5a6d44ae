// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Clock domain registrar.

use super::{domain_id, domain_name, list_node, max_domain_id};
use crate::config::{ChannelConfig, ClockDomain, ClockFlags, reserve_table};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, ResourceError};
use fdt::{Fdt, node::FdtNode};
use log::{debug, error, warn};

/// Fills the clock domain array of `channel` from the `clocks` list below
/// the protocol node.
pub(crate) fn init_clocks<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    agent_id: u32,
    channel: &mut ChannelConfig<P>,
    platform: &mut P,
) -> Result<()> {
    if !channel.clocks.is_empty() {
        error!(
            "Clocks already loaded: agent {agent_id}, channel {}",
            channel.channel_id
        );
        return Err(BindingViolation::DoubleRegistration {
            agent_id,
            channel_id: channel.channel_id,
        }
        .into());
    }

    let Some(list) = list_node(node, "clocks") else {
        return Ok(());
    };
    let Some(max_id) = max_domain_id(&list) else {
        return Ok(());
    };

    let count = max_id as usize + 1;
    let mut clocks = reserve_table(count)?;
    for _ in 0..count {
        clocks.push(ClockDomain::placeholder());
    }

    for subnode in list.children() {
        let Some(domain_id) = domain_id(&subnode) else {
            warn!("Can't get SCMI clock id for node {}, skipped", subnode.name);
            continue;
        };

        let clock = match platform.clock_by_index(fdt, &subnode, 0) {
            Ok(clock) => clock,
            Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
            Err(err) => {
                warn!("Can't get clock for node {} ({err}), skipped", subnode.name);
                continue;
            }
        };

        let slot = &mut clocks[domain_id as usize];
        if slot.clock.is_some() {
            error!("Clock domain id {domain_id} already used ({})", subnode.name);
            return Err(BindingViolation::DuplicateDomainId(domain_id).into());
        }

        let name = domain_name(&subnode);
        let flags = subnode
            .property("flags")
            .and_then(|p| p.as_usize())
            .map(|raw| ClockFlags::from_bits_truncate(raw as u32))
            .unwrap_or(ClockFlags::empty());

        debug!("SCMI clock {name} on domain id {domain_id}");
        *slot = ClockDomain {
            name,
            clock: Some(clock),
            flags,
            // Clocks are exposed off; the agent switches them on.
            enabled: false,
        };
    }

    channel.clocks = clocks;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::{FakePlatform, agent, protocol, server_dtb};
    use crate::discover::MAILBOX_AGENT_COMPATIBLE;
    use alloc::vec::Vec;

    fn clock_dtb(list: impl FnOnce(&mut vm_fdt::FdtWriter)) -> Vec<u8> {
        server_dtb(|w| {
            let a = agent(w, MAILBOX_AGENT_COMPATIBLE, 1);
            let p = protocol(w, 0x14);
            let node = w.begin_node("clocks").unwrap();
            list(w);
            w.end_node(node).unwrap();
            w.end_node(p).unwrap();
            w.end_node(a).unwrap();
        })
    }

    fn protocol_node<'a>(fdt: &'a Fdt<'a>) -> FdtNode<'a, 'a> {
        fdt.find_node("/scmi/agent@1/protocol@14").unwrap()
    }

    #[test]
    fn sparse_ids_leave_placeholders() {
        let blob = clock_dtb(|w| {
            let c = w.begin_node("clock@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.property_u32("flags", 1).unwrap();
            w.end_node(c).unwrap();
            let c = w.begin_node("clock@2").unwrap();
            w.property_u32("reg", 2).unwrap();
            w.property_u32("clocks", 8).unwrap();
            w.property_string("domain-name", "ck-flexgen").unwrap();
            w.end_node(c).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        let mut channel = ChannelConfig::new(0, None, None);

        init_clocks(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap();

        assert_eq!(channel.clocks.len(), 3);
        assert_eq!(channel.clocks[0].name, "clock@0");
        assert_eq!(channel.clocks[0].flags, ClockFlags::ALLOW_SET_RATE);
        assert_eq!(channel.clocks[0].clock.unwrap().0, 7);
        assert!(!channel.clocks[0].enabled);
        assert!(!channel.clocks[1].is_accessible());
        assert_eq!(channel.clocks[2].name, "ck-flexgen");
        assert_eq!(channel.clocks[2].clock.unwrap().0, 8);
    }

    #[test]
    fn unresolvable_entries_are_skipped() {
        let blob = clock_dtb(|w| {
            // No reg property.
            let c = w.begin_node("clock-bad").unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.end_node(c).unwrap();
            // Clock driver does not know this one.
            let c = w.begin_node("clock@1").unwrap();
            w.property_u32("reg", 1).unwrap();
            w.property_u32("clocks", 9).unwrap();
            w.end_node(c).unwrap();
            let c = w.begin_node("clock@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.end_node(c).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform {
            missing_clocks: alloc::vec![9],
            ..FakePlatform::default()
        };
        let mut channel = ChannelConfig::new(0, None, None);

        init_clocks(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap();

        assert_eq!(channel.clocks.len(), 2);
        assert!(channel.clocks[0].is_accessible());
        assert!(!channel.clocks[1].is_accessible());
    }

    #[test]
    fn duplicate_domain_id_is_fatal() {
        let blob = clock_dtb(|w| {
            let c = w.begin_node("clock@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.end_node(c).unwrap();
            let c = w.begin_node("clock@0b").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 8).unwrap();
            w.end_node(c).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut channel = ChannelConfig::new(0, None, None);

        let err = init_clocks(
            &fdt,
            &protocol_node(&fdt),
            1,
            &mut channel,
            &mut FakePlatform::default(),
        )
        .unwrap_err();

        assert_eq!(err, Error::Fatal(BindingViolation::DuplicateDomainId(0)));
        assert!(channel.clocks.is_empty());
    }

    #[test]
    fn driver_defer_propagates() {
        let blob = clock_dtb(|w| {
            let c = w.begin_node("clock@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.end_node(c).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform {
            defer_clocks: true,
            ..FakePlatform::default()
        };
        let mut channel = ChannelConfig::new(0, None, None);

        let err =
            init_clocks(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap_err();

        assert_eq!(err, Error::DeferProbe);
    }

    #[test]
    fn second_registration_is_fatal() {
        let blob = clock_dtb(|w| {
            let c = w.begin_node("clock@0").unwrap();
            w.property_u32("reg", 0).unwrap();
            w.property_u32("clocks", 7).unwrap();
            w.end_node(c).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        let mut channel = ChannelConfig::new(0, None, None);

        init_clocks(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap();
        let err =
            init_clocks(&fdt, &protocol_node(&fdt), 1, &mut channel, &mut platform).unwrap_err();

        assert_eq!(
            err,
            Error::Fatal(BindingViolation::DoubleRegistration {
                agent_id: 1,
                channel_id: 0
            })
        );
    }

    #[test]
    fn missing_list_is_not_an_error() {
        let blob = server_dtb(|w| {
            let a = agent(w, MAILBOX_AGENT_COMPATIBLE, 1);
            let p = protocol(w, 0x14);
            w.end_node(p).unwrap();
            w.end_node(a).unwrap();
        });
        let fdt = Fdt::new(&blob).unwrap();
        let mut channel = ChannelConfig::new(0, None, None);

        init_clocks(
            &fdt,
            &protocol_node(&fdt),
            1,
            &mut channel,
            &mut FakePlatform::default(),
        )
        .unwrap();

        assert!(channel.clocks.is_empty());
    }
}
