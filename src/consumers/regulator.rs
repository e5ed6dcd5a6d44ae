// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Voltage domain registrar.
//!
//! Each `regulators` subnode references its regulator through a
//! `voltd-supply` phandle. The exposed domain name is the regulator's own
//! name. The default state is synchronized with the regulator's provisioning
//! flags: an always-on regulator is reported enabled, a boot-on regulator is
//! switched on during the build.

use super::{domain_id, list_node, max_domain_id};
use crate::config::{ChannelConfig, VoltageDomain, reserve_table};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, RegulatorFlags, RegulatorOps, ResourceError};
use alloc::string::String;
use fdt::{Fdt, node::FdtNode};
use log::{debug, error, info, warn};

/// Fills the voltage domain array of `channel` from the `regulators` list
/// below the protocol node.
pub(crate) fn init_voltage_domains<P: Platform>(
    fdt: &Fdt,
    node: &FdtNode,
    agent_id: u32,
    channel: &mut ChannelConfig<P>,
    platform: &mut P,
) -> Result<()> {
    if !channel.voltage_domains.is_empty() {
        error!(
            "Regulators already loaded: agent {agent_id}, channel {}",
            channel.channel_id
        );
        return Err(BindingViolation::DoubleRegistration {
            agent_id,
            channel_id: channel.channel_id,
        }
        .into());
    }

    let Some(list) = list_node(node, "regulators") else {
        return Ok(());
    };
    let Some(max_id) = max_domain_id(&list) else {
        return Ok(());
    };

    let count = max_id as usize + 1;
    let mut domains = reserve_table(count)?;
    for _ in 0..count {
        domains.push(VoltageDomain::placeholder());
    }

    for subnode in list.children() {
        let Some(domain_id) = domain_id(&subnode) else {
            warn!("Can't get SCMI voltd id for node {}, skipped", subnode.name);
            continue;
        };

        let mut regulator = match platform.regulator_supply(fdt, &subnode, "voltd") {
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

        let slot = &mut domains[domain_id as usize];
        if slot.regulator.is_some() {
            error!("Voltd domain id {domain_id} already used ({})", subnode.name);
            return Err(BindingViolation::DuplicateDomainId(domain_id).into());
        }

        let flags = regulator.flags();
        let mut enabled = flags.contains(RegulatorFlags::ALWAYS_ON);
        if flags.contains(RegulatorFlags::BOOT_ON) {
            if regulator.enable().is_ok() {
                enabled = true;
            } else {
                info!("Can't enable regulator {}", regulator.name());
            }
        }

        let name = String::from(regulator.name());
        debug!("SCMI voltd {name} on domain id {domain_id}");
        *slot = VoltageDomain {
            name,
            regulator: Some(regulator),
            enabled,
        };
    }

    channel.voltage_domains = domains;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::MAILBOX_AGENT_COMPATIBLE;
    use crate::platform::test::{FakePlatform, agent, protocol, server_dtb};
    use alloc::vec::Vec;

    fn regulator_dtb(entries: &[(u32, u32)]) -> Vec<u8> {
        let entries = Vec::from(entries);
        server_dtb(move |w| {
            let a = agent(w, MAILBOX_AGENT_COMPATIBLE, 2);
            let p = protocol(w, 0x17);
            let list = w.begin_node("regulators").unwrap();
            for (domain_id, supply) in entries {
                let r = w
                    .begin_node(&alloc::format!("regulator-{supply}@{domain_id}"))
                    .unwrap();
                w.property_u32("reg", domain_id).unwrap();
                w.property_u32("voltd-supply", supply).unwrap();
                w.end_node(r).unwrap();
            }
            w.end_node(list).unwrap();
            w.end_node(p).unwrap();
            w.end_node(a).unwrap();
        })
    }

    fn protocol_node<'a>(fdt: &'a Fdt<'a>) -> FdtNode<'a, 'a> {
        fdt.find_node("/scmi/agent@2/protocol@17").unwrap()
    }

    #[test]
    fn domain_takes_the_regulator_name() {
        let blob = regulator_dtb(&[(0, 3)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        let mut channel = ChannelConfig::new(0, None, None);

        init_voltage_domains(&fdt, &protocol_node(&fdt), 2, &mut channel, &mut platform)
            .unwrap();

        assert_eq!(channel.voltage_domains.len(), 1);
        let domain = &channel.voltage_domains[0];
        assert_eq!(domain.name, "regulator3");
        assert!(domain.is_accessible());
        assert!(!domain.enabled);
    }

    #[test]
    fn always_on_regulator_is_reported_enabled() {
        let blob = regulator_dtb(&[(0, 3)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        platform.regulator_flags.insert(3, RegulatorFlags::ALWAYS_ON);
        let mut channel = ChannelConfig::new(0, None, None);

        init_voltage_domains(&fdt, &protocol_node(&fdt), 2, &mut channel, &mut platform)
            .unwrap();

        assert!(channel.voltage_domains[0].enabled);
    }

    #[test]
    fn boot_on_regulator_is_switched_on() {
        let blob = regulator_dtb(&[(0, 3)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        platform.regulator_flags.insert(3, RegulatorFlags::BOOT_ON);
        let mut channel = ChannelConfig::new(0, None, None);

        init_voltage_domains(&fdt, &protocol_node(&fdt), 2, &mut channel, &mut platform)
            .unwrap();

        let domain = &channel.voltage_domains[0];
        assert!(domain.enabled);
        assert!(domain.regulator.as_ref().unwrap().enabled);
    }

    #[test]
    fn boot_on_enable_failure_is_not_fatal() {
        let blob = regulator_dtb(&[(0, 3)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform::default();
        platform.regulator_flags.insert(3, RegulatorFlags::BOOT_ON);
        platform.failing_regulators.push(3);
        let mut channel = ChannelConfig::new(0, None, None);

        init_voltage_domains(&fdt, &protocol_node(&fdt), 2, &mut channel, &mut platform)
            .unwrap();

        let domain = &channel.voltage_domains[0];
        assert!(domain.is_accessible());
        assert!(!domain.enabled);
    }

    #[test]
    fn duplicate_domain_id_is_fatal() {
        let blob = regulator_dtb(&[(1, 3), (1, 4)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut channel = ChannelConfig::new(0, None, None);

        let err = init_voltage_domains(
            &fdt,
            &protocol_node(&fdt),
            2,
            &mut channel,
            &mut FakePlatform::default(),
        )
        .unwrap_err();

        assert_eq!(err, Error::Fatal(BindingViolation::DuplicateDomainId(1)));
    }

    #[test]
    fn driver_defer_propagates() {
        let blob = regulator_dtb(&[(0, 3)]);
        let fdt = Fdt::new(&blob).unwrap();
        let mut platform = FakePlatform {
            defer_regulators: true,
            ..FakePlatform::default()
        };
        let mut channel = ChannelConfig::new(0, None, None);

        let err = init_voltage_domains(&fdt, &protocol_node(&fdt), 2, &mut channel, &mut platform)
            .unwrap_err();

        assert_eq!(err, Error::DeferProbe);
    }
}
