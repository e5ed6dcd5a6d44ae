// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Performance (DVFS) domain registrar.
//!
//! Unlike the other registrars, DVFS data does not come from a protocol
//! node: the operating points are read from the standard `operating-points-v2`
//! table and the clock and supply come from the platform's DVFS service.
//! Only the non-secure application-processor channel (agent 1, channel 0)
//! exposes a performance domain.

use crate::config::{ChannelConfig, OperatingPoint, PerformanceDomain, push_entry, reserve_table};
use crate::error::{BindingViolation, Error, Result};
use crate::platform::{Platform, ResourceError};
use alloc::string::String;
use alloc::vec::Vec;
use fdt::Fdt;
use log::{debug, error, warn};

const OPP_TABLE_COMPATIBLE: &str = "operating-points-v2";

/// Agent id of the non-secure application processor.
const DVFS_AGENT_ID: u32 = 1;

/// Attaches the CPU DVFS performance domain to `channel` when it is the
/// application-processor channel and the platform provides a DVFS service.
pub(crate) fn init_performance<P: Platform>(
    fdt: &Fdt,
    agent_id: u32,
    channel: &mut ChannelConfig<P>,
    platform: &mut P,
) -> Result<()> {
    if agent_id != DVFS_AGENT_ID || channel.channel_id != 0 {
        return Ok(());
    }
    let Some(table) = fdt.find_compatible(&[OPP_TABLE_COMPATIBLE]) else {
        return Ok(());
    };

    let clock = match platform.dvfs_clock() {
        Ok(clock) => clock,
        Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
        Err(ResourceError::NotFound) => return Ok(()),
    };
    let regulator = match platform.dvfs_regulator() {
        Ok(regulator) => regulator,
        Err(ResourceError::DeferProbe) => return Err(Error::DeferProbe),
        Err(ResourceError::NotFound) => return Ok(()),
    };

    let mut opps: Vec<(OperatingPoint, bool)> = Vec::new();
    for subnode in table.children() {
        let Some(hz) = subnode.property("opp-hz").and_then(|p| p.as_usize()) else {
            warn!("Missing opp-hz in {}, skipped", subnode.name);
            continue;
        };
        let Some(microvolt) = subnode
            .property("opp-microvolt")
            .and_then(|p| p.as_usize())
        else {
            warn!("Missing opp-microvolt in {}, skipped", subnode.name);
            continue;
        };
        push_entry(
            &mut opps,
            (
                OperatingPoint {
                    frequency_khz: (hz / 1000) as u32,
                    voltage_mv: (microvolt / 1000) as u32,
                },
                subnode.property("opp-default").is_some(),
            ),
        )?;
    }
    if opps.is_empty() {
        return Ok(());
    }

    // The DVFS service expects the table ordered by increasing frequency.
    opps.sort_unstable_by_key(|(opp, _)| opp.frequency_khz);

    // The boot operating point is the fastest one marked as default.
    let Some(initial_opp) = opps.iter().rposition(|(_, default)| *default) else {
        error!("No default operating point in the OPP table");
        return Err(BindingViolation::NoDefaultOpp.into());
    };

    if !channel.performance_domains.is_empty() {
        error!(
            "Performance domains already loaded: agent {agent_id}, channel {}",
            channel.channel_id
        );
        return Err(BindingViolation::DoubleRegistration {
            agent_id,
            channel_id: channel.channel_id,
        }
        .into());
    }

    let mut operating_points = reserve_table(opps.len())?;
    for (opp, _) in &opps {
        operating_points.push(*opp);
    }

    debug!(
        "SCMI DVFS: {} operating points, boot index {initial_opp}",
        operating_points.len()
    );
    let mut domains = reserve_table(1)?;
    domains.push(PerformanceDomain {
        name: String::from("CPU DVFS"),
        initial_opp,
        operating_points,
        clock,
        regulator,
    });
    channel.performance_domains = domains;
    Ok(())
}
