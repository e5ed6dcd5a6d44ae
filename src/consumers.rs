// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Resource consumer registrars.
//!
//! Each registrar reads one resource list below a `protocol@*` node
//! (`clocks`, `resets`, `regulators`, `power-domains`), resolves the driver
//! handle of every declared domain through the [`Platform`] and fills the
//! matching array of the channel configuration. Domain ids index the array
//! directly, so the array spans `[0, max id]` and holes stay as inaccessible
//! placeholder entries.
//!
//! A resource whose driver reports it missing is skipped with a warning; a
//! driver that has not probed yet defers the whole server probe.
//!
//! [`Platform`]: crate::platform::Platform

pub(crate) mod clock;
pub(crate) mod perf;
pub(crate) mod power_domain;
pub(crate) mod regulator;
pub(crate) mod reset;

use alloc::string::String;
use fdt::node::FdtNode;

/// Finds the resource list subnode of a protocol node.
fn list_node<'b, 'a>(node: &FdtNode<'b, 'a>, name: &str) -> Option<FdtNode<'b, 'a>> {
    node.children().find(|child| child.name == name)
}

/// SCMI domain id of a resource subnode.
fn domain_id(node: &FdtNode) -> Option<u32> {
    node.property("reg").and_then(|p| p.as_usize()).map(|v| v as u32)
}

/// Highest domain id declared in a resource list.
fn max_domain_id(list: &FdtNode) -> Option<u32> {
    list.children().filter_map(|node| domain_id(&node)).max()
}

/// Exposed name of a domain: the `domain-name` property when present, the
/// node name otherwise.
fn domain_name(node: &FdtNode) -> String {
    String::from(
        node.property("domain-name")
            .and_then(|p| p.as_str())
            .map(|name| name.trim_end_matches('\0'))
            .unwrap_or(node.name),
    )
}
