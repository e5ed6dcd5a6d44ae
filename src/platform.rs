// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Seam between the generic configuration builder and the embedding firmware.
//!
//! The builder never touches hardware itself. Everything platform-specific,
//! driver handle lookup, mailbox channel registration and shared memory
//! mapping, goes through the [`Platform`] trait, implemented once per
//! platform by the embedding firmware and faked in unit tests.

use crate::bridge::Doorbell;
use bitflags::bitflags;
use core::fmt::{self, Display, Formatter};
use fdt::{Fdt, node::FdtNode};


/// Why a platform resource lookup did not produce a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The driver owning the resource has not completed its probe yet.
    DeferProbe,
    /// The resource does not exist on this platform.
    NotFound,
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::DeferProbe => write!(f, "driver probe deferred"),
            Self::NotFound => write!(f, "resource not found"),
        }
    }
}

/// A driver call failed for a reason the configuration build does not need to
/// distinguish further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverError;

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "driver call failed")
    }
}

bitflags! {
    /// Provisioning flags of a regulator, as reported by its driver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RegulatorFlags: u32 {
        /// The regulator must never be switched off.
        const ALWAYS_ON = 1 << 0;
        /// The regulator must be switched on at boot.
        const BOOT_ON = 1 << 1;
    }
}

/// Operations the builder needs from a regulator handle.
pub trait RegulatorOps {
    /// Name of the regulator, used as the voltage domain name.
    fn name(&self) -> &str;

    /// Provisioning flags of the regulator.
    fn flags(&self) -> RegulatorFlags;

    /// Switches the regulator on.
    fn enable(&mut self) -> Result<(), DriverError>;
}

/// Platform services consumed by discovery and configuration build.
///
/// Lookup operations take the device-tree node that references the resource;
/// the platform resolves the reference against its own driver registry.
pub trait Platform {
    /// Handle to a registered clock.
    type Clock;
    /// Handle to a registered regulator.
    type Regulator: RegulatorOps;
    /// Handle to a registered reset line.
    type Reset;
    /// Handle to a registered mailbox channel.
    type MailboxChannel: crate::bridge::MailboxChannel;

    /// Resolves entry `index` of the `clocks` property of `node`.
    fn clock_by_index(
        &mut self,
        fdt: &Fdt,
        node: &FdtNode,
        index: usize,
    ) -> Result<Self::Clock, ResourceError>;

    /// Resolves the `<supply>-supply` regulator reference of `node`.
    fn regulator_supply(
        &mut self,
        fdt: &Fdt,
        node: &FdtNode,
        supply: &str,
    ) -> Result<Self::Regulator, ResourceError>;

    /// Resolves entry `index` of the `resets` property of `node`.
    fn reset_by_index(
        &mut self,
        fdt: &Fdt,
        node: &FdtNode,
        index: usize,
    ) -> Result<Self::Reset, ResourceError>;

    /// Binds the mailbox channel referenced by the agent `node` and installs
    /// `doorbell` as its receive callback. The returned handle is used to
    /// acknowledge doorbells and signal responses.
    fn register_mailbox(
        &mut self,
        fdt: &Fdt,
        node: &FdtNode,
        doorbell: Doorbell,
    ) -> Result<Self::MailboxChannel, ResourceError>;

    /// Maps `size` bytes of non-secure memory at physical address `pa` with
    /// read/write access and returns the virtual address.
    fn map_shared_memory(&mut self, pa: u64, size: usize) -> Result<usize, ResourceError>;

    /// The clock driven by the CPU DVFS service, if the platform has one.
    fn dvfs_clock(&mut self) -> Result<Self::Clock, ResourceError>;

    /// The supply driven by the CPU DVFS service, if the platform has one.
    fn dvfs_regulator(&mut self) -> Result<Self::Regulator, ResourceError>;
}
