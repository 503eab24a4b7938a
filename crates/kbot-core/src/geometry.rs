use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// How work is distributed across the device for one kernel launch.
///
/// `global` is the number of work-groups along each axis (the CUDA grid),
/// `local` the number of work-items per group (the CUDA block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaunchGeometry {
    pub global: [u32; 3],
    pub local: [u32; 3],
}

impl LaunchGeometry {
    /// Build a geometry, rejecting any zero extent.
    pub fn new(global: [u32; 3], local: [u32; 3]) -> Result<Self> {
        let geometry = Self { global, local };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check every extent is strictly positive.
    pub fn validate(&self) -> Result<()> {
        if self.global.iter().chain(self.local.iter()).any(|&d| d == 0) {
            return Err(CoreError::Geometry(self.to_string()));
        }
        Ok(())
    }

    /// Total number of work-groups, saturating at `u64::MAX`.
    pub fn groups(&self) -> u64 {
        saturating_product(&self.global)
    }

    /// Work-items per group, saturating at `u64::MAX`.
    pub fn group_size(&self) -> u64 {
        saturating_product(&self.local)
    }

    /// Total number of work-items launched, saturating at `u64::MAX`.
    pub fn work_items(&self) -> u64 {
        self.groups().saturating_mul(self.group_size())
    }
}

fn saturating_product(extent: &[u32; 3]) -> u64 {
    extent.iter().fold(1u64, |acc, &d| acc.saturating_mul(d as u64))
}

impl fmt::Display for LaunchGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [gx, gy, gz] = self.global;
        let [lx, ly, lz] = self.local;
        write!(f, "global=({gx}, {gy}, {gz}) local=({lx}, {ly}, {lz})")
    }
}
