//! Pre-flight resource guard
//!
//! Two advisory gates run before any strategy touches the substrate:
//!
//! - **dense**: `elem * (m*n + n*p + m*p)` against a byte ceiling. Both
//!   strategies are gated: the row strategy holds all of `B` per worker and the
//!   block strategy moves every tile through the shuffle at least once.
//! - **disk**: free space on each scratch directory against a floor.
//!
//! A failed gate yields a [`Veto`]. A veto is not an error: the run is recorded
//! as skipped with the reason and the measured quantity.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::{Disk, Disks};
use tracing::debug;

use dmm_core::{Case, DmmError, DmmResult};

/// Which gate vetoed the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VetoKind {
    /// Estimated dense footprint above the ceiling
    DenseFootprint,
    /// Free disk space below the floor
    LowDisk,
}

/// A skipped run: reason plus the quantity that tripped the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Veto {
    pub kind: VetoKind,
    pub reason: String,
    /// Estimated dense bytes, or free disk bytes
    pub measured_bytes: u64,
    /// The ceiling or floor it was compared with
    pub limit_bytes: u64,
}

/// Outcome of a disk probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskCheck {
    pub ok: bool,
    pub free_bytes: u64,
}

/// Source of free-space measurements
pub trait DiskProbe: Send + Sync {
    /// Free bytes on the filesystem holding `path`
    fn free_bytes(&self, path: &Path) -> DmmResult<u64>;
}

/// [`DiskProbe`] backed by `sysinfo`'s mounted-disk list
///
/// Only disks on the same device as the path are candidates; among those the
/// longest mount-point prefix of the canonical path wins. A path whose
/// filesystem is not in the list is an error, never a parent mount's figure.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoDiskProbe;

impl SysinfoDiskProbe {
    /// The listed disk holding `target`, if any
    fn holding_disk<'d>(disks: &'d Disks, target: &Path) -> Option<&'d Disk> {
        disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .filter(|d| same_device(target, d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
    }
}

impl DiskProbe for SysinfoDiskProbe {
    fn free_bytes(&self, path: &Path) -> DmmResult<u64> {
        let target = existing_ancestor(path)?;
        let disks = Disks::new_with_refreshed_list();

        let disk = Self::holding_disk(&disks, &target).ok_or_else(|| {
            DmmError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mounted disk holds {}", target.display()),
            ))
        })?;
        debug!(
            path = %target.display(),
            mount = %disk.mount_point().display(),
            available = disk.available_space(),
            "disk probe"
        );
        Ok(disk.available_space())
    }
}

#[cfg(unix)]
fn same_device(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_device(_a: &Path, _b: &Path) -> bool {
    true
}

/// [`DiskProbe`] reporting a fixed free-space figure
#[derive(Debug, Clone, Copy)]
pub struct FixedDiskProbe(pub u64);

impl DiskProbe for FixedDiskProbe {
    fn free_bytes(&self, _path: &Path) -> DmmResult<u64> {
        Ok(self.0)
    }
}

/// Canonical form of `path`, or of its nearest existing ancestor
fn existing_ancestor(path: &Path) -> DmmResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut probe = absolute.as_path();
    loop {
        if let Ok(canonical) = probe.canonicalize() {
            return Ok(canonical);
        }
        match probe.parent() {
            Some(parent) => probe = parent,
            None => return Ok(absolute),
        }
    }
}

/// Dense footprint of `A + B + C` in bytes
pub fn estimate_dense_bytes(case: &Case, element_size: usize) -> u128 {
    case.dense_elements() * element_size as u128
}

/// Pre-flight safety gate
pub struct ResourceGuard {
    max_dense_bytes: u64,
    min_free_disk_bytes: u64,
    probe: Box<dyn DiskProbe>,
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("max_dense_bytes", &self.max_dense_bytes)
            .field("min_free_disk_bytes", &self.min_free_disk_bytes)
            .finish_non_exhaustive()
    }
}

impl ResourceGuard {
    /// Guard probing real disks through `sysinfo`
    pub fn new(max_dense_bytes: u64, min_free_disk_bytes: u64) -> Self {
        Self::with_probe(max_dense_bytes, min_free_disk_bytes, SysinfoDiskProbe)
    }

    pub fn with_probe<P: DiskProbe + 'static>(
        max_dense_bytes: u64,
        min_free_disk_bytes: u64,
        probe: P,
    ) -> Self {
        Self {
            max_dense_bytes,
            min_free_disk_bytes,
            probe: Box::new(probe),
        }
    }

    pub fn max_dense_bytes(&self) -> u64 {
        self.max_dense_bytes
    }

    pub fn min_free_disk_bytes(&self) -> u64 {
        self.min_free_disk_bytes
    }

    /// Veto iff the dense estimate is strictly above the ceiling
    pub fn check_dense(&self, case: &Case, element_size: usize) -> Option<Veto> {
        let estimate = estimate_dense_bytes(case, element_size);
        if estimate <= u128::from(self.max_dense_bytes) {
            return None;
        }
        let measured = u64::try_from(estimate).unwrap_or(u64::MAX);
        Some(Veto {
            kind: VetoKind::DenseFootprint,
            reason: format!(
                "Skipped: dense estimation A+B+C ≈ {:.2} GB exceeds the limit.",
                measured as f64 / 1e9
            ),
            measured_bytes: measured,
            limit_bytes: self.max_dense_bytes,
        })
    }

    /// Whether `path` has at least the configured free space
    pub fn check_disk_space(&self, path: &Path) -> DmmResult<DiskCheck> {
        let free_bytes = self.probe.free_bytes(path)?;
        Ok(DiskCheck {
            ok: free_bytes >= self.min_free_disk_bytes,
            free_bytes,
        })
    }

    /// Disk gate over several directories; the first one short of space vetoes
    ///
    /// A zero floor disables the gate without probing.
    pub fn check_dirs(&self, dirs: &[&Path]) -> DmmResult<Option<Veto>> {
        if self.min_free_disk_bytes == 0 {
            return Ok(None);
        }
        for dir in dirs {
            let check = self.check_disk_space(dir)?;
            if !check.ok {
                return Ok(Some(Veto {
                    kind: VetoKind::LowDisk,
                    reason: format!(
                        "Skipped: low disk space in {} ({:.2} GB available).",
                        dir.display(),
                        check.free_bytes as f64 / 1e9
                    ),
                    measured_bytes: check.free_bytes,
                    limit_bytes: self.min_free_disk_bytes,
                }));
            }
        }
        Ok(None)
    }
}
