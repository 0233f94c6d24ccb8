//! # Target Memory Access
//!
//! Reading raw bytes out of the inspected process.
//!
//! Every decode consumes memory through the [`MemoryView`] trait, so the
//! printers never know whether bytes come from a live process or from a
//! snapshot assembled out of a crash dump. Two implementations ship here:
//!
//! - [`MemoryImage`]: an owned snapshot built from `(base, bytes)` regions
//! - [`ProcessMemory`]: live reads on Linux via `process_vm_readv(2)`
//!
//! ## Failure model
//!
//! Reads either fill the whole buffer or fail with
//! [`QuarryError::MemoryRead`]. There are no partial results and no retries;
//! a decode that touches unmapped memory fails at exactly that read.

use crate::error::{QuarryError, Result};
use crate::types::Address;

/// Read-only view of the inspected process's memory
///
/// Implementations must treat the target as a stable snapshot for the
/// duration of a decode; nothing here mutates target memory.
pub trait MemoryView
{
    /// Read exactly `buf.len()` bytes starting at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`QuarryError::MemoryRead`] if any byte of the range is
    /// unreadable. The buffer contents are unspecified on error.
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()>;
}

fn read_failed(address: Address, len: usize, reason: impl Into<String>) -> QuarryError
{
    QuarryError::MemoryRead {
        address,
        len,
        reason: reason.into(),
    }
}

/// One contiguous run of captured bytes.
#[derive(Debug, Clone)]
struct ImageRegion
{
    base: Address,
    bytes: Vec<u8>,
}

impl ImageRegion
{
    fn contains(&self, address: Address, len: usize) -> bool
    {
        let start = address.value();
        let Some(end) = start.checked_add(len as u64) else {
            return false;
        };
        let region_end = self.base.value() + self.bytes.len() as u64;
        start >= self.base.value() && end <= region_end
    }
}

/// Memory snapshot assembled from captured regions
///
/// A snapshot is the memory source for crashed processes: the host carves
/// the interesting segments out of a core file (or a raw dump) and registers
/// each one together with the virtual address it was mapped at. Reads that
/// fall outside every region fail, exactly like an unmapped page would in a
/// live process.
///
/// ## Example
///
/// ```rust
/// use quarry_core::memory::{MemoryImage, MemoryView};
/// use quarry_core::types::Address;
///
/// let mut image = MemoryImage::new();
/// image.add_region(Address::from(0x1000), vec![1, 2, 3, 4]);
///
/// let mut buf = [0u8; 2];
/// image.read(Address::from(0x1001), &mut buf)?;
/// assert_eq!(buf, [2, 3]);
/// # Ok::<(), quarry_core::error::QuarryError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryImage
{
    regions: Vec<ImageRegion>,
}

impl MemoryImage
{
    /// Create an empty snapshot
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add a captured region mapped at `base`
    ///
    /// Regions may be registered in any order. Overlapping regions are not
    /// rejected; the earliest-registered region containing a read wins.
    pub fn add_region(&mut self, base: Address, bytes: Vec<u8>)
    {
        self.regions.push(ImageRegion { base, bytes });
    }

    /// Number of registered regions
    pub fn region_count(&self) -> usize
    {
        self.regions.len()
    }
}

impl MemoryView for MemoryImage
{
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()>
    {
        let region = self
            .regions
            .iter()
            .find(|region| region.contains(address, buf.len()))
            .ok_or_else(|| read_failed(address, buf.len(), "address range not covered by any snapshot region"))?;

        let start = (address.value() - region.base.value()) as usize;
        buf.copy_from_slice(&region.bytes[start..start + buf.len()]);
        Ok(())
    }
}

/// Live memory of a running process (Linux)
///
/// Uses `process_vm_readv(2)`, which reads another process's address space
/// in a single syscall without stopping it. The caller needs the same
/// permissions ptrace attachment would (same user, or `CAP_SYS_PTRACE`).
///
/// The reader holds no handle to the process; if the process exits, reads
/// start failing with `ESRCH`.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory
{
    pid: libc::pid_t,
}

#[cfg(target_os = "linux")]
impl ProcessMemory
{
    /// Create a reader for the process with the given PID
    ///
    /// No validation happens here; a wrong PID surfaces on the first read.
    pub fn new(pid: u32) -> Self
    {
        Self { pid: pid as libc::pid_t }
    }
}

#[cfg(target_os = "linux")]
impl MemoryView for ProcessMemory
{
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()>
    {
        let total = buf.len();
        let mut done = 0usize;

        // The kernel may return short reads at region boundaries; loop until
        // the buffer is full or the syscall refuses to make progress.
        while done < total {
            let local = libc::iovec {
                iov_base: buf[done..].as_mut_ptr().cast(),
                iov_len: total - done,
            };
            let remote = libc::iovec {
                iov_base: (address.value() as usize + done) as *mut libc::c_void,
                iov_len: total - done,
            };

            let read = unsafe { libc::process_vm_readv(self.pid, &local, 1, &remote, 1, 0) };
            if read <= 0 {
                let errno = std::io::Error::last_os_error();
                return Err(read_failed(address, total, format!("process_vm_readv: {errno}")));
            }
            done += read as usize;
        }

        Ok(())
    }
}
