//! Memory-mapped region holding the control block.
//!
//! The region is one page, either anonymous (host and core in one process)
//! or backed by a file so another process can attach and read the block.
//! The block sits at offset 0 of the mapping.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use memmap2::{MmapMut, MmapOptions};
use pru_adc_common::consts::REGION_SIZE;
use pru_adc_common::error::BlockError;
use pru_adc_common::shm::{BLOCK_SIZE, CoreView, HostView, SharedBlock};
use tracing::debug;

use crate::error::CaptureError;

/// A mapped region with a control block at offset 0.
pub struct SharedRegion {
    block: NonNull<SharedBlock>,
    path: Option<PathBuf>,
    // Keeps the mapping alive; `block` points into it.
    _mmap: MmapMut,
}

// SAFETY: `SharedBlock` consists only of atomics, so shared references to it
// may cross threads. The mapping is owned by the region and outlives every
// reference handed out by `block()`.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map an anonymous, zeroed page.
    pub fn anonymous() -> Result<Self, CaptureError> {
        let mmap = MmapOptions::new().len(REGION_SIZE).map_anon()?;
        let region = Self::from_mmap(mmap, None)?;
        debug!(size = REGION_SIZE, "anonymous region mapped");
        Ok(region)
    }

    /// Create (or truncate) a file-backed region at `path`.
    ///
    /// The file is created with owner-only permissions and sized to one page.
    pub fn create_file(path: &Path) -> Result<Self, CaptureError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.set_len(REGION_SIZE as u64)?;

        // SAFETY: the file was just created and sized by us; concurrent
        // modification by other processes goes through the atomic words.
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let region = Self::from_mmap(mmap, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), size = REGION_SIZE, "file region mapped");
        Ok(region)
    }

    /// Attach to an existing file-backed region.
    ///
    /// The eyecatcher is not checked here; callers verify it through
    /// [`HostView::verify`] before trusting any other word.
    pub fn attach_file(path: &Path) -> Result<Self, CaptureError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        // SAFETY: see `create_file`.
        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        let region = Self::from_mmap(mmap, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "file region attached");
        Ok(region)
    }

    fn from_mmap(mut mmap: MmapMut, path: Option<PathBuf>) -> Result<Self, BlockError> {
        if mmap.len() < BLOCK_SIZE {
            return Err(BlockError::TooSmall {
                size: mmap.len(),
                needed: BLOCK_SIZE,
            });
        }
        validate_alignment(mmap.as_ptr() as usize)?;

        let block = NonNull::new(mmap.as_mut_ptr().cast::<SharedBlock>()).ok_or(
            BlockError::Misaligned {
                address: 0,
                alignment: align_of::<SharedBlock>(),
            },
        )?;

        Ok(Self {
            block,
            path,
            _mmap: mmap,
        })
    }

    /// The control block.
    pub fn block(&self) -> &SharedBlock {
        // SAFETY: the pointer is non-null, aligned and covers `BLOCK_SIZE`
        // mapped bytes (checked in `from_mmap`). Every bit pattern is a valid
        // `SharedBlock` since it holds only integer atomics.
        unsafe { self.block.as_ref() }
    }

    /// Host side view of the block.
    pub fn host(&self) -> HostView<'_> {
        HostView::new(self.block())
    }

    /// Core side view of the block.
    pub fn core(&self) -> CoreView<'_> {
        CoreView::new(self.block())
    }

    /// Backing file, `None` for anonymous regions.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("address", &self.block.as_ptr())
            .field("path", &self.path)
            .finish()
    }
}

/// Check that `address` can hold a control block.
pub fn validate_alignment(address: usize) -> Result<(), BlockError> {
    let alignment = align_of::<SharedBlock>();
    if address % alignment != 0 {
        return Err(BlockError::Misaligned { address, alignment });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pru_adc_common::shm::BlockSettings;

    #[test]
    fn anonymous_region_starts_zeroed() {
        let region = SharedRegion::anonymous().unwrap();
        assert!(region.path().is_none());
        assert_eq!(region.host().timer(), 0);
        assert!(region.host().verify().is_err());
    }

    #[test]
    fn views_share_the_block() {
        let region = SharedRegion::anonymous().unwrap();
        region.host().initialize(&BlockSettings::default());
        region.core().advance_timer();
        assert_eq!(region.host().timer(), 1);
    }

    #[test]
    fn alignment_check() {
        assert!(validate_alignment(0x1000).is_ok());
        assert!(matches!(
            validate_alignment(0x1002),
            Err(BlockError::Misaligned {
                address: 0x1002,
                alignment: 4
            })
        ));
    }

    #[test]
    fn attach_sees_created_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block");
        let writer = SharedRegion::create_file(&path).unwrap();
        writer.host().initialize(&BlockSettings::default());

        let reader = SharedRegion::attach_file(&path).unwrap();
        assert_eq!(reader.path(), Some(path.as_path()));
        assert!(reader.host().verify().is_ok());
    }

    #[test]
    fn attach_missing_file_is_region_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SharedRegion::attach_file(&dir.path().join("absent")),
            Err(CaptureError::Region(_))
        ));
    }
}
