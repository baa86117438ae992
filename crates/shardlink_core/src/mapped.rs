//! # File-Backed Register Region
//!
//! Lets two processes share one [`SharedRegisterBlock`] by mapping the same
//! file. The receiver creates it at start; the sender opens it by path.
//!
//! ## Safety Note
//!
//! Overlaying the block on a mapping needs unsafe code. The invariants are
//! checked once, in [`MappedRegion::from_map`], and hold for the life of the
//! value.

#![allow(unsafe_code)]

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use memmap2::MmapMut;

use crate::error::{LinkError, LinkResult};
use crate::layout::{RegisterRegion, SharedRegisterBlock, BLOCK_SIZE};

/// A register block living in a shared file mapping.
#[derive(Debug)]
pub struct MappedRegion {
    block: NonNull<SharedRegisterBlock>,
    map: MmapMut,
    path: PathBuf,
}

// SAFETY: the mapping is only ever accessed through `&SharedRegisterBlock`,
// whose fields are all atomics. Sharing or moving the handle across threads
// is no different from sharing an `Arc<SharedRegisterBlock>`.
unsafe impl Send for MappedRegion {}
// SAFETY: see above.
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Creates the file at `path` if needed, grows it to one block and maps
    /// it, then zeroes every register.
    ///
    /// An existing file is never shrunk or truncated, so mappings already
    /// held by another process stay valid. They do see the registers reset,
    /// which is why only the receiver calls this, once, at start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, sized or mapped.
    pub fn create(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| LinkError::io(path, e))?;
        let len = file.metadata().map_err(|e| LinkError::io(path, e))?.len();
        if len < BLOCK_SIZE as u64 {
            file.set_len(BLOCK_SIZE as u64)
                .map_err(|e| LinkError::io(path, e))?;
        }

        // SAFETY: the file is at least one block long. Other processes may
        // map it concurrently, which is the point; every access goes through
        // atomics.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| LinkError::io(path, e))?;
        let region = Self::from_map(map, path)?;
        region.block().reset();
        Ok(region)
    }

    /// Maps an existing region file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or is
    /// smaller than one block.
    pub fn open(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LinkError::io(path, e))?;

        // SAFETY: as in `create`; the length is checked in `from_map` before
        // the block is overlaid.
        let map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| LinkError::io(path, e))?;
        Self::from_map(map, path)
    }

    fn from_map(mut map: MmapMut, path: &Path) -> LinkResult<Self> {
        if map.len() < BLOCK_SIZE {
            return Err(LinkError::RegionTooSmall {
                len: map.len(),
                required: BLOCK_SIZE,
            });
        }
        let base = map.as_mut_ptr();
        let align = std::mem::align_of::<SharedRegisterBlock>();
        if (base as usize) % align != 0 {
            return Err(LinkError::RegionMisaligned {
                address: base as usize,
                align,
            });
        }
        let block = NonNull::new(base.cast::<SharedRegisterBlock>()).ok_or(
            LinkError::RegionMisaligned {
                address: 0,
                align,
            },
        )?;
        Ok(Self {
            block,
            map,
            path: path.to_path_buf(),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Always false: a mapped region holds at least one block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Flushes the mapping to the backing file.
    ///
    /// Not needed for visibility between processes sharing the mapping,
    /// only for persistence to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> LinkResult<()> {
        self.map.flush().map_err(|e| LinkError::io(&self.path, e))
    }
}

impl RegisterRegion for MappedRegion {
    #[inline]
    fn block(&self) -> &SharedRegisterBlock {
        // SAFETY: `from_map` checked that the mapping is at least
        // `BLOCK_SIZE` bytes and suitably aligned. `SharedRegisterBlock` is
        // `repr(C)` over `AtomicU32`, valid for every bit pattern, and all
        // mutation goes through those atomics. The pointer came from
        // `as_mut_ptr` and the mapping lives as long as `self`.
        unsafe { self.block.as_ref() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Register;
    use crate::mailbox::{MailboxMessage, MailboxReceiver, MailboxSender};

    fn temp_region_path(tag: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("shardlink_{tag}_{id}.region"))
    }

    #[test]
    fn test_create_is_zeroed_and_sized() {
        let path = temp_region_path("create");
        let region = MappedRegion::create(&path).unwrap();
        assert_eq!(region.len(), BLOCK_SIZE);
        assert!(!region.is_empty());
        assert_eq!(region.block().read(Register::MailboxFull), 0);
        assert_eq!(region.path(), path.as_path());
        drop(region);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_two_mappings_share_one_block() {
        let path = temp_region_path("share");
        let sender_side = MappedRegion::create(&path).unwrap();
        let receiver_side = MappedRegion::open(&path).unwrap();

        let tx = MailboxSender::new(&sender_side);
        let rx = MailboxReceiver::new(&receiver_side);
        assert!(tx.try_send(3_860_002, 9));
        assert_eq!(rx.try_receive(), Some(MailboxMessage::new(3_860_002, 9)));
        assert!(!tx.is_full());

        receiver_side.flush().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0x08..0x0C], &3_860_002u32.to_le_bytes());

        drop(tx);
        drop(rx);
        drop(sender_side);
        drop(receiver_side);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_create_over_live_mapping_resets_in_place() {
        let path = temp_region_path("recreate");
        let first = MappedRegion::create(&path).unwrap();
        let peer = MappedRegion::open(&path).unwrap();

        let tx = MailboxSender::new(&peer);
        assert!(tx.try_send(3_860_005, 1));
        first.block().merge_progress(0b101);

        let restarted = MappedRegion::create(&path).unwrap();
        assert_eq!(restarted.len(), BLOCK_SIZE);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), BLOCK_SIZE as u64);

        // Older mappings still work and see the reset block.
        let snap = first.block().snapshot();
        assert_eq!(snap.mailbox_full, 0);
        assert_eq!(snap.mailbox_item_id, 0);
        assert_eq!(snap.progress_mirror, 0);
        assert!(tx.try_send(3_860_006, 2));
        assert_eq!(restarted.block().read(Register::MailboxItemId), 3_860_006);

        drop(tx);
        drop(peer);
        drop(first);
        drop(restarted);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_create_keeps_longer_file() {
        let path = temp_region_path("long");
        std::fs::write(&path, [0xFFu8; BLOCK_SIZE * 2]).unwrap();

        let region = MappedRegion::create(&path).unwrap();
        assert_eq!(region.len(), BLOCK_SIZE * 2);
        assert_eq!(region.block().snapshot().diag_heartbeat, 0);

        drop(region);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_rejects_short_file() {
        let path = temp_region_path("short");
        std::fs::write(&path, [0u8; BLOCK_SIZE - 4]).unwrap();
        let err = MappedRegion::open(&path).unwrap_err();
        assert!(matches!(err, LinkError::RegionTooSmall { required: BLOCK_SIZE, .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let path = temp_region_path("missing");
        assert!(matches!(MappedRegion::open(&path), Err(LinkError::Io { .. })));
    }
}
