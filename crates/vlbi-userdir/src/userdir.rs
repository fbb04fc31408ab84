use crate::{
    driveinfo::DiskInfoCache,
    error::UserDirError,
    scandir::{ScanDir, ScanEntry},
};

pub const MAXSCANS: usize = 1024;

/// The three on-disk layouts Mark5A/Mark5B have shipped, discernible only
/// by size: a bare `ScanDir`, `ScanDir` + 8-disk VSN cache, or `ScanDir` +
/// 16-disk VSN cache with a companion-bank VSN slot (the current layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Original,
    VsnVersionOne,
    VsnVersionTwo,
}

enum DiskVariant {
    Eight(DiskInfoCache<8, false>),
    Sixteen(DiskInfoCache<16, true>),
}

/// Entry point for a StreamStor user directory: the scan table plus,
/// depending on `Layout`, a cache of VSN and per-disk drive info.
pub struct UserDirectory {
    scan_dir: ScanDir<MAXSCANS>,
    disks: Option<DiskVariant>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new(Layout::VsnVersionTwo)
    }
}

impl UserDirectory {
    pub fn new(layout: Layout) -> Self {
        let disks = match layout {
            Layout::Original => None,
            Layout::VsnVersionOne => Some(DiskVariant::Eight(DiskInfoCache::new())),
            Layout::VsnVersionTwo => Some(DiskVariant::Sixteen(DiskInfoCache::new())),
        };
        Self { scan_dir: ScanDir::new(), disks }
    }

    pub fn layout(&self) -> Layout {
        match self.disks {
            None => Layout::Original,
            Some(DiskVariant::Eight(_)) => Layout::VsnVersionOne,
            Some(DiskVariant::Sixteen(_)) => Layout::VsnVersionTwo,
        }
    }

    pub fn scan_dir(&self) -> &ScanDir<MAXSCANS> {
        &self.scan_dir
    }

    pub fn scan_dir_mut(&mut self) -> &mut ScanDir<MAXSCANS> {
        &mut self.scan_dir
    }

    pub fn vsn8(&self) -> Result<&DiskInfoCache<8, false>, UserDirError> {
        match &self.disks {
            Some(DiskVariant::Eight(cache)) => Ok(cache),
            Some(DiskVariant::Sixteen(_)) => Err(UserDirError::WrongDiskCount),
            None => Err(UserDirError::NoDiskInfo),
        }
    }

    pub fn vsn8_mut(&mut self) -> Result<&mut DiskInfoCache<8, false>, UserDirError> {
        match &mut self.disks {
            Some(DiskVariant::Eight(cache)) => Ok(cache),
            Some(DiskVariant::Sixteen(_)) => Err(UserDirError::WrongDiskCount),
            None => Err(UserDirError::NoDiskInfo),
        }
    }

    pub fn vsn16(&self) -> Result<&DiskInfoCache<16, true>, UserDirError> {
        match &self.disks {
            Some(DiskVariant::Sixteen(cache)) => Ok(cache),
            Some(DiskVariant::Eight(_)) => Err(UserDirError::WrongDiskCount),
            None => Err(UserDirError::NoDiskInfo),
        }
    }

    pub fn vsn16_mut(&mut self) -> Result<&mut DiskInfoCache<16, true>, UserDirError> {
        match &mut self.disks {
            Some(DiskVariant::Sixteen(cache)) => Ok(cache),
            Some(DiskVariant::Eight(_)) => Err(UserDirError::WrongDiskCount),
            None => Err(UserDirError::NoDiskInfo),
        }
    }

    pub fn n_scans(&self) -> Result<u32, UserDirError> {
        self.scan_dir.n_scans()
    }

    pub fn get_scan(&self, index: u32) -> Result<ScanEntry, UserDirError> {
        self.scan_dir.get_scan(index)
    }

    pub fn get_next_scan(&mut self) -> Result<u32, UserDirError> {
        self.scan_dir.get_next_scan()
    }

    pub fn set_scan(&mut self, index: u32, name: &str, start: u64, length: u64) -> Result<(), UserDirError> {
        self.scan_dir.set_scan(index, name, start, length)
    }

    pub fn clear_scans(&mut self) {
        self.scan_dir.clear_scans();
    }

    pub fn remove_last_scan(&mut self) -> Result<(), UserDirError> {
        self.scan_dir.remove_last_scan()
    }

    pub fn sanitize(&mut self) {
        self.scan_dir.sanitize();
    }

    pub fn recover(&mut self, recovered_record_pointer: u64) {
        self.scan_dir.recover(recovered_record_pointer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_current_and_exposes_vsn16() {
        let dir = UserDirectory::default();
        assert_eq!(dir.layout(), Layout::VsnVersionTwo);
        assert!(dir.vsn16().is_ok());
        assert!(matches!(dir.vsn8(), Err(UserDirError::WrongDiskCount)));
    }

    #[test]
    fn original_layout_has_no_disk_info() {
        let dir = UserDirectory::new(Layout::Original);
        assert!(matches!(dir.vsn8(), Err(UserDirError::NoDiskInfo)));
        assert!(matches!(dir.vsn16(), Err(UserDirError::NoDiskInfo)));
    }

    #[test]
    fn scan_operations_delegate_to_the_scan_dir() {
        let mut dir = UserDirectory::new(Layout::VsnVersionOne);
        let idx = dir.get_next_scan().unwrap();
        dir.set_scan(idx, "scan-a", 0, 512).unwrap();
        assert_eq!(dir.n_scans().unwrap(), 1);
        assert_eq!(dir.get_scan(0).unwrap().name, "scan-a");
    }
}
