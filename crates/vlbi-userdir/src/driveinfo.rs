use crate::error::UserDirError;

/// Vendor drive info as reported by the StreamStor SDK. The original C
/// headers carry two ABI variants (`SDK8_DRIVEINFO` with a 32-bit
/// capacity, `SDK9_DRIVEINFO` with a 64-bit one, plus a misaligned
/// `_wrong` revision kept around for an old firmware bug); callers here
/// only need the logical fields, so both collapse to one struct with a
/// `u64` capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveInfo {
    pub model: String,
    pub serial: String,
    pub revision: String,
    pub capacity: u64,
    pub smart_capable: bool,
    pub smart_state: bool,
}

impl DriveInfo {
    pub fn is_empty(&self) -> bool {
        self.model.is_empty() && self.serial.is_empty() && self.revision.is_empty() && self.capacity == 0
    }
}

pub const VSN_LENGTH: usize = 64;

/// Cached VSN and per-disk drive info, as attached to a `UserDirectory`
/// under the VSN-carrying layouts. `BANK_B` selects whether a companion
/// VSN slot (for dual-bank Mark5 modules) is present.
#[derive(Debug, Clone)]
pub struct DiskInfoCache<const NDISKS: usize, const BANK_B: bool> {
    actual_vsn: String,
    drive_info: [DriveInfo; NDISKS],
    bank_b_vsn: String,
}

impl<const NDISKS: usize, const BANK_B: bool> Default for DiskInfoCache<NDISKS, BANK_B> {
    fn default() -> Self {
        Self { actual_vsn: String::new(), drive_info: core::array::from_fn(|_| DriveInfo::default()), bank_b_vsn: String::new() }
    }
}

impl<const NDISKS: usize, const BANK_B: bool> DiskInfoCache<NDISKS, BANK_B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_of_disks(&self) -> usize {
        NDISKS
    }

    pub fn vsn(&self) -> &str {
        &self.actual_vsn
    }

    pub fn set_vsn(&mut self, vsn: &str) {
        self.actual_vsn = vsn.chars().take(VSN_LENGTH - 1).collect();
    }

    pub fn companion_vsn(&self) -> Result<&str, UserDirError> {
        if BANK_B { Ok(&self.bank_b_vsn) } else { Err(UserDirError::NoCompanionVsn) }
    }

    pub fn set_companion_vsn(&mut self, vsn: &str) -> Result<(), UserDirError> {
        if !BANK_B {
            return Err(UserDirError::NoCompanionVsn);
        }
        self.bank_b_vsn = vsn.chars().take(VSN_LENGTH - 1).collect();
        Ok(())
    }

    pub fn drive_info(&self, disk: usize) -> Result<&DriveInfo, UserDirError> {
        self.drive_info.get(disk).ok_or(UserDirError::ScanOutOfRange { index: disk as u32, recorded: NDISKS as i32 })
    }

    pub fn set_drive_info(&mut self, disk: usize, info: DriveInfo) -> Result<(), UserDirError> {
        let slot = self
            .drive_info
            .get_mut(disk)
            .ok_or(UserDirError::ScanOutOfRange { index: disk as u32, recorded: NDISKS as i32 })?;
        *slot = info;
        Ok(())
    }

    /// A drive slot is consistent only if its fields are either all empty
    /// (no disk present) or all populated.
    pub fn insanity_factor(&self) -> u32 {
        self.drive_info
            .iter()
            .filter(|d| {
                let expect_empty = d.capacity == 0;
                d.is_empty() != expect_empty
            })
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_vsn_only_available_on_bank_b_layout() {
        let mut with_bank_b: DiskInfoCache<8, true> = DiskInfoCache::new();
        with_bank_b.set_companion_vsn("bankB001").unwrap();
        assert_eq!(with_bank_b.companion_vsn().unwrap(), "bankB001");

        let mut without: DiskInfoCache<8, false> = DiskInfoCache::new();
        assert!(matches!(without.companion_vsn(), Err(UserDirError::NoCompanionVsn)));
        assert!(matches!(without.set_companion_vsn("x"), Err(UserDirError::NoCompanionVsn)));
    }

    #[test]
    fn insanity_factor_flags_half_populated_slot() {
        let mut cache: DiskInfoCache<4, false> = DiskInfoCache::new();
        cache
            .set_drive_info(0, DriveInfo { model: "WD".into(), capacity: 0, ..Default::default() })
            .unwrap();
        assert_eq!(cache.insanity_factor(), 1);
    }
}
