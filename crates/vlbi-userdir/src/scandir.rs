use crate::error::UserDirError;

pub const MAXLENGTH: usize = 64;

/// A recorded scan: name, byte range, and its slot in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub name: String,
    pub start: u64,
    pub length: u64,
    pub index: u32,
}

/// StreamStor scan directory: a fixed table of up to `MAXSCANS` recorded
/// scans plus record/play pointers, persisted as a flat byte blob.
///
/// `MAXSCANS` mirrors the original's template parameter; production code
/// uses 1024, tests use small values to keep fixtures readable.
#[derive(Debug, Clone)]
pub struct ScanDir<const MAXSCANS: usize> {
    n_recorded_scans: i32,
    next_scan: i32,
    scan_names: [[u8; MAXLENGTH]; MAXSCANS],
    scan_start: [u64; MAXSCANS],
    scan_length: [u64; MAXSCANS],
    record_pointer: u64,
    play_pointer: u64,
    play_rate: f64,
}

impl<const MAXSCANS: usize> Default for ScanDir<MAXSCANS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAXSCANS: usize> ScanDir<MAXSCANS> {
    pub fn new() -> Self {
        Self {
            n_recorded_scans: 0,
            next_scan: 0,
            scan_names: [[0u8; MAXLENGTH]; MAXSCANS],
            scan_start: [0u64; MAXSCANS],
            scan_length: [0u64; MAXSCANS],
            record_pointer: 0,
            play_pointer: 0,
            play_rate: 0.0,
        }
    }

    /// Byte length of the raw on-disk layout for this `MAXSCANS`.
    pub const fn byte_len() -> usize {
        4 + 4 + MAXSCANS * MAXLENGTH + MAXSCANS * 8 + MAXSCANS * 8 + 8 + 8 + 8
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, UserDirError> {
        if buf.len() < Self::byte_len() {
            return Err(UserDirError::BufferTooShort(buf.len()));
        }
        let mut cursor = 0usize;
        let mut take4 = || {
            let b = [buf[cursor], buf[cursor + 1], buf[cursor + 2], buf[cursor + 3]];
            cursor += 4;
            b
        };
        let n_recorded_scans = i32::from_le_bytes(take4());
        let next_scan = i32::from_le_bytes(take4());

        let mut scan_names = [[0u8; MAXLENGTH]; MAXSCANS];
        for name in &mut scan_names {
            name.copy_from_slice(&buf[cursor..cursor + MAXLENGTH]);
            cursor += MAXLENGTH;
        }

        let mut take8 = |cursor: &mut usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[*cursor..*cursor + 8]);
            *cursor += 8;
            u64::from_le_bytes(b)
        };

        let mut scan_start = [0u64; MAXSCANS];
        for s in &mut scan_start {
            *s = take8(&mut cursor);
        }
        let mut scan_length = [0u64; MAXSCANS];
        for s in &mut scan_length {
            *s = take8(&mut cursor);
        }
        let record_pointer = take8(&mut cursor);
        let play_pointer = take8(&mut cursor);
        let mut rate_bytes = [0u8; 8];
        rate_bytes.copy_from_slice(&buf[cursor..cursor + 8]);
        let play_rate = f64::from_le_bytes(rate_bytes);

        Ok(Self {
            n_recorded_scans,
            next_scan,
            scan_names,
            scan_start,
            scan_length,
            record_pointer,
            play_pointer,
            play_rate,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::byte_len());
        out.extend_from_slice(&self.n_recorded_scans.to_le_bytes());
        out.extend_from_slice(&self.next_scan.to_le_bytes());
        for name in &self.scan_names {
            out.extend_from_slice(name);
        }
        for s in &self.scan_start {
            out.extend_from_slice(&s.to_le_bytes());
        }
        for l in &self.scan_length {
            out.extend_from_slice(&l.to_le_bytes());
        }
        out.extend_from_slice(&self.record_pointer.to_le_bytes());
        out.extend_from_slice(&self.play_pointer.to_le_bytes());
        out.extend_from_slice(&self.play_rate.to_le_bytes());
        out
    }

    pub fn n_scans(&self) -> Result<u32, UserDirError> {
        u32::try_from(self.n_recorded_scans).map_err(|_| UserDirError::ScanOutOfRange {
            index: 0,
            recorded: self.n_recorded_scans,
        })
    }

    pub fn get_scan(&self, scan: u32) -> Result<ScanEntry, UserDirError> {
        if self.n_recorded_scans > 0 && scan < self.n_recorded_scans as u32 {
            let i = scan as usize;
            let name = c_str(&self.scan_names[i]);
            return Ok(ScanEntry { name, start: self.scan_start[i], length: self.scan_length[i], index: scan });
        }
        Err(UserDirError::ScanOutOfRange { index: scan, recorded: self.n_recorded_scans })
    }

    /// Reserves the next writable slot, bumping `nRecordedScans`, and
    /// returns its index. The caller must follow up with `set_scan`.
    pub fn get_next_scan(&mut self) -> Result<u32, UserDirError> {
        if self.n_recorded_scans < 0 || self.n_recorded_scans as usize >= MAXSCANS {
            return Err(UserDirError::Full(MAXSCANS));
        }
        let index = self.n_recorded_scans as u32;
        self.n_recorded_scans += 1;
        Ok(index)
    }

    pub fn set_scan(&mut self, index: u32, name: &str, start: u64, length: u64) -> Result<(), UserDirError> {
        if index as i32 >= self.n_recorded_scans {
            return Err(UserDirError::ScanOutOfRange { index, recorded: self.n_recorded_scans });
        }
        if name.len() >= MAXLENGTH {
            return Err(UserDirError::NameTooLong(name.to_string(), name.len(), MAXLENGTH));
        }
        let i = index as usize;
        self.scan_names[i] = [0u8; MAXLENGTH];
        self.scan_names[i][..name.len()].copy_from_slice(name.as_bytes());
        self.scan_start[i] = start;
        self.scan_length[i] = length;
        self.record_pointer = start + length;
        Ok(())
    }

    pub fn record_pointer(&self) -> u64 {
        self.record_pointer
    }

    pub fn set_record_pointer(&mut self, p: u64) {
        self.record_pointer = p;
    }

    pub fn play_pointer(&self) -> u64 {
        self.play_pointer
    }

    pub fn set_play_pointer(&mut self, p: u64) {
        self.play_pointer = p;
    }

    pub fn play_rate(&self) -> f64 {
        self.play_rate
    }

    pub fn set_play_rate(&mut self, r: f64) {
        self.play_rate = r;
    }

    pub fn clear_scans(&mut self) {
        self.n_recorded_scans = 0;
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn remove_last_scan(&mut self) -> Result<(), UserDirError> {
        if self.n_recorded_scans <= 0 {
            return Err(UserDirError::NothingToRemove);
        }
        self.n_recorded_scans -= 1;
        Ok(())
    }

    /// Counts inconsistencies: out-of-range counters, a recorded scan with
    /// an empty name, a record pointer that doesn't match the sum of
    /// recorded scan extents.
    pub fn insanity_factor(&self) -> u32 {
        let mut res = 0u32;
        if self.n_recorded_scans < 0 || self.n_recorded_scans as usize > MAXSCANS {
            res += 1;
        }
        if self.next_scan < 0 || self.next_scan as usize >= MAXSCANS {
            res += 1;
        }
        let scans = self.n_recorded_scans.clamp(0, MAXSCANS as i32).max(0) as usize;
        let mut expected = 0u64;
        for i in 0..scans {
            if self.scan_start[i] != expected {
                res += 1;
            }
            if self.scan_names[i][0] == 0 {
                res += 1;
            }
            expected = self.scan_start[i] + self.scan_length[i];
        }
        if self.record_pointer != expected {
            res += 1;
        }
        res
    }

    /// Resets to empty if the counters look corrupted (negative or out of
    /// range). This is the defensive check done after reading a directory
    /// off a device that may have returned garbage.
    pub fn sanitize(&mut self) {
        if self.n_recorded_scans < 0
            || self.n_recorded_scans as usize > MAXSCANS
            || self.next_scan < 0
            || self.next_scan as usize >= MAXSCANS
        {
            tracing::warn!("scan directory failed sanity check, resetting to empty");
            *self = Self::new();
        }
    }

    /// Restores consistency after a StreamStor `XLRRecoverData` call:
    /// trims any recorded scan that starts at or past the recovered
    /// record pointer, and truncates the last surviving scan to end
    /// exactly at it.
    pub fn recover(&mut self, recovered_record_pointer: u64) {
        if recovered_record_pointer == 0 {
            self.n_recorded_scans = 0;
            return;
        }
        self.record_pointer = recovered_record_pointer;
        let mut last_scan = self.n_recorded_scans - 1;
        if last_scan >= 0 {
            while last_scan >= 0 && self.scan_start[last_scan as usize] >= recovered_record_pointer {
                last_scan -= 1;
                self.n_recorded_scans -= 1;
            }
            if last_scan >= 0 {
                let i = last_scan as usize;
                self.scan_length[i] = recovered_record_pointer - self.scan_start[i];
            }
        } else {
            self.scan_start[0] = 0;
            self.scan_length[0] = recovered_record_pointer;
            let name = b"recovered scan";
            self.scan_names[0] = [0u8; MAXLENGTH];
            self.scan_names[0][..name.len()].copy_from_slice(name);
            self.n_recorded_scans += 1;
        }
    }
}

fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_a_scan() {
        let mut dir: ScanDir<4> = ScanDir::new();
        let idx = dir.get_next_scan().unwrap();
        dir.set_scan(idx, "exp001_st_no0001", 0, 1000).unwrap();
        assert_eq!(dir.n_scans().unwrap(), 1);
        let scan = dir.get_scan(0).unwrap();
        assert_eq!(scan.name, "exp001_st_no0001");
        assert_eq!(scan.start, 0);
        assert_eq!(scan.length, 1000);
        assert_eq!(dir.record_pointer(), 1000);
    }

    #[test]
    fn getting_next_scan_past_capacity_errors() {
        let mut dir: ScanDir<1> = ScanDir::new();
        dir.get_next_scan().unwrap();
        assert!(matches!(dir.get_next_scan(), Err(UserDirError::Full(1))));
    }

    #[test]
    fn sanitize_resets_negative_scan_count() {
        // S6: a raw blob whose nRecordedScans field is -1.
        let mut buf = vec![0u8; ScanDir::<4>::byte_len()];
        buf[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        let mut dir: ScanDir<4> = ScanDir::from_bytes(&buf).unwrap();

        dir.sanitize();

        assert_eq!(dir.n_scans().unwrap(), 0);
        assert_eq!(dir.insanity_factor(), 0);
    }

    #[test]
    fn recover_trims_scans_past_the_recovered_pointer() {
        let mut dir: ScanDir<4> = ScanDir::new();
        let a = dir.get_next_scan().unwrap();
        dir.set_scan(a, "a", 0, 100).unwrap();
        let b = dir.get_next_scan().unwrap();
        dir.set_scan(b, "b", 100, 100).unwrap();

        dir.recover(150);

        assert_eq!(dir.n_scans().unwrap(), 2);
        assert_eq!(dir.get_scan(1).unwrap().length, 50);
        assert_eq!(dir.record_pointer(), 150);
    }

    #[test]
    fn byte_round_trip_preserves_state() {
        let mut dir: ScanDir<4> = ScanDir::new();
        let idx = dir.get_next_scan().unwrap();
        dir.set_scan(idx, "roundtrip", 10, 20).unwrap();
        dir.set_play_rate(512.0);

        let bytes = dir.to_bytes();
        let restored: ScanDir<4> = ScanDir::from_bytes(&bytes).unwrap();

        assert_eq!(restored.n_scans().unwrap(), 1);
        assert_eq!(restored.get_scan(0).unwrap().name, "roundtrip");
        assert_eq!(restored.play_rate(), 512.0);
    }
}
