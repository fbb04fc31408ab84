use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserDirError {
    #[error("scan #{index} out of range (nRecordedScans={recorded})")]
    ScanOutOfRange { index: u32, recorded: i32 },
    #[error("scan name {0:?} is {1} bytes, longer than the {2} byte field")]
    NameTooLong(String, usize, usize),
    #[error("scan directory is full ({0} scans recorded)")]
    Full(usize),
    #[error("no scan to remove")]
    NothingToRemove,
    #[error("raw buffer is {0} bytes, too short for this layout")]
    BufferTooShort(usize),
    #[error("{0} bytes doesn't match any known user-directory layout")]
    UnknownLayout(usize),
    #[error("this user directory has no companion VSN slot")]
    NoCompanionVsn,
    #[error("this user directory layout carries no disk-info cache")]
    NoDiskInfo,
    #[error("disk-info cache on this directory has a different disk count than requested")]
    WrongDiskCount,
}
