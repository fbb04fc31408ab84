/// A major transfer mode. Mirrors the source's `transfer_type` enum and
/// `string2transfermode` table 1:1; most variants name hardware paths
/// (StreamStor disk, spigot card, VBS bank) this crate doesn't drive
/// itself, but the admission rule and classifiers need the full set to
/// reason about what's compatible with what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    NoTransfer,
    Disk2Net,
    Disk2Out,
    Disk2File,
    Disk2Etransfer,
    In2Net,
    In2Disk,
    In2Fork,
    In2File,
    Net2Out,
    Net2Disk,
    Net2Fork,
    Net2File,
    Net2Check,
    Net2Sfxc,
    Net2SfxcFork,
    Fill2Net,
    Fill2File,
    Fill2Out,
    Fill2Vbs,
    Fill2Disk,
    Spill2Net,
    Spid2Net,
    Spin2Net,
    Spin2File,
    Splet2Net,
    Splet2File,
    Spill2File,
    Spid2File,
    Spif2File,
    Spif2Net,
    Spbs2Net,
    Spbs2File,
    File2Check,
    File2Mem,
    File2Disk,
    In2Mem,
    In2MemFork,
    Mem2Net,
    Mem2File,
    Mem2Sfxc,
    File2Net,
    Net2Mem,
    Mem2Time,
    Vbs2Net,
    Net2Vbs,
    VbsRecord,
    Mem2Vbs,
    Tvr,
    ComputeTrackmask,
    Condition,
    Bankswitch,
    Mounting,
    Stream2Sfxc,
}

impl TransferMode {
    /// The token this mode is spelled as on the wire, e.g. `"disk2net"`.
    pub fn as_token(&self) -> &'static str {
        match self {
            TransferMode::NoTransfer => "none",
            TransferMode::Disk2Net => "disk2net",
            TransferMode::Disk2Out => "disk2out",
            TransferMode::Disk2File => "disk2file",
            TransferMode::Disk2Etransfer => "disk2etransfer",
            TransferMode::In2Net => "in2net",
            TransferMode::In2Disk => "in2disk",
            TransferMode::In2Fork => "in2fork",
            TransferMode::In2File => "in2file",
            TransferMode::Net2Out => "net2out",
            TransferMode::Net2Disk => "net2disk",
            TransferMode::Net2Fork => "net2fork",
            TransferMode::Net2File => "net2file",
            TransferMode::Net2Check => "net2check",
            TransferMode::Net2Sfxc => "net2sfxc",
            TransferMode::Net2SfxcFork => "net2sfxcfork",
            TransferMode::Fill2Net => "fill2net",
            TransferMode::Fill2File => "fill2file",
            TransferMode::Fill2Out => "fill2out",
            TransferMode::Fill2Vbs => "fill2vbs",
            TransferMode::Fill2Disk => "fill2disk",
            TransferMode::Spill2Net => "spill2net",
            TransferMode::Spid2Net => "spid2net",
            TransferMode::Spin2Net => "spin2net",
            TransferMode::Spin2File => "spin2file",
            TransferMode::Splet2Net => "splet2net",
            TransferMode::Splet2File => "splet2file",
            TransferMode::Spill2File => "spill2file",
            TransferMode::Spid2File => "spid2file",
            TransferMode::Spif2File => "spif2file",
            TransferMode::Spif2Net => "spif2net",
            TransferMode::Spbs2Net => "spbs2net",
            TransferMode::Spbs2File => "spbs2file",
            TransferMode::File2Check => "file2check",
            TransferMode::File2Mem => "file2mem",
            TransferMode::File2Disk => "file2disk",
            TransferMode::In2Mem => "in2mem",
            TransferMode::In2MemFork => "in2memfork",
            TransferMode::Mem2Net => "mem2net",
            TransferMode::Mem2File => "mem2file",
            TransferMode::Mem2Sfxc => "mem2sfxc",
            TransferMode::File2Net => "file2net",
            TransferMode::Net2Mem => "net2mem",
            TransferMode::Mem2Time => "mem2time",
            TransferMode::Vbs2Net => "vbs2net",
            TransferMode::Net2Vbs => "net2vbs",
            TransferMode::VbsRecord => "vbsrecord",
            TransferMode::Mem2Vbs => "mem2vbs",
            TransferMode::Tvr => "tvr",
            TransferMode::ComputeTrackmask => "compute_trackmask",
            TransferMode::Condition => "condition",
            TransferMode::Bankswitch => "bankswitch",
            TransferMode::Mounting => "mounting",
            TransferMode::Stream2Sfxc => "stream2sfxc",
        }
    }

    /// Parses a wire token, returning `NoTransfer` for anything
    /// unrecognized (matching the source's `string2transfermode`, which
    /// never fails but falls back to `no_transfer`).
    pub fn from_token(s: &str) -> TransferMode {
        use TransferMode::*;
        match s {
            "disk2net" => Disk2Net,
            "disk2out" => Disk2Out,
            "disk2file" => Disk2File,
            "disk2etransfer" => Disk2Etransfer,
            "in2net" => In2Net,
            "in2disk" => In2Disk,
            "in2fork" => In2Fork,
            "in2file" => In2File,
            "net2out" => Net2Out,
            "net2disk" => Net2Disk,
            "net2fork" => Net2Fork,
            "net2file" => Net2File,
            "net2check" => Net2Check,
            "net2sfxc" => Net2Sfxc,
            "net2sfxcfork" => Net2SfxcFork,
            "fill2net" => Fill2Net,
            "fill2file" => Fill2File,
            "fill2out" => Fill2Out,
            "fill2vbs" => Fill2Vbs,
            "fill2disk" => Fill2Disk,
            "spill2net" => Spill2Net,
            "spid2net" => Spid2Net,
            "spin2net" => Spin2Net,
            "spin2file" => Spin2File,
            "splet2net" => Splet2Net,
            "splet2file" => Splet2File,
            "spill2file" => Spill2File,
            "spid2file" => Spid2File,
            "spif2file" => Spif2File,
            "spif2net" => Spif2Net,
            "spbs2net" => Spbs2Net,
            "spbs2file" => Spbs2File,
            "file2check" => File2Check,
            "file2mem" => File2Mem,
            "file2disk" => File2Disk,
            "in2mem" => In2Mem,
            "in2memfork" => In2MemFork,
            "mem2net" => Mem2Net,
            "mem2file" => Mem2File,
            "mem2sfxc" => Mem2Sfxc,
            "file2net" => File2Net,
            "net2mem" => Net2Mem,
            "mem2time" => Mem2Time,
            "vbs2net" => Vbs2Net,
            "net2vbs" => Net2Vbs,
            "vbsrecord" => VbsRecord,
            "mem2vbs" => Mem2Vbs,
            "tvr" => Tvr,
            "compute_trackmask" => ComputeTrackmask,
            "condition" => Condition,
            "bankswitch" => Bankswitch,
            "mounting" => Mounting,
            "stream2sfxc" => Stream2Sfxc,
            _ => NoTransfer,
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

use TransferMode::*;

pub fn fromfile(tt: TransferMode) -> bool {
    matches!(tt, File2Check | File2Mem | Spif2File | Spif2Net | File2Disk | File2Net | Vbs2Net)
}

pub fn tofile(tt: TransferMode) -> bool {
    matches!(
        tt,
        Disk2File
            | In2File
            | Net2File
            | Fill2File
            | Spill2File
            | Spif2File
            | Spbs2File
            | Splet2File
            | Spin2File
            | Spid2File
            | Mem2File
            | Net2Vbs
            | Fill2Vbs
            | VbsRecord
            | Mem2Vbs
    )
}

pub fn fromnet(tt: TransferMode) -> bool {
    matches!(
        tt,
        Net2Out | Net2Disk | Net2Fork | Net2File | Net2Check | Net2Sfxc | Net2SfxcFork | Splet2Net | Splet2File | Net2Mem | Net2Vbs | VbsRecord
    )
}

pub fn tonet(tt: TransferMode) -> bool {
    matches!(
        tt,
        Disk2Net | In2Net | Fill2Net | Spill2Net | Spid2Net | Spin2Net | Splet2Net | Spif2Net | Spbs2Net | Mem2Net | File2Net | Vbs2Net | Stream2Sfxc
    )
}

pub fn fromio(tt: TransferMode) -> bool {
    matches!(tt, In2Net | In2Disk | In2Fork | In2File | Spin2Net | Spin2File | In2Mem | In2MemFork | Tvr)
}

pub fn toio(tt: TransferMode) -> bool {
    matches!(tt, Disk2Out | Net2Out | Net2Fork | Fill2Out)
}

pub fn fromdisk(tt: TransferMode) -> bool {
    matches!(
        tt,
        Disk2Net | Disk2Out | Disk2File | Spid2Net | Spid2File | Condition | Bankswitch | Stream2Sfxc | Mounting | Disk2Etransfer
    )
}

pub fn todisk(tt: TransferMode) -> bool {
    matches!(tt, In2Disk | Net2Disk | Net2Fork | In2MemFork | File2Disk | Condition | Bankswitch | Mounting | Fill2Disk)
}

pub fn fromfill(tt: TransferMode) -> bool {
    matches!(tt, Fill2Net | Fill2File | Spill2Net | Spill2File | Fill2Out | Fill2Vbs | Fill2Disk)
}

pub fn toqueue(tt: TransferMode) -> bool {
    matches!(tt, File2Mem | In2Mem | In2MemFork | Net2Mem)
}

pub fn isfork(tt: TransferMode) -> bool {
    matches!(tt, Net2Fork | Net2SfxcFork | In2MemFork | In2Fork)
}

pub fn fromvbs(tt: TransferMode) -> bool {
    matches!(tt, Spbs2File | Spbs2Net | Vbs2Net)
}

pub fn tovbs(tt: TransferMode) -> bool {
    matches!(tt, Fill2Vbs | VbsRecord | Net2Vbs | Mem2Vbs)
}

pub fn diskunavail(tt: TransferMode) -> bool {
    matches!(tt, Condition | Bankswitch | Mounting)
}

pub fn streamstorbusy(tt: TransferMode) -> bool {
    diskunavail(tt) || toio(tt) || fromio(tt) || todisk(tt) || fromdisk(tt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_token() {
        let modes = [
            Disk2Net, Disk2Out, Disk2File, Disk2Etransfer, In2Net, In2Disk, In2Fork, In2File, Net2Out, Net2Disk, Net2Fork, Net2File,
            Net2Check, Net2Sfxc, Net2SfxcFork, Fill2Net, Fill2File, Fill2Out, Fill2Vbs, Fill2Disk, Spill2Net, Spid2Net, Spin2Net,
            Spin2File, Splet2Net, Splet2File, Spill2File, Spid2File, Spif2File, Spif2Net, Spbs2Net, Spbs2File, File2Check, File2Mem,
            File2Disk, In2Mem, In2MemFork, Mem2Net, Mem2File, Mem2Sfxc, File2Net, Net2Mem, Mem2Time, Vbs2Net, Net2Vbs, VbsRecord,
            Mem2Vbs, Tvr, ComputeTrackmask, Condition, Bankswitch, Mounting, Stream2Sfxc,
        ];
        for m in modes {
            assert_eq!(TransferMode::from_token(m.as_token()), m);
        }
    }

    #[test]
    fn unknown_token_falls_back_to_no_transfer() {
        assert_eq!(TransferMode::from_token("bogus"), NoTransfer);
    }

    #[test]
    fn streamstorbusy_covers_disk_and_io_paths() {
        assert!(streamstorbusy(Disk2Net));
        assert!(streamstorbusy(Net2Disk));
        assert!(streamstorbusy(Condition));
        assert!(!streamstorbusy(Mem2Net));
    }

    #[test]
    fn classifiers_match_source_membership() {
        assert!(tonet(Disk2Net));
        assert!(!tonet(Net2Disk));
        assert!(fromdisk(Disk2Net));
        assert!(todisk(Net2Disk));
        assert!(isfork(Net2Fork));
        assert!(!isfork(Disk2Net));
    }
}
