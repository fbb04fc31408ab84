mod driveinfo;
mod error;
mod scandir;
mod userdir;

pub use driveinfo::{DiskInfoCache, DriveInfo, VSN_LENGTH};
pub use error::UserDirError;
pub use scandir::{ScanDir, ScanEntry, MAXLENGTH};
pub use userdir::{Layout, UserDirectory, MAXSCANS};
