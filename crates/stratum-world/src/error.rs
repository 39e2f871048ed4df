use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum WorldError {
    /// The file claims a format version newer than this reader understands.
    UnsupportedVersion(u32),
    /// The stream ended before the structure it promised.
    Truncated(io::Error),
    /// Dimensions exceed the grid's fixed capacity.
    UnsupportedWorldSize { width: i32, height: i32 },
    /// Another load already owns the grid.
    LoadInProgress,
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::UnsupportedVersion(version) => {
                write!(f, "unsupported world format version {}", version)
            }
            WorldError::Truncated(err) => write!(f, "world stream truncated: {}", err),
            WorldError::UnsupportedWorldSize { width, height } => {
                write!(f, "world size {}x{} exceeds capacity", width, height)
            }
            WorldError::LoadInProgress => write!(f, "a load is already in progress"),
        }
    }
}

impl Error for WorldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldError::Truncated(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WorldError {
    fn from(err: io::Error) -> Self {
        WorldError::Truncated(err)
    }
}

/// Structural faults survived during a load. Out-of-range ids are coerced
/// and counted rather than failing the file; the caller gets one of these
/// instead of a stream of errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadWarning {
    pub corrupt_tiles: u32,
    pub corrupt_walls: u32,
}

impl LoadWarning {
    pub fn is_clean(&self) -> bool {
        self.corrupt_tiles == 0 && self.corrupt_walls == 0
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tile and {} wall records were out of range and coerced",
            self.corrupt_tiles, self.corrupt_walls
        )
    }
}
