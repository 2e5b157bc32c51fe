//! Simulated RPMB stores for host-side testing
//!
//! A simulated store is a flat byte image addressed by byte offset. Nothing is
//! authenticated. A store whose backing partition does not exist yet answers
//! every access with [`DeviceError::NotFound`].

use crate::device::DeviceError;
use crate::key::RpmbKey;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default simulated image size: the state block plus the rollback span, rounded up
pub const DEFAULT_IMAGE_SIZE: usize = 16 * crate::layout::RPMB_BLOCK_SIZE;

/// Unauthenticated access to a simulated RPMB image
pub trait SimulatedRpmb {
    /// Fails with `NoAuthKeyProgrammed` until [`program_key`](Self::program_key) ran
    fn get_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError>;

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError>;

    /// Fill `buf` from the image at `offset`
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Store `data` into the image at `offset`
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError>;
}

/// Simulated store held in memory
#[derive(Debug)]
pub struct MemorySimulatedRpmb {
    image: Option<Vec<u8>>,
    key_programmed: bool,
    write_counter: u32,
    writes: usize,
}

impl Default for MemorySimulatedRpmb {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}

impl MemorySimulatedRpmb {
    /// Zeroed image of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            image: Some(vec![0u8; size]),
            key_programmed: false,
            write_counter: 0,
            writes: 0,
        }
    }

    /// Store whose partition has not been created
    pub fn unpartitioned() -> Self {
        Self {
            image: None,
            key_programmed: false,
            write_counter: 0,
            writes: 0,
        }
    }

    /// Number of writes that reached the image
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn image_mut(&mut self) -> Option<&mut [u8]> {
        self.image.as_deref_mut()
    }
}

fn span(offset: u64, len: usize, size: usize) -> Result<std::ops::Range<usize>, DeviceError> {
    let start = usize::try_from(offset)
        .map_err(|_| DeviceError::Rejected(format!("offset {} out of range", offset)))?;
    match start.checked_add(len) {
        Some(end) if end <= size => Ok(start..end),
        _ => Err(DeviceError::Rejected(format!(
            "{} bytes at offset {} exceed image of {} bytes",
            len, offset, size
        ))),
    }
}

impl SimulatedRpmb for MemorySimulatedRpmb {
    fn get_counter(&mut self, _key: &RpmbKey) -> Result<u32, DeviceError> {
        if !self.key_programmed {
            return Err(DeviceError::NoAuthKeyProgrammed);
        }
        Ok(self.write_counter)
    }

    fn program_key(&mut self, _key: &RpmbKey) -> Result<(), DeviceError> {
        self.key_programmed = true;
        Ok(())
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        let image = self.image.as_ref().ok_or(DeviceError::NotFound)?;
        let range = span(offset, buf.len(), image.len())?;
        buf.copy_from_slice(&image[range]);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let image = self.image.as_mut().ok_or(DeviceError::NotFound)?;
        let range = span(offset, data.len(), image.len())?;
        image[range].copy_from_slice(data);
        self.write_counter = self.write_counter.wrapping_add(1);
        self.writes += 1;
        Ok(())
    }
}

/// Marker at the head of the key state file
const KEY_STATE_MAGIC: &[u8; 4] = b"RPMB";

/// Simulated store backed by an image file
///
/// A missing file stands for a partition that has not been created. Reads past
/// the end of the file come back zeroed and writes extend it.
///
/// Whether a key was programmed, and the write counter, live in a key state
/// file next to the image (`<image>.key`: magic, then a little-endian `u32`
/// counter), so provisioning survives reopening the image.
#[derive(Debug)]
pub struct FileSimulatedRpmb {
    path: PathBuf,
    key_state: PathBuf,
}

impl FileSimulatedRpmb {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut key_state = path.clone().into_os_string();
        key_state.push(".key");
        Self {
            path,
            key_state: PathBuf::from(key_state),
        }
    }

    /// Create a zeroed image of `size` bytes at `path`
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self, DeviceError> {
        let file = File::create(path.as_ref())?;
        file.set_len(size)?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File recording the programmed key state and write counter
    pub fn key_state_path(&self) -> &Path {
        &self.key_state
    }

    fn open(&self, write: bool) -> Result<File, DeviceError> {
        OpenOptions::new()
            .read(true)
            .write(write)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DeviceError::NotFound,
                _ => DeviceError::Io(e),
            })
    }

    /// Write counter, or `None` if no key was ever programmed
    fn load_key_state(&self) -> Result<Option<u32>, DeviceError> {
        let bytes = match std::fs::read(&self.key_state) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DeviceError::Io(e)),
        };
        if bytes.len() != 8 || &bytes[..4] != KEY_STATE_MAGIC {
            return Err(DeviceError::Rejected(format!(
                "corrupted key state in {}",
                self.key_state.display()
            )));
        }
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&bytes[4..]);
        Ok(Some(u32::from_le_bytes(counter)))
    }

    fn store_key_state(&self, counter: u32) -> Result<(), DeviceError> {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(KEY_STATE_MAGIC);
        bytes[4..].copy_from_slice(&counter.to_le_bytes());
        std::fs::write(&self.key_state, bytes)?;
        Ok(())
    }
}

impl SimulatedRpmb for FileSimulatedRpmb {
    fn get_counter(&mut self, _key: &RpmbKey) -> Result<u32, DeviceError> {
        self.load_key_state()?.ok_or(DeviceError::NoAuthKeyProgrammed)
    }

    fn program_key(&mut self, _key: &RpmbKey) -> Result<(), DeviceError> {
        let counter = self.load_key_state()?.unwrap_or(0);
        self.store_key_state(counter)
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        let mut file = self.open(false)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let mut file = self.open(true)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_data()?;
        if let Some(counter) = self.load_key_state()? {
            self.store_key_state(counter.wrapping_add(1))?;
        }
        Ok(())
    }
}

impl<T: SimulatedRpmb + ?Sized> SimulatedRpmb for Box<T> {
    fn get_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError> {
        (**self).get_counter(key)
    }

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError> {
        (**self).program_key(key)
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        (**self).write(offset, data)
    }
}
