//! Sysfs GPIO line access
//!
//! Lines live under `<root>/gpio<N>/` with `value`, `direction` and
//! `edge` attribute files. Exporting a line is left to the system.
//!
//! Reads always use `pread` at offset 0: sysfs returns the current level
//! on every read from the start, and an edge wakes `poll(2)` with
//! `POLLPRI | POLLERR` until the file is read again from offset 0.
//!
//! A freshly opened value file also polls ready until its first read, so
//! a value stream is read once when it is opened.

use gpioirq_core::edge::encode_value;
use gpioirq_core::{
    decode_value, Direction, Edge, GpioResult, LineId, ResourceError, ResourceOp, ValueStream,
};
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy)]
enum Access {
    Read,
    ReadWrite,
    /// Replace the attribute text
    Write,
}

fn open_attr(path: &Path, line: LineId, access: Access) -> GpioResult<File> {
    let mut opts = OpenOptions::new();
    match access {
        Access::Read => opts.read(true),
        Access::ReadWrite => opts.read(true).write(true),
        Access::Write => opts.write(true).truncate(true),
    };
    opts.custom_flags(libc::O_CLOEXEC)
        .open(path)
        .map_err(|e| ResourceError::from_io(ResourceOp::Open, Some(line), &e).into())
}

fn read_byte(file: &File, line: LineId) -> GpioResult<u8> {
    let mut buf = [0u8; 1];
    match file.read_at(&mut buf, 0) {
        Ok(1) => Ok(buf[0]),
        Ok(_) => Err(ResourceError::new(ResourceOp::Read, Some(line), Errno::EIO).into()),
        Err(e) => Err(ResourceError::from_io(ResourceOp::Read, Some(line), &e).into()),
    }
}

/// Open `value` file of one line, as watched by the dispatcher
#[derive(Debug)]
pub struct SysfsValueStream {
    line: LineId,
    file: File,
    /// Byte consumed by the read at open
    initial: u8,
}

impl SysfsValueStream {
    /// Open `<root>/gpio<N>/value` read/write and consume its pending
    /// readiness
    pub fn open(root: &Path, line: LineId) -> GpioResult<Self> {
        Self::open_path(&root.join(line.dir_name()).join("value"), line)
    }

    fn open_path(path: &Path, line: LineId) -> GpioResult<Self> {
        let file = open_attr(path, line, Access::ReadWrite)?;
        let initial = read_byte(&file, line)?;
        Ok(Self { line, file, initial })
    }

    /// Level read when the stream was opened, if it was '0' or '1'
    pub fn initial_value(&self) -> Option<u8> {
        decode_value(self.initial)
    }
}

impl ValueStream for SysfsValueStream {
    fn line(&self) -> LineId {
        self.line
    }

    fn handle(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn reset_and_read_byte(&self) -> GpioResult<u8> {
        read_byte(&self.file, self.line)
    }
}

/// Attribute access for one exported line
#[derive(Debug, Clone)]
pub struct SysfsLine {
    line: LineId,
    dir: PathBuf,
}

impl SysfsLine {
    /// Locate `<root>/gpio<N>`; fails with `ENOENT` if it is not exported
    pub fn open(root: impl AsRef<Path>, line: impl Into<LineId>) -> GpioResult<Self> {
        let line = line.into();
        let dir = root.as_ref().join(line.dir_name());
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { line, dir }),
            Ok(_) => Err(ResourceError::new(ResourceOp::Open, Some(line), Errno::ENOTDIR).into()),
            Err(e) => Err(ResourceError::from_io(ResourceOp::Open, Some(line), &e).into()),
        }
    }

    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Current level, 0 or 1
    pub fn value(&self) -> GpioResult<u8> {
        let file = open_attr(&self.dir.join("value"), self.line, Access::Read)?;
        let byte = read_byte(&file, self.line)?;
        decode_value(byte)
            .ok_or_else(|| ResourceError::new(ResourceOp::Read, Some(self.line), Errno::EINVAL).into())
    }

    /// Drive an output line
    pub fn set_value(&self, high: bool) -> GpioResult<()> {
        self.write_attr("value", &[encode_value(high)])
    }

    pub fn set_direction(&self, direction: Direction) -> GpioResult<()> {
        self.write_attr("direction", direction.as_str().as_bytes())
    }

    /// Select which transitions raise an edge event
    pub fn set_edge(&self, edge: Edge) -> GpioResult<()> {
        self.write_attr("edge", edge.as_str().as_bytes())
    }

    /// Open the line's value stream for watching
    pub fn value_stream(&self) -> GpioResult<SysfsValueStream> {
        SysfsValueStream::open_path(&self.dir.join("value"), self.line)
    }

    fn write_attr(&self, attr: &str, bytes: &[u8]) -> GpioResult<()> {
        let file = open_attr(&self.dir.join(attr), self.line, Access::Write)?;
        match file.write_at(bytes, 0) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(_) => Err(ResourceError::new(ResourceOp::Write, Some(self.line), Errno::EIO).into()),
            Err(e) => Err(ResourceError::from_io(ResourceOp::Write, Some(self.line), &e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::temp_root;
    use gpioirq_core::GpioError;

    #[test]
    fn test_value_read_is_idempotent() {
        let root = temp_root(&[17]);
        std::fs::write(root.join("gpio17/value"), b"1\n").unwrap();

        let stream = SysfsValueStream::open(&root, LineId::new(17)).unwrap();
        assert_eq!(stream.line(), LineId::new(17));
        assert_eq!(stream.initial_value(), Some(1));
        assert!(stream.handle() >= 0);
        assert_eq!(stream.reset_and_read_byte().unwrap(), b'1');
        assert_eq!(stream.reset_and_read_byte().unwrap(), b'1');

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_line_attributes() {
        let root = temp_root(&[4]);
        let line = SysfsLine::open(&root, 4u32).unwrap();
        assert_eq!(line.value().unwrap(), 0);

        line.set_value(true).unwrap();
        assert_eq!(line.value().unwrap(), 1);

        line.set_direction(Direction::Out).unwrap();
        assert_eq!(std::fs::read(root.join("gpio4/direction")).unwrap(), b"out");

        line.set_edge(Edge::Both).unwrap();
        assert_eq!(std::fs::read(root.join("gpio4/edge")).unwrap(), b"both");
        line.set_edge(Edge::None).unwrap();
        assert_eq!(std::fs::read(root.join("gpio4/edge")).unwrap(), b"none");

        let stream = line.value_stream().unwrap();
        assert_eq!(stream.reset_and_read_byte().unwrap(), b'1');

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_missing_line() {
        let root = temp_root(&[]);
        let err = SysfsLine::open(&root, 30u32).unwrap_err();
        assert_eq!(
            err,
            GpioError::Resource(ResourceError::new(ResourceOp::Open, Some(LineId::new(30)), Errno::ENOENT))
        );
        let err = SysfsValueStream::open(&root, LineId::new(30)).unwrap_err();
        assert!(matches!(err, GpioError::Resource(ResourceError { op: ResourceOp::Open, .. })));
    }

    #[test]
    fn test_bad_and_empty_value() {
        let root = temp_root(&[5]);
        let line = SysfsLine::open(&root, 5u32).unwrap();

        std::fs::write(root.join("gpio5/value"), b"z").unwrap();
        let err = line.value().unwrap_err();
        assert_eq!(
            err,
            GpioError::Resource(ResourceError::new(ResourceOp::Read, Some(LineId::new(5)), Errno::EINVAL))
        );

        // Streams are primed at open, so an unreadable value file fails there.
        std::fs::write(root.join("gpio5/value"), b"").unwrap();
        let err = line.value_stream().unwrap_err();
        assert_eq!(
            err,
            GpioError::Resource(ResourceError::new(ResourceOp::Read, Some(LineId::new(5)), Errno::EIO))
        );
        let err = SysfsValueStream::open(&root, LineId::new(5)).unwrap_err();
        assert!(matches!(err, GpioError::Resource(ResourceError { op: ResourceOp::Read, .. })));

        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_stream_opened_read_write_and_primed() {
        let root = temp_root(&[12]);
        let path = root.join("gpio12/value");

        let line = SysfsLine::open(&root, 12u32).unwrap();
        let stream = line.value_stream().unwrap();
        assert_eq!(stream.initial_value(), Some(0));

        let flags = unsafe { libc::fcntl(stream.handle(), libc::F_GETFL) };
        assert_eq!(flags & libc::O_ACCMODE, libc::O_RDWR);

        // A read-only value file cannot be watched.
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o444);
        std::fs::set_permissions(&path, perms).unwrap();
        let is_root = unsafe { libc::geteuid() } == 0;
        if !is_root {
            let err = SysfsValueStream::open(&root, LineId::new(12)).unwrap_err();
            assert!(matches!(err, GpioError::Resource(ResourceError { op: ResourceOp::Open, .. })));
        }

        std::fs::remove_dir_all(root).unwrap();
    }
}
