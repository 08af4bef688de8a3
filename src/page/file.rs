//! 磁盘镜像文件设备

use super::ImageDevice;
use crate::error::{Error, ErrorKind, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// 镜像文件打开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// 只读
    Read,
    /// 读写，不截断
    Modify,
    /// 新建，已存在时截断
    New,
}

/// 镜像文件设备
///
/// 记录文件当前的读写位置，连续访问时省去多余的 seek。
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    mode: OpenMode,
    cursor: Option<u64>,
}

impl FileDevice {
    /// 打开镜像文件
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let file = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(path),
            OpenMode::Modify => OpenOptions::new().read(true).write(true).open(path),
            OpenMode::New => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
        }
        .map_err(|e| {
            log::debug!("[FILE] open {} ({:?}) failed: {}", path.display(), mode, e);
            Error::from(e)
        })?;

        Ok(Self {
            file,
            mode,
            cursor: Some(0),
        })
    }

    /// 打开方式
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn seek_if_needed(&mut self, offset: u64) -> Result<()> {
        if self.cursor != Some(offset) {
            self.cursor = None;
            self.file.seek(SeekFrom::Start(offset))?;
            self.cursor = Some(offset);
        }
        Ok(())
    }
}

impl ImageDevice for FileDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek_if_needed(offset)?;
        loop {
            match self.file.read(buf) {
                Ok(n) => {
                    self.cursor = Some(offset + n as u64);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.cursor = None;
                    return Err(e.into());
                }
            }
        }
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        if self.mode == OpenMode::Read {
            return Err(Error::new(ErrorKind::PermissionDenied, "Image opened read-only"));
        }
        self.seek_if_needed(offset)?;
        loop {
            match self.file.write(buf) {
                Ok(n) => {
                    self.cursor = Some(offset + n as u64);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.cursor = None;
                    return Err(e.into());
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.mode == OpenMode::Read
    }
}
