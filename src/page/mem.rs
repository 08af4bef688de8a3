//! 内存镜像设备

use super::ImageDevice;
use crate::consts::YAFFS_ERASED_BYTE;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 内存中的镜像
///
/// 写入超出当前长度时自动扩展，中间的空洞填充为 0xFF。
#[derive(Debug, Clone, Default)]
pub struct MemDevice {
    data: Vec<u8>,
    read_only: bool,
}

impl MemDevice {
    /// 创建空镜像
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有字节创建镜像
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, read_only: false }
    }

    /// 标记为只读
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// 镜像内容
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 取回镜像内容
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl ImageDevice for MemDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        if self.read_only {
            return Err(Error::new(ErrorKind::PermissionDenied, "Image is read-only"));
        }
        let start = usize::try_from(offset)
            .map_err(|_| Error::new(ErrorKind::InvalidInput, "Offset out of range"))?;
        let end = start + buf.len();
        if end > self.data.len() {
            self.data.resize(end, YAFFS_ERASED_BYTE);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_mem_device_short_reads() {
        let mut dev = MemDevice::from_vec(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 4];
        assert_eq!(dev.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(dev.read_at(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(dev.read_at(5, &mut buf).unwrap(), 0);
        assert_eq!(dev.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mem_device_write_extends_with_erased_bytes() {
        let mut dev = MemDevice::new();
        dev.write_at(4, &[7, 7]).unwrap();
        assert_eq!(dev.as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF, 7, 7]);
        dev.write_at(0, &[1]).unwrap();
        assert_eq!(dev.as_slice()[0], 1);
    }

    #[test]
    fn test_mem_device_read_only() {
        let mut dev = MemDevice::from_vec(vec![0; 8]).read_only();
        assert!(dev.is_read_only());
        assert_eq!(dev.write_at(0, &[1]).unwrap_err().kind(), ErrorKind::PermissionDenied);
    }
}
