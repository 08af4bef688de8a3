//! 镜像配置
//!
//! 页面几何在打开/创建镜像时确定，所有设备包装器、扫描器和写入器共用同一份配置。

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};

/// 镜像几何配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// chunk（数据区）大小（字节）
    pub chunk_size: u32,
    /// spare（OOB 区）大小（字节）
    pub spare_size: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            chunk_size: YAFFS_DEFAULT_CHUNK_SIZE,
            spare_size: YAFFS_DEFAULT_SPARE_SIZE,
        }
    }
}

impl ImageConfig {
    /// 创建配置（不做校验，使用前调用 [`validate`](Self::validate)）
    pub const fn new(chunk_size: u32, spare_size: u32) -> Self {
        Self { chunk_size, spare_size }
    }

    /// 页面大小 = chunk + spare
    pub const fn page_size(&self) -> u32 {
        self.chunk_size + self.spare_size
    }

    /// 校验几何参数
    ///
    /// chunk 必须能放下完整的对象头，spare 必须能放下 packed tags v2。
    pub fn validate(&self) -> Result<()> {
        if (self.chunk_size as usize) < YAFFS_OBJECT_HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Chunk size too small for object header",
            ));
        }
        if (self.spare_size as usize) < YAFFS_PACKED_TAGS2_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Spare size too small for packed tags",
            ));
        }
        // 数据页的 tags 字节数不能与头部哨兵冲突
        if self.chunk_size >= YAFFS_HEADER_BYTE_COUNT {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Chunk size collides with header sentinel",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let config = ImageConfig::default();
        assert_eq!(config.chunk_size, 2048);
        assert_eq!(config.spare_size, 64);
        assert_eq!(config.page_size(), 2112);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_geometry() {
        assert_eq!(
            ImageConfig::new(256, 64).validate().unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert!(ImageConfig::new(2048, 16).validate().is_err());
        assert!(ImageConfig::new(0x1_0000, 64).validate().is_err());
        assert!(ImageConfig::new(512, 28).validate().is_ok());
    }
}
