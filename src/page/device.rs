//! 镜像设备核心类型

use crate::config::ImageConfig;
use crate::consts::YAFFS_ERASED_BYTE;
use crate::error::Result;
use crate::tags::{unpack_tags2, ExtTags};
use alloc::vec;
use alloc::vec::Vec;

/// 镜像设备接口
///
/// 实现此 trait 以提供对镜像字节流的访问。读写都以字节偏移定位，
/// 页面划分由 [`PageDev`] 负责。
///
/// # 示例
///
/// ```rust,ignore
/// use yaffs2_core::{ImageDevice, Result};
///
/// struct MyFlash {
///     // ...
/// }
///
/// impl ImageDevice for MyFlash {
///     fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
///         // 读取数据，到达末尾时返回较少的字节数，超出末尾返回 0
///         Ok(buf.len())
///     }
///
///     fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
///         Ok(buf.len())
///     }
/// }
/// ```
pub trait ImageDevice {
    /// 从指定偏移读取
    ///
    /// # 返回
    ///
    /// 实际读取的字节数，可能小于 `buf.len()`；到达末尾时返回 0
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// 向指定偏移写入
    ///
    /// # 返回
    ///
    /// 实际写入的字节数
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// 刷新缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 是否只读
    fn is_read_only(&self) -> bool {
        false
    }
}

impl<T: ImageDevice + ?Sized> ImageDevice for &mut T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        (**self).write_at(offset, buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }
}

/// 页面设备包装器
///
/// 为镜像提供顺序的整页访问：维护一个字节游标和一页大小的缓冲区
/// （前 `chunk_size` 字节为 chunk，其后为 spare），并统计读写页数。
///
/// PageDev 本身不包含内部锁，同一时刻只应由一个操作持有。
pub struct PageDev<D> {
    /// 底层设备
    pub(super) device: D,
    /// 页面几何
    config: ImageConfig,
    /// 当前字节偏移
    pub(super) position: u64,
    /// 页面缓冲区（chunk + spare）
    pub(super) page: Vec<u8>,
    /// 完整读取的页数
    pub(super) pages_read: u64,
    /// 成功写入的页数
    pub(super) pages_written: u64,
}

impl<D: ImageDevice> PageDev<D> {
    /// 创建新的页面设备包装器
    ///
    /// 会先校验页面几何。
    pub fn new(device: D, config: ImageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            device,
            config,
            position: 0,
            page: vec![YAFFS_ERASED_BYTE; config.page_size() as usize],
            pages_read: 0,
            pages_written: 0,
        })
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 取回底层设备
    pub fn into_inner(self) -> D {
        self.device
    }

    /// 页面几何
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// chunk 大小（字节）
    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size as usize
    }

    /// 页面大小（字节）
    pub fn page_size(&self) -> usize {
        self.config.page_size() as usize
    }

    /// 当前字节偏移
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 定位到绝对偏移
    pub fn seek_to(&mut self, offset: u64) {
        self.position = offset;
    }

    /// 相对当前位置向后跳过若干字节
    pub fn skip(&mut self, bytes: u64) {
        self.position = self.position.saturating_add(bytes);
    }

    /// 当前页面的 chunk 部分
    pub fn chunk(&self) -> &[u8] {
        &self.page[..self.chunk_size()]
    }

    /// 当前页面 chunk 部分的可变引用
    pub fn chunk_mut(&mut self) -> &mut [u8] {
        let chunk_size = self.chunk_size();
        &mut self.page[..chunk_size]
    }

    /// 当前页面的 spare 部分
    pub fn spare(&self) -> &[u8] {
        &self.page[self.chunk_size()..]
    }

    /// 解包当前页面 spare 中的 tags
    pub fn tags(&self) -> Result<ExtTags> {
        unpack_tags2(self.spare())
    }

    /// 完整读取的页数
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// 成功写入的页数
    pub fn pages_written(&self) -> u64 {
        self.pages_written
    }

    /// 刷新底层设备
    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::page::MemDevice;

    #[test]
    fn test_page_dev_geometry() {
        let dev = PageDev::new(MemDevice::new(), ImageConfig::default()).unwrap();
        assert_eq!(dev.chunk_size(), 2048);
        assert_eq!(dev.page_size(), 2112);
        assert_eq!(dev.chunk().len(), 2048);
        assert_eq!(dev.spare().len(), 64);
        assert_eq!(dev.position(), 0);
    }

    #[test]
    fn test_page_dev_rejects_bad_geometry() {
        let err = PageDev::new(MemDevice::new(), ImageConfig::new(128, 64)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_cursor_movement() {
        let mut dev = PageDev::new(MemDevice::new(), ImageConfig::default()).unwrap();
        dev.skip(4224);
        assert_eq!(dev.position(), 4224);
        dev.seek_to(2112);
        assert_eq!(dev.position(), 2112);
        dev.skip(u64::MAX);
        assert_eq!(dev.position(), u64::MAX);
    }
}
