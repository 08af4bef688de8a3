//! 页面 I/O 操作实现

use super::{ImageDevice, PageDev};
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::tags::{pack_tags2, ExtTags};
use crate::types::ObjectHeader;

/// 单页读取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRead {
    /// 读到完整一页
    Full,
    /// 没有读到任何字节（镜像正常结束）
    Eof,
    /// 只读到部分字节（镜像末尾有不完整的页）
    Partial(usize),
}

impl<D: ImageDevice> PageDev<D> {
    /// 从当前位置读取一页
    ///
    /// 页面缓冲区先清零再读取。游标前进实际读到的字节数。
    ///
    /// # 返回
    ///
    /// - `PageRead::Full` - 完整一页，可通过 [`chunk`](Self::chunk) / [`tags`](Self::tags) 访问
    /// - `PageRead::Eof` - 0 字节，镜像结束
    /// - `PageRead::Partial(n)` - 1..page_size-1 字节，镜像被截断
    ///
    /// 设备本身的读取失败返回 `Err`。
    pub fn read_page(&mut self) -> Result<PageRead> {
        let page_size = self.page_size();
        self.page.fill(0);

        let mut total = 0;
        while total < page_size {
            let offset = self.position + total as u64;
            let n = self.device.read_at(offset, &mut self.page[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        self.position += total as u64;

        if total == page_size {
            self.pages_read += 1;
            log::trace!("[PAGE] read page at {:#x}", self.position - page_size as u64);
            Ok(PageRead::Full)
        } else if total == 0 {
            Ok(PageRead::Eof)
        } else {
            log::debug!("[PAGE] partial page: {} of {} bytes", total, page_size);
            Ok(PageRead::Partial(total))
        }
    }

    /// 把当前页面写入当前位置
    ///
    /// 调用前 chunk 缓冲区必须已经填好（对象头、文件数据或 0xFF 填充）。
    /// spare 先填充为 0xFF，再写入由参数构造的 tags（`chunk_used = 1`、
    /// `serial_number = 1`、最小序列号）及其 ECC。
    ///
    /// # 参数
    ///
    /// * `object_id` - 对象 ID
    /// * `chunk_id` - chunk ID（0 为对象头）
    /// * `n_bytes` - chunk 中实际使用的字节数（对象头为 0xFFFF）
    pub fn write_page(&mut self, object_id: u32, chunk_id: u32, n_bytes: u32) -> Result<()> {
        if self.device().is_read_only() {
            return Err(Error::new(
                ErrorKind::PermissionDenied,
                "Image opened read-only",
            ));
        }

        let chunk_size = self.chunk_size();
        let tags = ExtTags::for_write(object_id, chunk_id, n_bytes);
        {
            let spare = &mut self.page[chunk_size..];
            spare.fill(YAFFS_ERASED_BYTE);
            pack_tags2(spare, &tags, true)?;
        }

        let page_size = self.page_size();
        let mut written = 0;
        while written < page_size {
            let offset = self.position + written as u64;
            let n = self.device.write_at(offset, &self.page[written..])?;
            if n == 0 {
                return Err(Error::new(ErrorKind::Io, "Short write on image device"));
            }
            written += n;
        }

        log::trace!(
            "[PAGE] write obj={} chunk={} bytes={:#x} at {:#x}",
            object_id,
            chunk_id,
            n_bytes,
            self.position
        );
        self.position += page_size as u64;
        self.pages_written += 1;
        Ok(())
    }

    /// 写入对象头页面
    ///
    /// chunk 先填充为 0xFF，再在开头写入 512 字节对象头，tags 字节数为哨兵值。
    pub fn write_header(&mut self, header: &ObjectHeader, object_id: u32) -> Result<()> {
        {
            let chunk = self.chunk_mut();
            chunk.fill(YAFFS_ERASED_BYTE);
            header.encode(chunk)?;
        }
        self.write_page(object_id, 0, YAFFS_HEADER_BYTE_COUNT)
    }

    /// 用数据填充 chunk，剩余部分填充 0xFF
    pub fn fill_chunk(&mut self, data: &[u8]) -> Result<()> {
        let chunk = self.chunk_mut();
        if data.len() > chunk.len() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Data larger than chunk",
            ));
        }
        chunk[..data.len()].copy_from_slice(data);
        chunk[data.len()..].fill(YAFFS_ERASED_BYTE);
        Ok(())
    }

    /// 当前页面是否为对象头页面
    pub fn is_header_page(&self) -> Result<bool> {
        Ok(self.tags()?.is_object_header())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageConfig;
    use crate::page::MemDevice;
    use crate::types::ObjectType;
    use alloc::vec;
    use byteorder::{ByteOrder, LittleEndian};

    fn new_dev() -> PageDev<MemDevice> {
        PageDev::new(MemDevice::new(), ImageConfig::default()).unwrap()
    }

    #[test]
    fn test_write_then_read_page() {
        let mut dev = new_dev();
        dev.fill_chunk(b"hello yaffs").unwrap();
        dev.write_page(300, 1, 11).unwrap();
        assert_eq!(dev.position(), 2112);
        assert_eq!(dev.pages_written(), 1);

        let image = dev.into_inner();
        assert_eq!(image.as_slice().len(), 2112);
        assert_eq!(&image.as_slice()[..11], b"hello yaffs");
        assert!(image.as_slice()[11..2048].iter().all(|&b| b == 0xFF));

        let mut dev = PageDev::new(image, ImageConfig::default()).unwrap();
        assert_eq!(dev.read_page().unwrap(), PageRead::Full);
        let tags = dev.tags().unwrap();
        assert_eq!(tags.obj_id, 300);
        assert_eq!(tags.chunk_id, 1);
        assert_eq!(tags.n_bytes, 11);
        assert!(!dev.is_header_page().unwrap());
        assert_eq!(dev.read_page().unwrap(), PageRead::Eof);
    }

    #[test]
    fn test_partial_trailing_page() {
        let mut dev = new_dev();
        dev.fill_chunk(&[1, 2, 3]).unwrap();
        dev.write_page(300, 1, 3).unwrap();

        let mut bytes = dev.into_inner().into_vec();
        bytes.extend_from_slice(&[0xAB; 100]);

        let mut dev = PageDev::new(MemDevice::from_vec(bytes), ImageConfig::default()).unwrap();
        assert_eq!(dev.read_page().unwrap(), PageRead::Full);
        assert_eq!(dev.read_page().unwrap(), PageRead::Partial(100));
        assert_eq!(dev.pages_read(), 1);
    }

    #[test]
    fn test_write_header_page() {
        let mut dev = new_dev();
        let hdr = ObjectHeader::new_object(ObjectType::Directory, 1, "system", 0);
        dev.write_header(&hdr, 257).unwrap();

        let bytes = dev.into_inner().into_vec();
        assert_eq!(LittleEndian::read_u32(&bytes[0..4]), YAFFS_OBJECT_TYPE_DIRECTORY);
        assert!(bytes[YAFFS_OBJECT_HEADER_SIZE..2048].iter().all(|&b| b == 0xFF));
        assert_eq!(LittleEndian::read_u32(&bytes[2048 + 12..2048 + 16]), 0xFFFF);

        let mut dev = PageDev::new(MemDevice::from_vec(bytes), ImageConfig::default()).unwrap();
        dev.read_page().unwrap();
        assert!(dev.is_header_page().unwrap());
        assert_eq!(ObjectHeader::decode(dev.chunk()).name(), "system");
    }

    #[test]
    fn test_fill_chunk_too_large() {
        let mut dev = new_dev();
        let err = dev.fill_chunk(&vec![0u8; 4096]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_write_read_only_device() {
        let mut dev = PageDev::new(MemDevice::from_vec(vec![]).read_only(), ImageConfig::default()).unwrap();
        let err = dev.write_page(1, 0, 0xFFFF).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }
}
