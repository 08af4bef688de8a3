//! 文件内容提取
//!
//! 从对象头位置开始顺序读取数据页，拼出一个文件的完整内容。

use crate::error::{Error, ErrorKind, Result};
use crate::page::{ImageDevice, PageDev, PageRead};
use crate::types::ObjectHeader;
use alloc::vec::Vec;

/// 提取文件内容
///
/// 定位到 `header_pos`，读取对象头页面，之后按 tags 声明的字节数逐页复制，
/// 直到拼满 `file_size_low` 字节。
///
/// # 错误
///
/// - `InvalidInput` - 该位置不是对象头，或文件大小为 0
/// - `Corrupted` - 页面读取不完整、数据页声明 0 字节，或在数据拼完之前遇到
///   下一个对象头
pub fn extract_file<D: ImageDevice>(dev: &mut PageDev<D>, header_pos: u64) -> Result<Vec<u8>> {
    dev.seek_to(header_pos);
    read_full_page(dev)?;
    if !dev.is_header_page()? {
        return Err(Error::new(ErrorKind::InvalidInput, "Not an object header page"));
    }

    let header = ObjectHeader::decode(dev.chunk());
    let size = header.file_size_low as usize;
    if size == 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "File is empty"));
    }

    let chunk_size = dev.chunk_size();
    // 大小来自镜像，不可信；只按一个 chunk 预留，随读取增长
    let mut data = Vec::with_capacity(size.min(chunk_size));
    while data.len() < size {
        read_full_page(dev)?;
        let tags = dev.tags()?;
        if tags.is_object_header() {
            log::warn!(
                "[EXTRACT] {:?}: header page after {} of {} bytes",
                header.name(),
                data.len(),
                size
            );
            return Err(Error::new(ErrorKind::Corrupted, "File data interrupted by object header"));
        }

        let declared = (tags.n_bytes as usize).min(chunk_size);
        let n = declared.min(size - data.len());
        if n == 0 {
            return Err(Error::new(ErrorKind::Corrupted, "Data page declares no bytes"));
        }
        data.extend_from_slice(&dev.chunk()[..n]);
    }

    log::debug!("[EXTRACT] {:?}: {} bytes from {:#x}", header.name(), size, header_pos);
    Ok(data)
}

fn read_full_page<D: ImageDevice>(dev: &mut PageDev<D>) -> Result<()> {
    match dev.read_page()? {
        PageRead::Full => Ok(()),
        PageRead::Eof | PageRead::Partial(_) => {
            Err(Error::new(ErrorKind::Corrupted, "Unexpected end of image"))
        }
    }
}
