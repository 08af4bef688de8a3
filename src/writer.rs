//! 镜像写入
//!
//! 把对象逐个写成新的顺序镜像。每个对象先写一页对象头，文件再按 chunk
//! 大小切分写入数据页，最后一页不足部分填充 0xFF。
//!
//! 对象 ID 由写入器顺序分配，根目录固定使用 [`YAFFS_OBJECTID_ROOT`]，
//! 其余对象从 [`YAFFS_FIRST_USER_OBJECT_ID`] 开始。遍历对象树、为子对象
//! 改写父对象 ID 由调用方负责。

use crate::config::ImageConfig;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::page::{ImageDevice, PageDev};
use crate::types::{ObjectHeader, ObjectType};

/// 一个已写入的对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenObject {
    /// 分配的对象 ID
    pub object_id: u32,
    /// 对象头页面的字节偏移
    pub header_pos: u64,
}

/// 保存结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveInfo {
    /// 是否全部成功
    pub result: bool,
    /// 成功写入的文件数
    pub num_files_saved: u32,
    /// 写入失败的文件数
    pub num_files_failed: u32,
    /// 成功写入的目录数（含根目录）
    pub num_dirs_saved: u32,
    /// 写入失败的目录数
    pub num_dirs_failed: u32,
    /// 成功写入的符号链接数
    pub num_symlinks_saved: u32,
    /// 写入失败的符号链接数
    pub num_symlinks_failed: u32,
}

impl SaveInfo {
    /// 所有分类的失败数之和
    pub fn num_failures(&self) -> u32 {
        self.num_files_failed + self.num_dirs_failed + self.num_symlinks_failed
    }

    /// 所有分类的成功数之和
    pub fn num_saved(&self) -> u32 {
        self.num_files_saved + self.num_dirs_saved + self.num_symlinks_saved
    }

    fn record(&mut self, obj_type: ObjectType, ok: bool) {
        let counter = match (obj_type, ok) {
            (ObjectType::File, true) => &mut self.num_files_saved,
            (ObjectType::File, false) => &mut self.num_files_failed,
            (ObjectType::Directory, true) => &mut self.num_dirs_saved,
            (ObjectType::Directory, false) => &mut self.num_dirs_failed,
            (ObjectType::Symlink, true) => &mut self.num_symlinks_saved,
            (ObjectType::Symlink, false) => &mut self.num_symlinks_failed,
            _ => return,
        };
        *counter += 1;
    }
}

/// 镜像写入器
pub struct ImageWriter<D> {
    dev: PageDev<D>,
    next_object_id: u32,
    info: SaveInfo,
}

impl<D: ImageDevice> ImageWriter<D> {
    /// 创建写入器，从设备开头写入
    pub fn new(device: D, config: ImageConfig) -> Result<Self> {
        Ok(Self {
            dev: PageDev::new(device, config)?,
            next_object_id: YAFFS_FIRST_USER_OBJECT_ID,
            info: SaveInfo::default(),
        })
    }

    /// 当前统计
    pub fn info(&self) -> &SaveInfo {
        &self.info
    }

    /// 已写入的页数
    pub fn pages_written(&self) -> u64 {
        self.dev.pages_written()
    }

    /// 记录一个在写入之前就失败的对象（例如文件数据无法读取）
    pub fn count_failure(&mut self, obj_type: ObjectType) {
        self.info.record(obj_type, false);
    }

    fn allocate_id(&mut self) -> Result<u32> {
        let id = self.next_object_id;
        self.next_object_id = id
            .checked_add(1)
            .ok_or(Error::new(ErrorKind::Unsupported, "Object id space exhausted"))?;
        Ok(id)
    }

    fn write_object_header(&mut self, header: &ObjectHeader, object_id: u32) -> Result<WrittenObject> {
        let header_pos = self.dev.position();
        self.dev.write_header(header, object_id)?;
        log::debug!(
            "[WRITE] object {} {:?} parent={} at {:#x}",
            object_id,
            header.name(),
            header.parent_obj_id,
            header_pos
        );
        Ok(WrittenObject { object_id, header_pos })
    }

    fn finish_object(
        &mut self,
        obj_type: ObjectType,
        header: &ObjectHeader,
        result: Result<WrittenObject>,
    ) -> Result<WrittenObject> {
        self.info.record(obj_type, result.is_ok());
        if let Err(e) = &result {
            log::warn!("[WRITE] failed to write {:?}: {}", header.name(), e);
        }
        result
    }

    /// 写入根目录
    pub fn add_root(&mut self, header: &ObjectHeader) -> Result<WrittenObject> {
        let result = self.write_object_header(header, YAFFS_OBJECTID_ROOT);
        self.finish_object(ObjectType::Directory, header, result)
    }

    /// 写入一个目录
    pub fn add_directory(&mut self, header: &ObjectHeader) -> Result<WrittenObject> {
        let result = self
            .allocate_id()
            .and_then(|id| self.write_object_header(header, id));
        self.finish_object(ObjectType::Directory, header, result)
    }

    /// 写入一个符号链接（只有对象头）
    pub fn add_symlink(&mut self, header: &ObjectHeader) -> Result<WrittenObject> {
        let result = self
            .allocate_id()
            .and_then(|id| self.write_object_header(header, id));
        self.finish_object(ObjectType::Symlink, header, result)
    }

    /// 写入一个文件：对象头加数据页
    ///
    /// 长度为 `CHUNK_SIZE * k + r` 的数据写成 k 个满页（chunk ID 1..=k），
    /// r > 0 时再写一页，前 r 字节为数据、其余填充 0xFF，chunk ID 为 k+1。
    /// 所有数据页写完才算成功。
    pub fn add_file(&mut self, header: &ObjectHeader, data: &[u8]) -> Result<WrittenObject> {
        let result = self.write_file(header, data);
        self.finish_object(ObjectType::File, header, result)
    }

    fn write_file(&mut self, header: &ObjectHeader, data: &[u8]) -> Result<WrittenObject> {
        if u32::try_from(data.len()).is_err() {
            return Err(Error::new(ErrorKind::Unsupported, "File larger than 4 GiB"));
        }
        let object_id = self.allocate_id()?;
        let written = self.write_object_header(header, object_id)?;

        let chunk_size = self.dev.chunk_size();
        let page_goal = data.len().div_ceil(chunk_size);
        let mut pages_written = 0;
        for (i, piece) in data.chunks(chunk_size).enumerate() {
            self.dev.fill_chunk(piece)?;
            self.dev.write_page(object_id, i as u32 + 1, piece.len() as u32)?;
            pages_written += 1;
        }

        if pages_written != page_goal {
            return Err(Error::new(ErrorKind::Io, "File data incompletely written"));
        }
        log::trace!("[WRITE] object {}: {} data pages", object_id, pages_written);
        Ok(written)
    }

    /// 结束写入
    ///
    /// 刷新设备，返回设备和最终统计；`result` 在所有分类都没有失败时为 true。
    pub fn finish(mut self) -> Result<(D, SaveInfo)> {
        self.dev.flush()?;
        self.info.result = self.info.num_failures() == 0;
        log::info!(
            "[WRITE] done: result={} files={}/{} dirs={}/{} symlinks={}/{} pages={}",
            self.info.result,
            self.info.num_files_saved,
            self.info.num_files_failed,
            self.info.num_dirs_saved,
            self.info.num_dirs_failed,
            self.info.num_symlinks_saved,
            self.info.num_symlinks_failed,
            self.dev.pages_written()
        );
        Ok((self.dev.into_inner(), self.info))
    }
}
