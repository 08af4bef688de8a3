//! 镜像扫描
//!
//! 顺序读取镜像中的每一页，识别对象头页面并分类计数。
//! 文件、目录和符号链接以 [`ObjectEvent`] 的形式交给 [`ScanObserver`]，
//! 由观察者（通常是 [`TreeBuilder`](crate::tree::TreeBuilder)）重建对象树。
//!
//! 扫描只做一次顺序遍历：遇到文件对象头后，按文件大小相对跳过其数据区，
//! 不逐页读取文件内容。

use crate::config::ImageConfig;
use crate::consts::*;
use crate::error::Result;
use crate::page::{ImageDevice, PageDev, PageRead};
use crate::types::{ObjectHeader, ObjectType};

/// 扫描到的一个对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    /// 对象 ID（来自对象头页面的 tags）
    pub object_id: u32,
    /// 解码后的对象头
    pub header: ObjectHeader,
    /// 对象头页面在镜像中的字节偏移
    pub header_pos: u64,
}

/// 扫描观察者
///
/// 扫描过程中对每个被接受的对象调用一次 [`new_object`](Self::new_object)，
/// 扫描结束（无论成功与否）时调用一次 [`scan_complete`](Self::scan_complete)。
pub trait ScanObserver {
    /// 发现一个文件、目录或符号链接
    fn new_object(&mut self, event: ObjectEvent);

    /// 扫描结束
    fn scan_complete(&mut self) {}
}

/// 扫描结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadInfo {
    /// 扫描是否成功（设备读取出错时为 false）
    pub result: bool,
    /// 镜像末尾存在不完整的页
    pub eof_has_incomplete_page: bool,
    /// 文件数
    pub num_files: u32,
    /// 目录数（含根目录）
    pub num_dirs: u32,
    /// 符号链接数
    pub num_symlinks: u32,
    /// 硬链接数
    pub num_hardlinks: u32,
    /// 特殊文件数
    pub num_specials: u32,
    /// 类型为 unknown 的对象数
    pub num_unknowns: u32,
    /// 类型值无法识别的对象数
    pub num_erroneous: u32,
    /// 完整读取的页数
    pub num_pages: u64,
    /// 无法挂入对象树的孤儿对象数（重建对象树后填写）
    pub num_orphans: u32,
}

impl ReadInfo {
    /// 所有分类的对象总数
    pub fn num_objects(&self) -> u32 {
        self.num_files
            + self.num_dirs
            + self.num_symlinks
            + self.num_hardlinks
            + self.num_specials
            + self.num_unknowns
            + self.num_erroneous
    }
}

/// 镜像扫描器
pub struct ImageReader<D> {
    dev: PageDev<D>,
}

impl<D: ImageDevice> ImageReader<D> {
    /// 创建扫描器，从镜像开头读取
    pub fn new(device: D, config: ImageConfig) -> Result<Self> {
        Ok(Self {
            dev: PageDev::new(device, config)?,
        })
    }

    /// 取回底层设备
    pub fn into_inner(self) -> D {
        self.dev.into_inner()
    }

    /// 扫描整个镜像
    ///
    /// 设备错误不会以 `Err` 返回，而是记录在 [`ReadInfo::result`] 中；
    /// 出错前已经交给观察者的对象仍然有效。
    pub fn scan(&mut self, observer: &mut dyn ScanObserver) -> ReadInfo {
        let mut info = ReadInfo::default();
        let page_size = self.dev.page_size() as u64;

        self.dev.seek_to(0);
        loop {
            let header_pos = self.dev.position();
            match self.dev.read_page() {
                Ok(PageRead::Full) => {}
                Ok(PageRead::Eof) => {
                    info.result = true;
                    break;
                }
                Ok(PageRead::Partial(n)) => {
                    log::warn!("[SCAN] incomplete page at {:#x} ({} bytes)", header_pos, n);
                    info.result = true;
                    info.eof_has_incomplete_page = true;
                    break;
                }
                Err(e) => {
                    log::error!("[SCAN] read failed at {:#x}: {}", header_pos, e);
                    break;
                }
            }

            let tags = match self.dev.tags() {
                Ok(tags) => tags,
                Err(e) => {
                    log::error!("[SCAN] bad spare at {:#x}: {}", header_pos, e);
                    break;
                }
            };
            if !tags.is_object_header() {
                log::trace!(
                    "[SCAN] skip chunk obj={} chunk={} at {:#x}",
                    tags.obj_id,
                    tags.chunk_id,
                    header_pos
                );
                continue;
            }

            let header = ObjectHeader::decode(self.dev.chunk());
            let accepted = match header.object_type() {
                Some(ObjectType::File) => {
                    info.num_files += 1;
                    // 跳过数据区：ceil(size / PAGE_SIZE) 页，剩余的数据页按普通页忽略
                    let size = header.file_size_low as u64;
                    self.dev.skip(size.div_ceil(page_size) * page_size);
                    true
                }
                Some(ObjectType::Directory) => {
                    info.num_dirs += 1;
                    true
                }
                Some(ObjectType::Symlink) => {
                    info.num_symlinks += 1;
                    true
                }
                Some(ObjectType::Hardlink) => {
                    info.num_hardlinks += 1;
                    false
                }
                Some(ObjectType::Special) => {
                    info.num_specials += 1;
                    false
                }
                Some(ObjectType::Unknown) => {
                    info.num_unknowns += 1;
                    false
                }
                None => {
                    log::warn!(
                        "[SCAN] object {} has invalid type {} at {:#x}",
                        tags.obj_id,
                        header.obj_type,
                        header_pos
                    );
                    info.num_erroneous += 1;
                    false
                }
            };

            log::debug!(
                "[SCAN] object {} type={} parent={} name={:?} at {:#x}",
                tags.obj_id,
                header.obj_type,
                header.parent_obj_id,
                header.name(),
                header_pos
            );

            if accepted {
                observer.new_object(ObjectEvent {
                    object_id: tags.obj_id,
                    header,
                    header_pos,
                });
            }
        }

        info.num_pages = self.dev.pages_read();
        observer.scan_complete();

        log::info!(
            "[SCAN] done: result={} files={} dirs={} symlinks={} pages={}",
            info.result,
            info.num_files,
            info.num_dirs,
            info.num_symlinks,
            info.num_pages
        );
        info
    }
}
