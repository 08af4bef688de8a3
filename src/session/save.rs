//! 另存为 / 保存
//!
//! 保存总是完整重写：从根目录开始前序遍历对象树，为每个对象重新分配 ID，
//! 子对象的父对象 ID 改写为父目录新分配的 ID。文件数据来自导入时记录的
//! 外部文件，或者从当前镜像中提取。
//!
//! 新的 ID 和对象头位置先暂存，只有全部对象都写入成功才提交到对象树。

use super::{Session, SessionEvent};
use crate::config::ImageConfig;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use crate::extract::extract_file;
use crate::page::{FileDevice, OpenMode, PageDev};
use crate::tree::ItemId;
use crate::types::ObjectType;
use crate::writer::{ImageWriter, SaveInfo, WrittenObject};
use std::fs;
use std::path::{Path, PathBuf};

/// 待提交的保存结果
struct Staged {
    id: ItemId,
    written: WrittenObject,
    parent_obj_id: u32,
}

/// 保存时按需打开的源镜像
struct SourceImage<'a> {
    path: Option<&'a Path>,
    config: ImageConfig,
    dev: Option<PageDev<FileDevice>>,
}

impl SourceImage<'_> {
    fn device(&mut self) -> Result<&mut PageDev<FileDevice>> {
        if self.dev.is_none() {
            let path = self
                .path
                .ok_or(Error::new(ErrorKind::InvalidState, "No source image"))?;
            self.dev = Some(PageDev::new(FileDevice::open(path, OpenMode::Read)?, self.config)?);
        }
        self.dev
            .as_mut()
            .ok_or(Error::new(ErrorKind::InvalidState, "No source image"))
    }
}

impl Session {
    /// 把当前对象树另存为新镜像
    ///
    /// 不能保存到当前打开的镜像（使用 [`save`](Self::save)）。单个对象失败不会
    /// 中断保存，失败计入 [`SaveInfo`]；只有全部成功时对象树才更新为新镜像的
    /// ID 和位置，修改计数清零，`path` 成为当前镜像。
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<SaveInfo> {
        let path = path.as_ref();
        if let Some(current) = self.image_path.as_deref() {
            if same_file(current, path) {
                return Err(Error::new(
                    ErrorKind::AlreadyExists,
                    "Cannot save over the open image",
                ));
            }
        }

        let (info, staged) = self.write_image(path)?;
        if info.result {
            self.commit(staged, path);
        }
        Ok(info)
    }

    /// 保存到当前镜像
    ///
    /// 先完整写入 `<image>.tmp`，成功后再替换原镜像；失败时删除临时文件，
    /// 原镜像保持不变。
    pub fn save(&mut self) -> Result<SaveInfo> {
        let image = self
            .image_path
            .clone()
            .ok_or(Error::new(ErrorKind::InvalidState, "No image open"))?;
        let mut tmp = image.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let (info, staged) = self.write_image(&tmp)?;
        if !info.result {
            if let Err(e) = fs::remove_file(&tmp) {
                log::warn!("[SESSION] could not remove {}: {}", tmp.display(), e);
            }
            return Ok(info);
        }

        fs::rename(&tmp, &image)?;
        self.commit(staged, &image);
        Ok(info)
    }

    fn write_image(&self, target: &Path) -> Result<(SaveInfo, Vec<Staged>)> {
        let root = self
            .tree
            .root()
            .ok_or(Error::new(ErrorKind::InvalidState, "No image open"))?;

        let device = FileDevice::open(target, OpenMode::New)?;
        let mut writer = ImageWriter::new(device, self.config)?;
        let mut source = SourceImage {
            path: self.image_path.as_deref(),
            config: self.config,
            dev: None,
        };
        let mut staged = Vec::new();

        let mut header = self.tree.item(root)?.header().clone();
        header.parent_obj_id = YAFFS_OBJECTID_ROOT;
        if let Ok(written) = writer.add_root(&header) {
            staged.push(Staged {
                id: root,
                written,
                parent_obj_id: YAFFS_OBJECTID_ROOT,
            });
            self.write_children(root, YAFFS_OBJECTID_ROOT, &mut writer, &mut source, &mut staged);
        }

        let (_, info) = writer.finish()?;
        log::info!(
            "[SESSION] wrote {}: {} objects, {} failures",
            target.display(),
            info.num_saved(),
            info.num_failures()
        );
        Ok((info, staged))
    }

    fn write_children(
        &self,
        dir: ItemId,
        dir_obj_id: u32,
        writer: &mut ImageWriter<FileDevice>,
        source: &mut SourceImage<'_>,
        staged: &mut Vec<Staged>,
    ) {
        for &child in self.tree.children(dir) {
            let Some(item) = self.tree.get(child) else {
                continue;
            };
            let mut header = item.header().clone();
            header.parent_obj_id = dir_obj_id;

            let result = match item.object_type() {
                Some(ObjectType::Directory) => writer.add_directory(&header),
                Some(ObjectType::Symlink) => writer.add_symlink(&header),
                Some(ObjectType::File) => match self.file_data(child, source) {
                    Ok(data) => writer.add_file(&header, &data),
                    Err(e) => {
                        log::warn!(
                            "[SESSION] no data for {}: {}",
                            self.tree.full_path(child),
                            e
                        );
                        writer.count_failure(ObjectType::File);
                        continue;
                    }
                },
                _ => continue,
            };

            let Ok(written) = result else {
                continue;
            };
            staged.push(Staged {
                id: child,
                written,
                parent_obj_id: dir_obj_id,
            });
            if item.is_dir() {
                self.write_children(child, written.object_id, writer, source, staged);
            }
        }
    }

    /// 文件数据：导入的文件读外部路径，其余从源镜像提取
    fn file_data(&self, id: ItemId, source: &mut SourceImage<'_>) -> Result<Vec<u8>> {
        let item = self.tree.item(id)?;
        let size = item.file_size() as usize;

        if let Some(external) = item.external_path() {
            let data = fs::read(external)?;
            if data.len() != size {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    "External file changed size since import",
                ));
            }
            return Ok(data);
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let header_pos = item
            .header_pos()
            .ok_or(Error::new(ErrorKind::InvalidState, "Item has no header position"))?;
        extract_file(source.device()?, header_pos)
    }

    fn commit(&mut self, staged: Vec<Staged>, path: &Path) {
        for s in staged {
            if let Some(item) = self.tree.get_mut(s.id) {
                item.mark_saved(s.written.object_id, s.written.header_pos, s.parent_obj_id);
            }
        }
        self.image_path = Some(path.to_path_buf());
        self.reset_counters();
        log::info!("[SESSION] saved {}", path.display());
        self.emit(SessionEvent::LayoutChanged);
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
