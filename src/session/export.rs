//! 导出到外部目录

use super::Session;
use crate::error::{Error, ErrorKind, Result};
use crate::extract::extract_file;
use crate::page::{FileDevice, OpenMode, PageDev};
use crate::tree::{Condition, ItemId};
use crate::types::ObjectType;
use std::fs;
use std::path::{Path, PathBuf};

/// 导出结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInfo {
    /// 导出的文件数
    pub files_exported: u32,
    /// 创建的目录数
    pub dirs_exported: u32,
    /// 导出失败的文件数
    pub file_failures: u32,
    /// 导出失败的目录数
    pub dir_failures: u32,
    /// 导出失败的节点
    pub failed: Vec<ItemId>,
}

impl ExportInfo {
    /// 是否全部成功
    pub fn is_success(&self) -> bool {
        self.file_failures == 0 && self.dir_failures == 0
    }
}

impl Session {
    /// 把节点导出到外部目录 `dest`
    ///
    /// 文件从当前镜像中提取（每个文件重新打开一次镜像）后写入 `dest`；目录在
    /// `dest` 下创建后递归导出，根目录直接把子节点导出到 `dest`。新建但尚未
    /// 保存的节点无法导出，计为失败；符号链接被跳过。
    pub fn export_items(&self, ids: &[ItemId], dest: impl AsRef<Path>) -> ExportInfo {
        let dest = dest.as_ref();
        let mut info = ExportInfo::default();
        for &id in ids {
            self.export_item(id, dest, &mut info);
        }
        log::info!(
            "[SESSION] exported {} files, {} dirs to {} ({} failures)",
            info.files_exported,
            info.dirs_exported,
            dest.display(),
            info.file_failures + info.dir_failures
        );
        info
    }

    fn export_item(&self, id: ItemId, dest: &Path, info: &mut ExportInfo) {
        let Some(item) = self.tree.get(id) else {
            return;
        };
        match item.object_type() {
            Some(ObjectType::Directory) => self.export_dir(id, dest, info),
            Some(ObjectType::File) => match self.export_file(id, dest) {
                Ok(()) => info.files_exported += 1,
                Err(e) => {
                    log::warn!("[SESSION] export of {} failed: {}", self.tree.full_path(id), e);
                    info.file_failures += 1;
                    info.failed.push(id);
                }
            },
            _ => log::debug!("[SESSION] export skips {}", self.tree.full_path(id)),
        }
    }

    fn export_dir(&self, id: ItemId, dest: &Path, info: &mut ExportInfo) {
        let is_root = Some(id) == self.tree.root();
        let target = match self.export_dir_target(id, dest, is_root) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("[SESSION] export of {} failed: {}", self.tree.full_path(id), e);
                info.dir_failures += 1;
                info.failed.push(id);
                return;
            }
        };
        if !is_root {
            info.dirs_exported += 1;
        }
        for &child in self.tree.children(id) {
            self.export_item(child, &target, info);
        }
    }

    fn export_dir_target(&self, id: ItemId, dest: &Path, is_root: bool) -> Result<PathBuf> {
        let item = self.tree.item(id)?;
        if item.condition() == Condition::New {
            return Err(Error::new(ErrorKind::InvalidState, "Item has not been saved yet"));
        }
        let target = if is_root {
            dest.to_path_buf()
        } else {
            export_path(dest, &item.name())?
        };
        fs::create_dir_all(&target)?;
        Ok(target)
    }

    fn export_file(&self, id: ItemId, dest: &Path) -> Result<()> {
        let item = self.tree.item(id)?;
        if item.condition() == Condition::New {
            return Err(Error::new(ErrorKind::InvalidState, "Item has not been saved yet"));
        }
        let target = export_path(dest, &item.name())?;

        let data = if item.file_size() == 0 {
            Vec::new()
        } else {
            let image = self
                .image_path
                .as_deref()
                .ok_or(Error::new(ErrorKind::InvalidState, "No image open"))?;
            let header_pos = item
                .header_pos()
                .ok_or(Error::new(ErrorKind::InvalidState, "Item has no header position"))?;
            let mut dev = PageDev::new(FileDevice::open(image, OpenMode::Read)?, self.config)?;
            extract_file(&mut dev, header_pos)?
        };

        fs::create_dir_all(dest)?;
        fs::write(target, &data)?;
        Ok(())
    }
}

/// 镜像中的名字拼到导出目录下
///
/// 名字来自镜像，不可信：空名字、`.`、`..` 以及含路径分隔符的名字都被拒绝，
/// 拼接结果必须直接位于 `dest` 之下。
fn export_path(dest: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::new(ErrorKind::InvalidInput, "Unsafe object name"));
    }
    let target = dest.join(name);
    if target.parent() != Some(dest) {
        return Err(Error::new(ErrorKind::InvalidInput, "Unsafe object name"));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::export_path;
    use crate::config::ImageConfig;
    use crate::consts::*;
    use crate::error::ErrorKind;
    use crate::page::{FileDevice, OpenMode};
    use crate::session::Session;
    use crate::tree::Item;
    use crate::types::{ObjectHeader, ObjectType};
    use crate::writer::ImageWriter;
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        let big: Vec<u8> = (0..9000u32).map(|i| (i * 31 % 256) as u8).collect();
        fs::write(src.join("big.bin"), &big).unwrap();
        fs::write(src.join("empty"), b"").unwrap();
        fs::write(src.join("sub").join("small.txt"), b"tiny").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        session.import_directory(root, &src).unwrap();

        // 未保存的节点无法导出
        let out = dir.path().join("early");
        let info = session.export_items(&[root], &out);
        assert_eq!(info.dir_failures, 1);
        assert_eq!(info.failed, [root]);

        let image = dir.path().join("out.img");
        assert!(session.save_as(&image).unwrap().result);

        let out = dir.path().join("export");
        let root = session.tree().root().unwrap();
        let info = session.export_items(&[root], &out);
        assert!(info.is_success(), "{:?}", info);
        assert_eq!(info.files_exported, 3);
        assert_eq!(info.dirs_exported, 2);

        assert_eq!(fs::read(out.join("src").join("big.bin")).unwrap(), big);
        assert!(fs::read(out.join("src").join("empty")).unwrap().is_empty());
        assert_eq!(fs::read(out.join("src").join("sub").join("small.txt")).unwrap(), b"tiny");
    }

    #[test]
    fn test_export_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"alpha").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let id = session.import_file(root, &src).unwrap();

        let info = session.export_items(&[id], dir.path().join("x"));
        assert_eq!(info.file_failures, 1);

        session.save_as(dir.path().join("out.img")).unwrap();
        let info = session.export_items(&[id], dir.path().join("x"));
        assert_eq!(info.files_exported, 1);
        assert_eq!(fs::read(dir.path().join("x").join("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn test_unsafe_names_stay_inside_dest() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("hostile.img");

        let dev = FileDevice::open(&image, OpenMode::New).unwrap();
        let mut w = ImageWriter::new(dev, ImageConfig::default()).unwrap();
        w.add_root(&Item::root_header(0)).unwrap();
        for name in ["../escaped.txt", "ok.txt"] {
            let mut hdr = ObjectHeader::new_object(ObjectType::File, YAFFS_OBJECTID_ROOT, name, 0);
            hdr.file_size_low = 5;
            w.add_file(&hdr, b"pwned").unwrap();
        }
        let up = ObjectHeader::new_object(ObjectType::Directory, YAFFS_OBJECTID_ROOT, "..", 0);
        w.add_directory(&up).unwrap();
        w.finish().unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.open_image(&image).unwrap();
        let root = session.tree().root().unwrap();
        let out = dir.path().join("out");
        let info = session.export_items(&[root], &out);

        assert_eq!(info.files_exported, 1);
        assert_eq!(info.file_failures, 1);
        assert_eq!(info.dir_failures, 1);
        assert_eq!(info.failed.len(), 2);
        assert!(!dir.path().join("escaped.txt").exists());
        assert_eq!(fs::read(out.join("ok.txt")).unwrap(), b"pwned");
    }

    #[test]
    fn test_export_path_rejects() {
        let dest = Path::new("/tmp/out");
        for name in ["", ".", "..", "a/b", "/etc/passwd", "..\\x", "nul\0byte"] {
            assert_eq!(export_path(dest, name).unwrap_err().kind(), ErrorKind::InvalidInput, "{:?}", name);
        }
        assert_eq!(export_path(dest, "..hidden").unwrap(), dest.join("..hidden"));
    }
}
