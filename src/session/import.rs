//! 导入外部文件和目录

use super::{now, Session, SessionEvent};
use crate::error::{Error, ErrorKind, Result};
use crate::tree::{Item, ItemId};
use crate::types::{ObjectHeader, ObjectType};
use std::fs;
use std::path::Path;

impl Session {
    /// 导入一个外部文件
    ///
    /// 新节点继承父目录的权限位、uid 和 gid，类型位设为普通文件，数据在保存时
    /// 才从 `path` 读取。超过 4 GiB 的文件返回 `Unsupported`。
    pub fn import_file(&mut self, parent: ItemId, path: impl AsRef<Path>) -> Result<ItemId> {
        let id = self.import_file_inner(parent, path.as_ref())?;
        self.emit(SessionEvent::LayoutChanged);
        Ok(id)
    }

    /// 递归导入一个外部目录
    ///
    /// 目录项按名字排序后依次导入；外部的符号链接和特殊文件被跳过。
    pub fn import_directory(&mut self, parent: ItemId, path: impl AsRef<Path>) -> Result<ItemId> {
        let id = self.import_directory_inner(parent, path.as_ref())?;
        self.emit(SessionEvent::LayoutChanged);
        Ok(id)
    }

    fn import_file_inner(&mut self, parent: ItemId, path: &Path) -> Result<ItemId> {
        self.require_dir(parent)?;
        let meta = fs::metadata(path)?;
        if !meta.is_file() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a regular file"));
        }
        let size = u32::try_from(meta.len())
            .map_err(|_| Error::new(ErrorKind::Unsupported, "File larger than 4 GiB"))?;
        // 保存时才读取数据，记录绝对路径
        let absolute = fs::canonicalize(path)?;
        let external = absolute
            .to_str()
            .ok_or(Error::new(ErrorKind::InvalidInput, "Path is not valid UTF-8"))?;

        let mut header = self.child_header(parent, ObjectType::File, path)?;
        header.file_size_low = size;
        let id = self
            .tree
            .insert_child(parent, Item::new_object(header, Some(external.into())))?;
        self.num_new += 1;
        log::debug!("[SESSION] imported file {} ({} bytes)", path.display(), size);
        Ok(id)
    }

    fn import_directory_inner(&mut self, parent: ItemId, path: &Path) -> Result<ItemId> {
        self.require_dir(parent)?;
        if !fs::metadata(path)?.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }

        let header = self.child_header(parent, ObjectType::Directory, path)?;
        let id = self.tree.insert_child(parent, Item::new_object(header, None))?;
        self.num_new += 1;
        log::debug!("[SESSION] imported directory {}", path.display());

        let mut entries = fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let file_type = entry.file_type()?;
            let entry_path = entry.path();
            if file_type.is_dir() {
                self.import_directory_inner(id, &entry_path)?;
            } else if file_type.is_file() {
                self.import_file_inner(id, &entry_path)?;
            } else {
                log::debug!("[SESSION] skipping {}", entry_path.display());
            }
        }
        Ok(id)
    }

    /// 新建子节点的对象头：名字取自路径，mode/uid/gid 继承父目录
    fn child_header(&self, parent: ItemId, obj_type: ObjectType, path: &Path) -> Result<ObjectHeader> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or(Error::new(ErrorKind::InvalidInput, "Path has no usable file name"))?;

        let parent_item = self.tree.item(parent)?;
        let parent_header = parent_item.header();
        let parent_obj_id = parent_item.object_id().unwrap_or(u32::MAX);

        let mut header = ObjectHeader::new_object(obj_type, parent_obj_id, name, now());
        header.mode = obj_type.mode_type_bits() | parent_header.permissions();
        header.uid = parent_header.uid;
        header.gid = parent_header.gid;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ImageConfig;
    use crate::consts::*;
    use crate::error::ErrorKind;
    use crate::session::Session;
    use crate::tree::Condition;
    use std::fs;

    #[test]
    fn test_import_inherits_parent_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        fs::write(&src, b"hello").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let id = session.import_file(root, &src).unwrap();

        let item = session.tree().get(id).unwrap();
        assert_eq!(item.name(), "notes.txt");
        assert_eq!(item.condition(), Condition::New);
        assert_eq!(item.header().mode, S_IFREG | 0o771);
        assert_eq!((item.header().uid, item.header().gid), (0, 0));
        assert_eq!(item.file_size(), 5);
        let absolute = fs::canonicalize(&src).unwrap();
        assert_eq!(item.external_path(), absolute.to_str());
        // 未使用的字段保持擦除态
        assert_eq!(item.header().equiv_id, 0xFFFF_FFFF);
        assert_eq!(session.tree().full_path(id), "/notes.txt");
        assert_eq!(session.num_new(), 2);
    }

    #[test]
    fn test_import_directory_sorted_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("etc");
        fs::create_dir_all(src.join("init")).unwrap();
        fs::write(src.join("zz.conf"), b"z").unwrap();
        fs::write(src.join("aa.conf"), b"a").unwrap();
        fs::write(src.join("init").join("boot.rc"), b"on boot").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let etc = session.import_directory(root, &src).unwrap();

        let tree = session.tree();
        let paths: Vec<_> = tree.walk(etc).into_iter().map(|id| tree.full_path(id)).collect();
        assert_eq!(paths, ["/etc", "/etc/aa.conf", "/etc/init", "/etc/init/boot.rc", "/etc/zz.conf"]);
        assert_eq!(tree.get(etc).unwrap().header().mode, S_IFDIR | 0o771);
    }

    #[test]
    fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("f");
        fs::write(&src, b"x").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let file = session.import_file(root, &src).unwrap();

        assert_eq!(session.import_file(file, &src).unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(
            session.import_file(root, dir.path().join("missing")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(session.import_file(root, dir.path()).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_import_records_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"abc").unwrap();

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let id = session.import_file(root, dir.path().join("sub").join("..").join("a.txt")).unwrap();

        let stored = session.tree().get(id).unwrap().external_path().unwrap();
        let stored = std::path::Path::new(stored);
        assert!(stored.is_absolute());
        assert!(!stored.components().any(|c| c == std::path::Component::ParentDir));
        assert_eq!(stored, fs::canonicalize(&src).unwrap());
    }
}
