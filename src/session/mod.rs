//! 镜像编辑会话
//!
//! [`Session`] 持有当前镜像路径和对象树，是界面层调用编辑功能的唯一入口：
//! 打开/新建镜像、修改节点属性、批量删除、导入外部文件、导出到外部目录、
//! 另存为新镜像。树结构变化通过注册的监听器以 [`SessionEvent`] 通知调用方。
//!
//! - session/import.rs - 导入外部文件和目录
//! - session/export.rs - 导出到外部目录
//! - session/save.rs - 另存为 / 保存

mod export;
mod import;
mod save;

pub use export::ExportInfo;

use crate::config::ImageConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::page::{FileDevice, OpenMode};
use crate::reader::ReadInfo;
use crate::tree::{read_tree, Condition, ItemId, ObjectTree, RemovedRange};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// 会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 整棵树发生变化（打开、新建、导入、保存后）
    LayoutChanged,
    /// 一个节点的属性发生变化
    ItemChanged(ItemId),
    /// 一个父节点下删除了一段连续的行
    RowsRemoved(RemovedRange),
}

/// 一次属性修改
///
/// 为 `None` 的字段保持不变。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyEdit {
    /// 新名字（超长截断）
    pub name: Option<String>,
    /// 新权限位（低 12 位，类型位保留）
    pub permissions: Option<u32>,
    /// 新符号链接目标（仅符号链接）
    pub alias: Option<String>,
    /// 新用户 ID
    pub uid: Option<u32>,
    /// 新组 ID
    pub gid: Option<u32>,
}

type Listener = Box<dyn FnMut(&SessionEvent)>;

/// 镜像编辑会话
pub struct Session {
    config: ImageConfig,
    tree: ObjectTree,
    image_path: Option<PathBuf>,
    num_new: usize,
    num_dirty: usize,
    num_deleted: usize,
    listener: Option<Listener>,
}

impl Session {
    /// 创建会话，尚未打开任何镜像
    pub fn new(config: ImageConfig) -> Self {
        Self {
            config,
            tree: ObjectTree::new(),
            image_path: None,
            num_new: 0,
            num_dirty: 0,
            num_deleted: 0,
            listener: None,
        }
    }

    /// 注册事件监听器，替换之前的监听器
    pub fn set_listener(&mut self, listener: impl FnMut(&SessionEvent) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// 移除事件监听器
    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// 页面几何
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// 对象树
    pub fn tree(&self) -> &ObjectTree {
        &self.tree
    }

    /// 当前镜像路径
    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    /// 是否有打开的镜像（或新建的镜像）
    pub fn is_image_open(&self) -> bool {
        self.tree.root().is_some()
    }

    /// 是否有未保存的修改
    pub fn is_dirty(&self) -> bool {
        self.num_new + self.num_dirty + self.num_deleted > 0
    }

    /// 新建的节点数
    pub fn num_new(&self) -> usize {
        self.num_new
    }

    /// 修改过的节点数
    pub fn num_dirty(&self) -> usize {
        self.num_dirty
    }

    /// 删除的节点数
    pub fn num_deleted(&self) -> usize {
        self.num_deleted
    }

    /// 打开镜像时无法挂入对象树的对象
    pub fn orphans(&self) -> &[ItemId] {
        self.tree.orphans()
    }

    /// 新建空镜像
    ///
    /// 对象树只有一个新建的根目录；`path` 成为 [`save`](Self::save) 的目标。
    pub fn new_image(&mut self, path: impl AsRef<Path>) {
        self.tree = ObjectTree::with_new_root(now());
        self.image_path = Some(path.as_ref().to_path_buf());
        self.reset_counters();
        self.num_new = 1;
        log::info!("[SESSION] new image {}", path.as_ref().display());
        self.emit(SessionEvent::LayoutChanged);
    }

    /// 打开并扫描镜像
    ///
    /// 文件无法打开时返回 `Err`；扫描本身的失败记录在 [`ReadInfo::result`] 中，
    /// 此时已经读出的对象仍然组成对象树。
    pub fn open_image(&mut self, path: impl AsRef<Path>) -> Result<ReadInfo> {
        let path = path.as_ref();
        let device = FileDevice::open(path, OpenMode::Read)?;
        let (tree, info) = read_tree(device, self.config)?;

        self.tree = tree;
        self.image_path = Some(path.to_path_buf());
        self.reset_counters();
        log::info!(
            "[SESSION] opened {}: {} objects, {} orphans",
            path.display(),
            info.num_objects(),
            info.num_orphans
        );
        self.emit(SessionEvent::LayoutChanged);
        Ok(info)
    }

    /// 修改节点属性
    ///
    /// # 返回
    ///
    /// 是否有任何字段发生变化
    pub fn edit_item(&mut self, id: ItemId, edit: &PropertyEdit) -> Result<bool> {
        let item = self.tree.item_mut(id)?;
        let was_clean = item.condition() == Condition::Clean;

        let mut changed = false;
        if let Some(name) = &edit.name {
            changed |= item.set_name(name);
        }
        if let Some(permissions) = edit.permissions {
            changed |= item.set_permissions(permissions);
        }
        if let Some(alias) = &edit.alias {
            changed |= item.set_alias(alias);
        }
        if let Some(uid) = edit.uid {
            changed |= item.set_uid(uid);
        }
        if let Some(gid) = edit.gid {
            changed |= item.set_gid(gid);
        }

        if was_clean && item.condition() == Condition::Dirty {
            self.num_dirty += 1;
        }
        if changed {
            log::debug!("[SESSION] edited {}", self.tree.full_path(id));
            self.emit(SessionEvent::ItemChanged(id));
        }
        Ok(changed)
    }

    /// 批量删除节点
    ///
    /// 所有节点先标记再一次性删除，每个连续区间发出一个
    /// [`SessionEvent::RowsRemoved`]。
    ///
    /// # 返回
    ///
    /// 被删除的节点数（不含随子树一起删除的后代）
    pub fn delete_items(&mut self, ids: &[ItemId]) -> Result<usize> {
        // 先全部校验，避免出错时留下一部分标记
        for &id in ids {
            if Some(id) == self.tree.root() {
                return Err(Error::new(ErrorKind::InvalidInput, "Root cannot be deleted"));
            }
            self.tree.item(id)?;
            let reachable = self
                .tree
                .root()
                .is_some_and(|root| self.tree.is_ancestor_or_self(root, id));
            if !reachable {
                return Err(Error::new(ErrorKind::InvalidInput, "Item is not in the tree"));
            }
        }
        for &id in ids {
            self.tree.mark_for_delete(id)?;
        }

        let listener = &mut self.listener;
        let removed = self.tree.remove_marked(|range| {
            if let Some(listener) = listener.as_mut() {
                listener(&SessionEvent::RowsRemoved(range));
            }
        });
        self.num_deleted += removed;
        log::info!("[SESSION] deleted {} items", removed);
        Ok(removed)
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&event);
        }
    }

    fn reset_counters(&mut self) {
        self.num_new = 0;
        self.num_dirty = 0;
        self.num_deleted = 0;
    }

    fn require_dir(&self, id: ItemId) -> Result<()> {
        if self.tree.item(id)?.is_dir() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidInput, "Target is not a directory"))
        }
    }
}

/// 解析 uid/gid 文本
///
/// 只保留数字字符，溢出时截断为 `u32::MAX`，没有数字时为 0。
pub fn parse_numeric_id(text: &str) -> u32 {
    text.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d))
}

/// 当前时间（UNIX 秒）
fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::page::{FileDevice, OpenMode};
    use crate::tree::{Item, ItemFlags};
    use crate::types::{ObjectHeader, ObjectType};
    use crate::writer::ImageWriter;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    fn write_file(path: &Path, data: &[u8]) {
        fs::write(path, data).unwrap();
    }

    fn recorder(session: &mut Session) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.set_listener(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_parse_numeric_id() {
        assert_eq!(parse_numeric_id("1000"), 1000);
        assert_eq!(parse_numeric_id(" 10a0b "), 100);
        assert_eq!(parse_numeric_id(""), 0);
        assert_eq!(parse_numeric_id("system"), 0);
        assert_eq!(parse_numeric_id("4294967295"), u32::MAX);
        assert_eq!(parse_numeric_id("99999999999"), u32::MAX);
    }

    #[test]
    fn test_new_image_has_new_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(ImageConfig::default());
        assert!(!session.is_image_open());
        let events = recorder(&mut session);

        session.new_image(dir.path().join("new.img"));
        assert!(session.is_image_open());
        assert!(session.is_dirty());

        let root = session.tree().root().unwrap();
        let item = session.tree().get(root).unwrap();
        assert_eq!(item.condition(), Condition::New);
        assert_eq!(item.header().mode, YAFFS_ROOT_DEFAULT_MODE);
        assert_eq!(item.object_type(), Some(ObjectType::Directory));
        assert_eq!(events.borrow().as_slice(), [SessionEvent::LayoutChanged]);
    }

    #[test]
    fn test_open_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(ImageConfig::default());
        let err = session.open_image(dir.path().join("nope.img")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!session.is_image_open());
    }

    #[test]
    fn test_edit_and_delete_events() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        for name in ["a", "b", "c", "d"] {
            write_file(&src.join(name), name.as_bytes());
        }

        let mut session = Session::new(ImageConfig::default());
        session.new_image(dir.path().join("new.img"));
        let root = session.tree().root().unwrap();
        let imported = session.import_directory(root, &src).unwrap();
        session.save_as(dir.path().join("saved.img")).unwrap();
        assert!(!session.is_dirty());

        let events = recorder(&mut session);
        let kids = session.tree().children(imported).to_vec();
        let edit = PropertyEdit {
            uid: Some(parse_numeric_id("1000")),
            permissions: Some(0o640),
            ..Default::default()
        };
        assert!(session.edit_item(kids[0], &edit).unwrap());
        assert!(!session.edit_item(kids[0], &edit).unwrap());
        assert_eq!(session.num_dirty(), 1);
        assert!(session.is_dirty());
        let item = session.tree().get(kids[0]).unwrap();
        assert_eq!(item.header().mode, S_IFREG | 0o640);
        assert_eq!(item.condition(), Condition::Dirty);

        assert_eq!(session.delete_items(&[kids[1], kids[3], kids[2]]).unwrap(), 3);
        assert_eq!(session.tree().children(imported), &kids[..1]);
        assert_eq!(session.num_deleted(), 3);
        assert_eq!(
            events.borrow().as_slice(),
            [
                SessionEvent::ItemChanged(kids[0]),
                SessionEvent::RowsRemoved(RemovedRange { parent: imported, start: 1, count: 3 }),
            ]
        );

        assert_eq!(session.delete_items(&[root]).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_delete_rejects_orphan() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("orphan.img");
        let dev = FileDevice::open(&image, OpenMode::New).unwrap();
        let mut w = ImageWriter::new(dev, ImageConfig::default()).unwrap();
        w.add_root(&Item::root_header(0)).unwrap();
        let lost = ObjectHeader::new_object(ObjectType::Directory, 999, "lost", 0);
        w.add_directory(&lost).unwrap();
        w.finish().unwrap();

        let mut session = Session::new(ImageConfig::default());
        assert_eq!(session.open_image(&image).unwrap().num_orphans, 1);
        let orphan = session.orphans()[0];

        let err = session.delete_items(&[orphan]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let item = session.tree().get(orphan).unwrap();
        assert_eq!(item.flags(), ItemFlags::empty());
        assert_eq!(session.num_deleted(), 0);
    }
}
