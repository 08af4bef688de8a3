//! 对象树节点

use super::ItemId;
use crate::consts::*;
use crate::types::{ObjectHeader, ObjectType};
use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;

/// 节点状态
///
/// 字段修改只会把 `Clean` 变为 `Dirty`；`New` 和 `Moved` 不受字段修改影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// 与镜像一致
    Clean,
    /// 已修改
    Dirty,
    /// 新建，尚未保存
    New,
    /// 已移动
    Moved,
}

bitflags! {
    /// 删除标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ItemFlags: u8 {
        /// 节点本身待删除
        const MARKED_FOR_DELETE = 0x01;
        /// 有后代节点待删除
        const HAS_DESCENDANT_MARKED = 0x02;
    }
}

/// 对象树节点
#[derive(Debug, Clone)]
pub struct Item {
    pub(super) object_id: Option<u32>,
    pub(super) header_pos: Option<u64>,
    pub(super) header: ObjectHeader,
    pub(super) condition: Condition,
    pub(super) flags: ItemFlags,
    pub(super) external_path: Option<String>,
    pub(super) parent: Option<ItemId>,
    pub(super) children: Vec<ItemId>,
}

impl Item {
    /// 从镜像读出的节点（`Clean`）
    pub fn from_image(object_id: u32, header: ObjectHeader, header_pos: Option<u64>) -> Self {
        Self {
            object_id: Some(object_id),
            header_pos,
            header,
            condition: Condition::Clean,
            flags: ItemFlags::empty(),
            external_path: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// 新建节点（`New`，尚未分配对象 ID）
    pub fn new_object(header: ObjectHeader, external_path: Option<String>) -> Self {
        Self {
            object_id: None,
            header_pos: None,
            header,
            condition: Condition::New,
            flags: ItemFlags::empty(),
            external_path,
            parent: None,
            children: Vec::new(),
        }
    }

    /// 默认根目录的对象头
    ///
    /// 类型为目录，mode 为 `S_IFDIR | 0771`，uid/gid 为 0，名字为空。
    pub fn root_header(now: u32) -> ObjectHeader {
        let mut header =
            ObjectHeader::new_object(ObjectType::Directory, YAFFS_OBJECTID_ROOT, "", now);
        header.mode = YAFFS_ROOT_DEFAULT_MODE;
        header.uid = 0;
        header.gid = 0;
        header
    }

    /// 对象 ID（新建节点保存前为 `None`）
    pub fn object_id(&self) -> Option<u32> {
        self.object_id
    }

    /// 对象头在镜像中的位置（尚未写入时为 `None`）
    pub fn header_pos(&self) -> Option<u64> {
        self.header_pos
    }

    /// 对象头
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// 节点状态
    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// 删除标志
    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    /// 导入文件的外部路径
    pub fn external_path(&self) -> Option<&str> {
        self.external_path.as_deref()
    }

    /// 父节点
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// 子节点（插入顺序）
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    /// 对象类型
    pub fn object_type(&self) -> Option<ObjectType> {
        self.header.object_type()
    }

    /// 名字
    pub fn name(&self) -> String {
        self.header.name()
    }

    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        self.object_type() == Some(ObjectType::Directory)
    }

    /// 是否为普通文件
    pub fn is_file(&self) -> bool {
        self.object_type() == Some(ObjectType::File)
    }

    /// 是否为符号链接
    pub fn is_symlink(&self) -> bool {
        self.object_type() == Some(ObjectType::Symlink)
    }

    /// 文件大小（低 32 位）
    pub fn file_size(&self) -> u32 {
        self.header.file_size_low
    }

    /// 改名，超长时截断；空名字被忽略
    pub fn set_name(&mut self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let changed = self.header.set_name(name);
        self.mark_changed(changed)
    }

    /// 设置权限位（低 12 位），保留类型位
    pub fn set_permissions(&mut self, permissions: u32) -> bool {
        let mode = (self.header.mode & !MODE_PERMISSION_MASK) | (permissions & MODE_PERMISSION_MASK);
        self.set_mode(mode)
    }

    /// 设置完整的 mode
    pub fn set_mode(&mut self, mode: u32) -> bool {
        let changed = self.header.mode != mode;
        self.header.mode = mode;
        self.mark_changed(changed)
    }

    /// 设置符号链接目标，超长时截断
    ///
    /// 只对符号链接生效，空目标被忽略。
    pub fn set_alias(&mut self, alias: &str) -> bool {
        if !self.is_symlink() || alias.is_empty() {
            return false;
        }
        let changed = self.header.set_alias(alias);
        self.mark_changed(changed)
    }

    /// 设置用户 ID
    pub fn set_uid(&mut self, uid: u32) -> bool {
        let changed = self.header.uid != uid;
        self.header.uid = uid;
        self.mark_changed(changed)
    }

    /// 设置组 ID
    pub fn set_gid(&mut self, gid: u32) -> bool {
        let changed = self.header.gid != gid;
        self.header.gid = gid;
        self.mark_changed(changed)
    }

    /// 保存成功后更新节点：记录新的 ID 和位置，状态回到 `Clean`
    pub(crate) fn mark_saved(&mut self, object_id: u32, header_pos: u64, parent_obj_id: u32) {
        self.object_id = Some(object_id);
        self.header_pos = Some(header_pos);
        self.header.parent_obj_id = parent_obj_id;
        self.condition = Condition::Clean;
        self.external_path = None;
    }

    fn mark_changed(&mut self, changed: bool) -> bool {
        if changed && self.condition == Condition::Clean {
            self.condition = Condition::Dirty;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_file() -> Item {
        let mut hdr = ObjectHeader::new_object(ObjectType::File, 1, "build.prop", 0);
        hdr.mode = S_IFREG | 0o644;
        Item::from_image(300, hdr, Some(0))
    }

    #[test]
    fn test_first_change_makes_dirty() {
        let mut item = clean_file();
        assert_eq!(item.condition(), Condition::Clean);
        assert!(!item.set_name("build.prop"));
        assert_eq!(item.condition(), Condition::Clean);
        assert!(item.set_uid(1000));
        assert_eq!(item.condition(), Condition::Dirty);
        assert!(item.set_gid(1000));
        assert_eq!(item.condition(), Condition::Dirty);
    }

    #[test]
    fn test_new_item_stays_new() {
        let hdr = ObjectHeader::new_object(ObjectType::File, 1, "a", 0);
        let mut item = Item::new_object(hdr, Some("/tmp/a".into()));
        assert!(item.set_name("b"));
        assert_eq!(item.condition(), Condition::New);
        assert_eq!(item.external_path(), Some("/tmp/a"));
        assert_eq!(item.object_id(), None);
    }

    #[test]
    fn test_permissions_keep_type_bits() {
        let mut item = clean_file();
        assert!(item.set_permissions(0o4755));
        assert_eq!(item.header().mode, S_IFREG | 0o4755);
        assert!(!item.set_permissions(0o4755));
        assert_eq!(item.header().mode_string(), "-rwsr-xr-x");
    }

    #[test]
    fn test_alias_only_for_symlinks() {
        let mut item = clean_file();
        assert!(!item.set_alias("/system/bin/sh"));
        assert_eq!(item.condition(), Condition::Clean);

        let hdr = ObjectHeader::new_object(ObjectType::Symlink, 1, "sh", 0);
        let mut link = Item::from_image(301, hdr, Some(0));
        assert!(link.set_alias("/system/bin/mksh"));
        assert!(!link.set_alias(""));
        assert_eq!(link.header().alias(), "/system/bin/mksh");
        assert_eq!(link.condition(), Condition::Dirty);
    }

    #[test]
    fn test_empty_name_ignored() {
        let mut item = clean_file();
        assert!(!item.set_name(""));
        assert_eq!(item.name(), "build.prop");
        assert_eq!(item.condition(), Condition::Clean);
    }

    #[test]
    fn test_root_header() {
        let hdr = Item::root_header(7);
        assert_eq!(hdr.mode, S_IFDIR | 0o771);
        assert_eq!(hdr.parent_obj_id, YAFFS_OBJECTID_ROOT);
        assert_eq!(hdr.name(), "");
        assert_eq!((hdr.uid, hdr.gid, hdr.ctime), (0, 0, 7));
    }
}
