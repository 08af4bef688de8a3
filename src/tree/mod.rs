//! 对象树
//!
//! 所有节点保存在一个 arena（`Vec<Option<Item>>`）中，通过 [`ItemId`] 句柄访问。
//! 节点记录父节点句柄和按插入顺序排列的子节点句柄，向上（路径、删除标记）
//! 和向下（保存、导出）遍历都不需要引用计数。删除的槽位在对象树的生命周期内
//! 不会复用，旧句柄只会失效，不会指向别的节点。
//!
//! - [`item`] - 节点、状态和删除标志
//! - [`builder`] - 从扫描事件重建对象树
//! - [`delete`] - 删除标记和批量删除

pub mod builder;
pub mod delete;
pub mod item;

pub use builder::{read_tree, TreeBuilder};
pub use delete::RemovedRange;
pub use item::{Condition, Item, ItemFlags};

use crate::error::{Error, ErrorKind, Result};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// 节点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(usize);

impl ItemId {
    /// arena 中的下标
    pub fn index(self) -> usize {
        self.0
    }
}

/// 对象树
#[derive(Debug, Clone, Default)]
pub struct ObjectTree {
    nodes: Vec<Option<Item>>,
    root: Option<ItemId>,
    orphans: Vec<ItemId>,
}

impl ObjectTree {
    /// 创建空树
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建只有一个新建根目录的树
    pub fn with_new_root(now: u32) -> Self {
        let mut tree = Self::new();
        let mut root = Item::new_object(Item::root_header(now), None);
        root.object_id = Some(crate::consts::YAFFS_OBJECTID_ROOT);
        tree.set_root(root);
        tree
    }

    /// 设置根节点，替换掉原来的整棵树
    pub fn set_root(&mut self, item: Item) -> ItemId {
        self.nodes.clear();
        self.orphans.clear();
        let id = self.alloc(item);
        self.root = Some(id);
        id
    }

    /// 根节点
    pub fn root(&self) -> Option<ItemId> {
        self.root
    }

    /// 无法挂入树的孤儿节点
    pub fn orphans(&self) -> &[ItemId] {
        &self.orphans
    }

    /// 获取节点
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// 获取可变节点
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// 获取节点，不存在时返回 `NotFound`
    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.get(id)
            .ok_or(Error::new(ErrorKind::NotFound, "No such item"))
    }

    /// 获取可变节点，不存在时返回 `NotFound`
    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.get_mut(id)
            .ok_or(Error::new(ErrorKind::NotFound, "No such item"))
    }

    /// 节点是否存在
    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// 存活的节点数（含孤儿）
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// 是否没有任何节点
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 子节点列表
    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.get(id).map(Item::children).unwrap_or(&[])
    }

    /// 父节点
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.get(id).and_then(Item::parent)
    }

    /// 节点在父节点中的行号
    pub fn row_of(&self, id: ItemId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// 在父节点末尾追加子节点
    pub fn insert_child(&mut self, parent: ItemId, item: Item) -> Result<ItemId> {
        if !self.item(parent)?.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Parent is not a directory"));
        }
        let id = self.alloc(item);
        self.attach(parent, id);
        Ok(id)
    }

    /// 删除父节点的第 `row` 个子节点及其整棵子树
    pub fn remove_child(&mut self, parent: ItemId, row: usize) -> Result<()> {
        let children = &mut self.item_mut(parent)?.children;
        if row >= children.len() {
            return Err(Error::new(ErrorKind::InvalidInput, "Row out of range"));
        }
        let child = children.remove(row);
        self.free_subtree(child);
        Ok(())
    }

    /// 节点的完整路径
    ///
    /// 根目录为 `"/"`，其余节点为 `"/a/b"`；根目录自己的名字和空名字不出现在
    /// 路径中。
    pub fn full_path(&self, id: ItemId) -> String {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if Some(c) == self.root {
                break;
            }
            let Some(node) = self.get(c) else {
                break;
            };
            let name = node.name();
            if !name.is_empty() {
                names.push(name);
            }
            cur = node.parent;
        }

        if names.is_empty() {
            return String::from("/");
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// 按对象 ID 查找（只在可导航的树中查找）
    pub fn find_by_object_id(&self, object_id: u32) -> Option<ItemId> {
        let root = self.root?;
        self.walk(root)
            .into_iter()
            .find(|&id| self.get(id).and_then(Item::object_id) == Some(object_id))
    }

    /// 从 `start` 开始的前序遍历
    pub fn walk(&self, start: ItemId) -> Vec<ItemId> {
        let mut order = Vec::new();
        if !self.contains(start) {
            return order;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// `ancestor` 是否为 `id` 本身或其祖先
    pub fn is_ancestor_or_self(&self, ancestor: ItemId, id: ItemId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    pub(crate) fn alloc(&mut self, item: Item) -> ItemId {
        self.nodes.push(Some(item));
        ItemId(self.nodes.len() - 1)
    }

    /// 把已分配但未挂载的节点追加到 `parent` 的子节点末尾
    pub(crate) fn attach(&mut self, parent: ItemId, child: ItemId) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// 把节点从父节点上摘下（不释放）
    pub(crate) fn detach(&mut self, child: ItemId) {
        let Some(parent) = self.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(node) = self.get_mut(parent) {
            node.children.retain(|&c| c != child);
        }
    }

    pub(crate) fn set_root_id(&mut self, id: ItemId) {
        self.root = Some(id);
    }

    pub(crate) fn push_orphan(&mut self, id: ItemId) {
        self.orphans.push(id);
    }

    pub(crate) fn free_subtree(&mut self, id: ItemId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(cur.0).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
    }
}
