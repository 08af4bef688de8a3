//! 从扫描事件重建对象树
//!
//! 镜像中的对象不保证父目录在前。父对象尚未出现的节点先放进等待列表，
//! 扫描结束后统一解析；仍然找不到父目录的节点成为孤儿，保留在 arena 中但
//! 不挂入可导航的树，并记录日志。

use super::{Item, ItemId, ObjectTree};
use crate::config::ImageConfig;
use crate::consts::*;
use crate::page::ImageDevice;
use crate::reader::{ImageReader, ObjectEvent, ReadInfo, ScanObserver};
use crate::error::Result;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// 对象树构建器
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: ObjectTree,
    by_object_id: BTreeMap<u32, ItemId>,
    pending: Vec<ItemId>,
    completed: bool,
}

impl TreeBuilder {
    /// 创建空的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 结束构建，返回对象树
    ///
    /// 如果扫描方还没有调用 [`scan_complete`](ScanObserver::scan_complete)，
    /// 这里会先完成解析。
    pub fn finish(mut self) -> ObjectTree {
        if !self.completed {
            self.scan_complete();
        }
        self.tree
    }

    fn parent_of(&self, id: ItemId) -> Option<u32> {
        self.tree.get(id).map(|n| n.header.parent_obj_id)
    }

    /// 尝试把节点挂到它声明的父目录下
    ///
    /// 父目录不存在、不是目录，或会形成环时返回 false。
    fn try_attach(&mut self, id: ItemId) -> bool {
        let Some(parent_obj_id) = self.parent_of(id) else {
            return false;
        };
        let Some(&parent) = self.by_object_id.get(&parent_obj_id) else {
            return false;
        };
        let parent_is_dir = self.tree.get(parent).is_some_and(Item::is_dir);
        if !parent_is_dir || self.tree.is_ancestor_or_self(id, parent) {
            return false;
        }
        self.tree.attach(parent, id);
        true
    }

    fn place(&mut self, id: ItemId) {
        if !self.try_attach(id) {
            self.pending.push(id);
        }
    }

    fn new_root(&mut self, event: ObjectEvent) {
        let id = self.tree.alloc(Item::from_image(
            YAFFS_OBJECTID_ROOT,
            event.header,
            Some(event.header_pos),
        ));
        self.tree.set_root_id(id);
        self.by_object_id.insert(YAFFS_OBJECTID_ROOT, id);
        log::debug!("[TREE] root at {:#x}", event.header_pos);
    }

    /// 同一个对象 ID 再次出现：后出现的对象头覆盖之前的
    fn supersede(&mut self, id: ItemId, event: ObjectEvent) {
        log::debug!(
            "[TREE] object {} superseded by header at {:#x}",
            event.object_id,
            event.header_pos
        );
        let is_root = Some(id) == self.tree.root();
        let Some(node) = self.tree.get_mut(id) else {
            return;
        };
        let moved = node.header.parent_obj_id != event.header.parent_obj_id;
        node.header = event.header;
        node.header_pos = Some(event.header_pos);

        if moved && !is_root {
            self.tree.detach(id);
            self.pending.retain(|&p| p != id);
            self.place(id);
        }
    }
}

impl ScanObserver for TreeBuilder {
    fn new_object(&mut self, event: ObjectEvent) {
        if let Some(&id) = self.by_object_id.get(&event.object_id) {
            self.supersede(id, event);
            return;
        }
        if event.object_id == YAFFS_OBJECTID_ROOT {
            self.new_root(event);
            return;
        }

        let object_id = event.object_id;
        let id = self.tree.alloc(Item::from_image(
            object_id,
            event.header,
            Some(event.header_pos),
        ));
        self.by_object_id.insert(object_id, id);
        self.place(id);
    }

    fn scan_complete(&mut self) {
        self.completed = true;

        if self.tree.root().is_none() && !self.by_object_id.is_empty() {
            log::info!("[TREE] no root object in image, using default root");
            let id = self.tree.alloc(Item::from_image(
                YAFFS_OBJECTID_ROOT,
                Item::root_header(0),
                None,
            ));
            self.tree.set_root_id(id);
            self.by_object_id.insert(YAFFS_OBJECTID_ROOT, id);
        }

        let pending = core::mem::take(&mut self.pending);
        let mut orphans = Vec::new();
        for id in pending {
            if !self.try_attach(id) {
                orphans.push(id);
            }
        }

        for id in orphans {
            if let Some(node) = self.tree.get(id) {
                let descendants = self.tree.walk(id).len().saturating_sub(1);
                log::warn!(
                    "[TREE] orphan object {:?} {:?}: parent {} not found, {} descendants hidden",
                    node.object_id,
                    node.name(),
                    node.header.parent_obj_id,
                    descendants
                );
            }
            self.tree.push_orphan(id);
        }
    }
}

/// 扫描镜像并重建对象树
///
/// 返回的 [`ReadInfo`] 中 `num_orphans` 已填写。
pub fn read_tree<D: ImageDevice>(device: D, config: ImageConfig) -> Result<(ObjectTree, ReadInfo)> {
    let mut reader = ImageReader::new(device, config)?;
    let mut builder = TreeBuilder::new();
    let mut info = reader.scan(&mut builder);
    let tree = builder.finish();
    info.num_orphans = tree.orphans().len() as u32;
    Ok((tree, info))
}
