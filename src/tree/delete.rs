//! 删除标记与批量删除
//!
//! 删除分两步：先用 [`ObjectTree::mark_for_delete`] 标记节点，标记会沿父链
//! 向上传播 `HAS_DESCENDANT_MARKED`；再调用 [`ObjectTree::remove_marked`]
//! 一次性删除。同一父节点下被标记的行排序后按连续区间删除，从最大行号开始，
//! 先删的区间不会改变后删区间的行号。

use super::{ItemFlags, ItemId, ObjectTree};
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 一次连续区间删除
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedRange {
    /// 父节点
    pub parent: ItemId,
    /// 起始行
    pub start: usize,
    /// 行数
    pub count: usize,
}

impl ObjectTree {
    /// 标记节点待删除
    ///
    /// 祖先节点设置 `HAS_DESCENDANT_MARKED`，遇到本身已待删除的祖先时停止
    /// （它的整棵子树都会被删除）。根目录不能删除。
    pub fn mark_for_delete(&mut self, id: ItemId) -> Result<()> {
        if Some(id) == self.root() {
            return Err(Error::new(ErrorKind::InvalidInput, "Root cannot be deleted"));
        }
        let item = self.item_mut(id)?;
        item.flags.insert(ItemFlags::MARKED_FOR_DELETE);

        let mut cur = item.parent;
        while let Some(ancestor) = cur.and_then(|c| self.get_mut(c)) {
            if ancestor.flags.contains(ItemFlags::MARKED_FOR_DELETE) {
                break;
            }
            ancestor.flags.insert(ItemFlags::HAS_DESCENDANT_MARKED);
            cur = ancestor.parent;
        }
        Ok(())
    }

    /// 删除所有已标记的节点
    ///
    /// 每删除一个连续区间调用一次 `on_removed`，同一父节点下按行号从大到小。
    ///
    /// # 返回
    ///
    /// 被直接标记并删除的节点数（不含随子树一起删除的后代）
    pub fn remove_marked(&mut self, mut on_removed: impl FnMut(RemovedRange)) -> usize {
        let Some(root) = self.root() else {
            return 0;
        };
        self.remove_marked_under(root, &mut on_removed)
    }

    fn remove_marked_under(&mut self, id: ItemId, on_removed: &mut dyn FnMut(RemovedRange)) -> usize {
        let mut removed = 0;

        // 先处理只有后代待删除的子节点
        let pending: Vec<ItemId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| {
                self.get(c).is_some_and(|n| {
                    n.flags.contains(ItemFlags::HAS_DESCENDANT_MARKED)
                        && !n.flags.contains(ItemFlags::MARKED_FOR_DELETE)
                })
            })
            .collect();
        for child in pending {
            removed += self.remove_marked_under(child, on_removed);
        }

        // 行号本身有序
        let rows: Vec<usize> = self
            .children(id)
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                self.get(**c)
                    .is_some_and(|n| n.flags.contains(ItemFlags::MARKED_FOR_DELETE))
            })
            .map(|(row, _)| row)
            .collect();

        let mut end = rows.len();
        while end > 0 {
            let mut start = end - 1;
            while start > 0 && rows[start - 1] + 1 == rows[start] {
                start -= 1;
            }
            let range = RemovedRange {
                parent: id,
                start: rows[start],
                count: end - start,
            };
            self.remove_range(range);
            log::debug!(
                "[TREE] removed rows {}..{} under {:?}",
                range.start,
                range.start + range.count,
                id
            );
            on_removed(range);
            removed += range.count;
            end = start;
        }

        if let Some(node) = self.get_mut(id) {
            node.flags.remove(ItemFlags::HAS_DESCENDANT_MARKED);
        }
        removed
    }

    fn remove_range(&mut self, range: RemovedRange) {
        let Some(node) = self.get_mut(range.parent) else {
            return;
        };
        let gone: Vec<ItemId> = node
            .children
            .drain(range.start..range.start + range.count)
            .collect();
        for child in gone {
            self.free_subtree(child);
        }
    }
}
