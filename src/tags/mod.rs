//! 页面 tags
//!
//! 每个页面的 spare 区保存一份 tags，描述该页面属于哪个对象、是第几个 chunk、
//! 使用了多少字节。YAFFS2 使用 packed tags v2 格式把 tags 压入 spare 区。
//!
//! - [`ExtTags`] - 逻辑 tags（对应 `yaffs_ext_tags`）
//! - [`packed`] - packed tags v2 打包/解包
//! - [`ecc`] - tags 的 ECC 计算

pub mod ecc;
pub mod packed;

pub use packed::{pack_tags2, unpack_tags2};

use crate::consts::*;

/// 扩展 tags
///
/// 对应 `struct yaffs_ext_tags`，只保留镜像格式中实际存在的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtTags {
    /// 页面是否已使用（spare 为擦除态时为 false）
    pub chunk_used: bool,
    /// 对象 ID
    pub obj_id: u32,
    /// chunk ID（0 为对象头，N>0 为第 N 个数据 chunk）
    pub chunk_id: u32,
    /// chunk 中实际使用的字节数
    pub n_bytes: u32,
    /// 序列号（同一对象多次写入时区分新旧，packed tags v2 不保存）
    pub serial_number: u32,
    /// 块序列号
    pub seq_number: u32,

    /// 是否携带额外的对象头信息
    pub extra_available: bool,
    /// 额外信息：父对象 ID
    pub extra_parent_id: u32,
    /// 额外信息：shrink 标志
    pub extra_is_shrink: bool,
    /// 额外信息：shadows 标志
    pub extra_shadows: bool,
    /// 额外信息：对象类型
    pub extra_obj_type: u32,
    /// 额外信息：硬链接目标
    pub extra_equiv_id: u32,
    /// 额外信息：文件长度
    pub extra_length: u32,
}

impl ExtTags {
    /// 写入页面时使用的 tags
    ///
    /// `chunk_used = 1`，`serial_number = 1`，序列号取最小值。
    pub fn for_write(obj_id: u32, chunk_id: u32, n_bytes: u32) -> Self {
        Self {
            chunk_used: true,
            obj_id,
            chunk_id,
            n_bytes,
            serial_number: 1,
            seq_number: YAFFS_LOWEST_SEQUENCE_NUMBER,
            ..Default::default()
        }
    }

    /// 是否为对象头页面（字节数为哨兵值 0xFFFF）
    pub fn is_object_header(&self) -> bool {
        is_object_header_page(self)
    }
}

/// 判断 tags 是否描述一个对象头页面
///
/// 只看字节数字段：等于 0xFFFF 即为对象头，与页面在镜像中的位置无关；
/// 其他值表示一个使用了该字节数的数据 chunk。
pub fn is_object_header_page(tags: &ExtTags) -> bool {
    tags.n_bytes == YAFFS_HEADER_BYTE_COUNT
}
