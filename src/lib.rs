//! yaffs2_core: Pure Rust YAFFS2 image codec and tree editor
//!
//! 这是一个纯 Rust 实现的 YAFFS2 镜像库，提供：
//! - 逐页读写 YAFFS2 镜像（chunk + spare，packed tags v2）
//! - 扫描镜像并重建目录树
//! - 从镜像中提取文件数据
//! - 树编辑会话：导入、改属性、删除、导出、另存为（需要 `std` feature）
//!
//! # 示例
//!
//! ```rust,ignore
//! use yaffs2_core::{read_tree, FileDevice, ImageConfig, OpenMode, Result};
//!
//! fn main() -> Result<()> {
//!     let device = FileDevice::open("system.img", OpenMode::Read)?;
//!     let (tree, info) = read_tree(device, ImageConfig::default())?;
//!
//!     let Some(root) = tree.root() else {
//!         return Ok(());
//!     };
//!     for id in tree.walk(root) {
//!         if let Some(item) = tree.get(id) {
//!             println!("{} {}", item.header().mode_string(), tree.full_path(id));
//!         }
//!     }
//!     println!("{} objects, {} orphans", info.num_objects(), info.num_orphans);
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`config`] - 页面几何配置
//! - [`types`] - 对象头与对象类型
//! - [`tags`] - packed tags v2 编解码
//! - [`page`] - 镜像设备抽象和逐页 I/O
//! - [`reader`] - 镜像扫描
//! - [`writer`] - 镜像写入
//! - [`extract`] - 文件数据提取
//! - [`tree`] - 内存对象树
//! - `session` - 编辑会话（`std`）

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 镜像配置
pub mod config;

/// 数据结构定义
pub mod types;

/// Packed tags
pub mod tags;

/// 镜像设备抽象
pub mod page;

/// 镜像扫描
pub mod reader;

/// 镜像写入
pub mod writer;

/// 文件提取
pub mod extract;

/// 对象树
pub mod tree;

// ===== 会话层（需要 std）=====

/// 编辑会话
///
/// 打开/新建镜像、导入外部文件、编辑属性、删除、导出和保存。
#[cfg(feature = "std")]
pub mod session;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 配置
pub use config::ImageConfig;

// 对象头
pub use types::{mode_string, ObjectHeader, ObjectType};

// Tags
pub use tags::{pack_tags2, unpack_tags2, ExtTags};

// 设备
pub use page::{ImageDevice, MemDevice, PageDev, PageRead};
#[cfg(feature = "std")]
pub use page::{FileDevice, OpenMode};

// 扫描与写入
pub use reader::{ImageReader, ObjectEvent, ReadInfo, ScanObserver};
pub use writer::{ImageWriter, SaveInfo, WrittenObject};
pub use extract::extract_file;

// 对象树
pub use tree::{
    read_tree, Condition, Item, ItemFlags, ItemId, ObjectTree, RemovedRange, TreeBuilder,
};

// 会话
#[cfg(feature = "std")]
pub use session::{parse_numeric_id, ExportInfo, PropertyEdit, Session, SessionEvent};
