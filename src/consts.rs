//! YAFFS2 镜像常量定义
//!
//! 这个模块包含了 YAFFS2 镜像格式的常量定义，包括：
//! - 页面几何（chunk + spare）
//! - 保留对象 ID
//! - 对象头字段长度
//! - packed tags v2 标志位
//! - 文件类型和权限位

//=============================================================================
// 页面几何
//=============================================================================

/// 默认 chunk（数据区）大小
pub const YAFFS_DEFAULT_CHUNK_SIZE: u32 = 2048;

/// 默认 spare（OOB 区）大小
pub const YAFFS_DEFAULT_SPARE_SIZE: u32 = 64;

/// 默认页面大小（chunk + spare）
pub const YAFFS_DEFAULT_PAGE_SIZE: u32 = YAFFS_DEFAULT_CHUNK_SIZE + YAFFS_DEFAULT_SPARE_SIZE;

/// 未使用/填充字节（NAND 擦除态）
pub const YAFFS_ERASED_BYTE: u8 = 0xFF;

//=============================================================================
// 对象 ID
//=============================================================================

/// 根目录对象 ID
pub const YAFFS_OBJECTID_ROOT: u32 = 1;

/// 保留的对象桶数量，用户对象 ID 从其后开始分配
pub const YAFFS_NOBJECT_BUCKETS: u32 = 256;

/// 第一个可分配给用户对象的 ID
pub const YAFFS_FIRST_USER_OBJECT_ID: u32 = YAFFS_NOBJECT_BUCKETS + 1;

/// 写入时使用的最小序列号
pub const YAFFS_LOWEST_SEQUENCE_NUMBER: u32 = 0x0000_1000;

//=============================================================================
// 对象头
//=============================================================================

/// 对象头在 chunk 0 中占用的字节数
pub const YAFFS_OBJECT_HEADER_SIZE: usize = 512;

/// 名字最大长度（不含结尾 NUL）
pub const YAFFS_MAX_NAME_LENGTH: usize = 255;

/// 符号链接目标最大长度（不含结尾 NUL）
pub const YAFFS_MAX_ALIAS_LENGTH: usize = 159;

/// 对象头页面的 tags 字节数哨兵值
pub const YAFFS_HEADER_BYTE_COUNT: u32 = 0xFFFF;

//=============================================================================
// Packed tags v2
//=============================================================================

/// packed tags v2 在 spare 中占用的字节数（tags 16 + ECC 12）
pub const YAFFS_PACKED_TAGS2_SIZE: usize = 28;

/// packed tags v2 中只含 tags 部分的字节数
pub const YAFFS_PACKED_TAGS2_TAGS_ONLY_SIZE: usize = 16;

/// chunk_id 中的额外头信息标志
pub const EXTRA_HEADER_INFO_FLAG: u32 = 0x8000_0000;

/// chunk_id 中的 shrink 标志
pub const EXTRA_SHRINK_FLAG: u32 = 0x4000_0000;

/// chunk_id 中的 shadows 标志
pub const EXTRA_SHADOWS_FLAG: u32 = 0x2000_0000;

/// chunk_id 中的保留标志
pub const EXTRA_SPARE_FLAGS: u32 = 0x1000_0000;

/// chunk_id 中全部额外标志位
pub const ALL_EXTRA_FLAGS: u32 = 0xF000_0000;

/// obj_id 中对象类型的位移
pub const EXTRA_OBJECT_TYPE_SHIFT: u32 = 28;

/// obj_id 中对象类型的掩码
pub const EXTRA_OBJECT_TYPE_MASK: u32 = 0x0F << EXTRA_OBJECT_TYPE_SHIFT;

//=============================================================================
// 对象类型（对象头 type 字段）
//=============================================================================

/// 未知类型
pub const YAFFS_OBJECT_TYPE_UNKNOWN: u32 = 0;

/// 普通文件
pub const YAFFS_OBJECT_TYPE_FILE: u32 = 1;

/// 符号链接
pub const YAFFS_OBJECT_TYPE_SYMLINK: u32 = 2;

/// 目录
pub const YAFFS_OBJECT_TYPE_DIRECTORY: u32 = 3;

/// 硬链接
pub const YAFFS_OBJECT_TYPE_HARDLINK: u32 = 4;

/// 特殊文件（设备、FIFO、socket）
pub const YAFFS_OBJECT_TYPE_SPECIAL: u32 = 5;

//=============================================================================
// mode 字段
//=============================================================================

/// 文件类型掩码
pub const S_IFMT: u32 = 0o170000;

/// 目录
pub const S_IFDIR: u32 = 0o040000;

/// 普通文件
pub const S_IFREG: u32 = 0o100000;

/// 符号链接
pub const S_IFLNK: u32 = 0o120000;

/// 权限位掩码（含 setuid/setgid/sticky）
pub const MODE_PERMISSION_MASK: u32 = 0o7777;

/// setuid
pub const MODE_SETUID: u32 = 0o4000;
/// setgid
pub const MODE_SETGID: u32 = 0o2000;
/// sticky
pub const MODE_STICKY: u32 = 0o1000;
/// 所有者读
pub const MODE_USER_READ: u32 = 0o400;
/// 所有者写
pub const MODE_USER_WRITE: u32 = 0o200;
/// 所有者执行
pub const MODE_USER_EXECUTE: u32 = 0o100;
/// 组读
pub const MODE_GROUP_READ: u32 = 0o040;
/// 组写
pub const MODE_GROUP_WRITE: u32 = 0o020;
/// 组执行
pub const MODE_GROUP_EXECUTE: u32 = 0o010;
/// 其他用户读
pub const MODE_ALL_READ: u32 = 0o004;
/// 其他用户写
pub const MODE_ALL_WRITE: u32 = 0o002;
/// 其他用户执行
pub const MODE_ALL_EXECUTE: u32 = 0o001;

/// 新建镜像根目录的默认 mode（drwxrwx--x）
pub const YAFFS_ROOT_DEFAULT_MODE: u32 = S_IFDIR | 0o771;
