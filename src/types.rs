//! YAFFS2 数据结构定义
//!
//! 这个模块包含了直接对应镜像格式的数据结构。
//!
//! ## 设计原则
//!
//! 1. **逐字节编解码** - 使用 `byteorder` 按偏移读写小端字段，不依赖内存布局
//! 2. **完整保留** - 编辑器不关心的字段（win 时间戳、shadow 信息等）同样保留，
//!    保证读出再写回时对象头逐位一致
//! 3. **辅助方法** - 名字、别名、mode 等提供 Rust 风格的访问器

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::string::String;
use byteorder::{ByteOrder, LittleEndian};

/// 名字缓冲区长度（含结尾 NUL）
pub const NAME_BUF_LEN: usize = YAFFS_MAX_NAME_LENGTH + 1;

/// 别名缓冲区长度（含结尾 NUL）
pub const ALIAS_BUF_LEN: usize = YAFFS_MAX_ALIAS_LENGTH + 1;

//=============================================================================
// 对象类型
//=============================================================================

/// 对象类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectType {
    /// 未知类型
    Unknown = YAFFS_OBJECT_TYPE_UNKNOWN,
    /// 普通文件
    File = YAFFS_OBJECT_TYPE_FILE,
    /// 符号链接
    Symlink = YAFFS_OBJECT_TYPE_SYMLINK,
    /// 目录
    Directory = YAFFS_OBJECT_TYPE_DIRECTORY,
    /// 硬链接
    Hardlink = YAFFS_OBJECT_TYPE_HARDLINK,
    /// 特殊文件
    Special = YAFFS_OBJECT_TYPE_SPECIAL,
}

impl ObjectType {
    /// 从对象头的原始 type 值转换，无法识别时返回 `None`
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            YAFFS_OBJECT_TYPE_UNKNOWN => Some(ObjectType::Unknown),
            YAFFS_OBJECT_TYPE_FILE => Some(ObjectType::File),
            YAFFS_OBJECT_TYPE_SYMLINK => Some(ObjectType::Symlink),
            YAFFS_OBJECT_TYPE_DIRECTORY => Some(ObjectType::Directory),
            YAFFS_OBJECT_TYPE_HARDLINK => Some(ObjectType::Hardlink),
            YAFFS_OBJECT_TYPE_SPECIAL => Some(ObjectType::Special),
            _ => None,
        }
    }

    /// 原始 type 值
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// 对应的 mode 类型位（仅文件、目录、符号链接有固定值）
    pub fn mode_type_bits(self) -> u32 {
        match self {
            ObjectType::File => S_IFREG,
            ObjectType::Directory => S_IFDIR,
            ObjectType::Symlink => S_IFLNK,
            _ => 0,
        }
    }
}

//=============================================================================
// 对象头
//=============================================================================

/// 对象头
///
/// 对应 `yaffs_obj_hdr`，位于每个对象 chunk 0 的开头，共 512 字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub obj_type: u32,                // 0: 对象类型
    pub parent_obj_id: u32,           // 4: 父对象 ID
    pub sum_no_longer_used: u16,      // 8: 已废弃的名字校验和
    pub name: [u8; NAME_BUF_LEN],     // 10: 名字（NUL 填充）
    pub name_pad: [u8; 2],            // 266: 对齐填充
    pub mode: u32,                    // 268: 类型位 + 权限位
    pub uid: u32,                     // 272: 用户 ID
    pub gid: u32,                     // 276: 组 ID
    pub atime: u32,                   // 280: 访问时间
    pub mtime: u32,                   // 284: 修改时间
    pub ctime: u32,                   // 288: 创建/改变时间
    pub file_size_low: u32,           // 292: 文件大小（低32位）
    pub equiv_id: u32,                // 296: 硬链接目标对象 ID
    pub alias: [u8; ALIAS_BUF_LEN],   // 300: 符号链接目标
    pub rdev: u32,                    // 460: 设备号
    pub win_ctime: [u32; 2],          // 464: Windows 时间戳
    pub win_atime: [u32; 2],          // 472
    pub win_mtime: [u32; 2],          // 480
    pub inband_shadowed_obj_id: u32,  // 488
    pub inband_is_shrink: u32,        // 492
    pub file_size_high: u32,          // 496: 文件大小（高32位）
    pub reserved: u32,                // 500
    pub shadows_obj: u32,             // 504
    pub is_shrink: u32,               // 508
}

impl ObjectHeader {
    /// 所有字节都为 0xFF 的对象头（对应新建对象时的擦除态）
    pub fn erased() -> Self {
        let raw = [YAFFS_ERASED_BYTE; YAFFS_OBJECT_HEADER_SIZE];
        Self::decode(&raw)
    }

    /// 新建对象使用的对象头
    ///
    /// 未使用字段保持 0xFF，名字清零后写入，时间戳统一为 `now`。
    pub fn new_object(obj_type: ObjectType, parent_obj_id: u32, name: &str, now: u32) -> Self {
        let mut hdr = Self::erased();
        hdr.obj_type = obj_type.as_raw();
        hdr.parent_obj_id = parent_obj_id;
        hdr.set_name(name);
        hdr.atime = now;
        hdr.mtime = now;
        hdr.ctime = now;
        hdr
    }

    /// 从 chunk 数据解码
    ///
    /// `buf` 至少包含 [`YAFFS_OBJECT_HEADER_SIZE`] 字节，调用方负责保证。
    pub fn decode(buf: &[u8]) -> Self {
        let u32_at = |off: usize| LittleEndian::read_u32(&buf[off..off + 4]);

        let mut name = [0u8; NAME_BUF_LEN];
        name.copy_from_slice(&buf[10..10 + NAME_BUF_LEN]);
        let mut alias = [0u8; ALIAS_BUF_LEN];
        alias.copy_from_slice(&buf[300..300 + ALIAS_BUF_LEN]);

        Self {
            obj_type: u32_at(0),
            parent_obj_id: u32_at(4),
            sum_no_longer_used: LittleEndian::read_u16(&buf[8..10]),
            name,
            name_pad: [buf[266], buf[267]],
            mode: u32_at(268),
            uid: u32_at(272),
            gid: u32_at(276),
            atime: u32_at(280),
            mtime: u32_at(284),
            ctime: u32_at(288),
            file_size_low: u32_at(292),
            equiv_id: u32_at(296),
            alias,
            rdev: u32_at(460),
            win_ctime: [u32_at(464), u32_at(468)],
            win_atime: [u32_at(472), u32_at(476)],
            win_mtime: [u32_at(480), u32_at(484)],
            inband_shadowed_obj_id: u32_at(488),
            inband_is_shrink: u32_at(492),
            file_size_high: u32_at(496),
            reserved: u32_at(500),
            shadows_obj: u32_at(504),
            is_shrink: u32_at(508),
        }
    }

    /// 从 chunk 数据解码，长度不足时返回错误
    pub fn try_decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < YAFFS_OBJECT_HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for object header",
            ));
        }
        Ok(Self::decode(buf))
    }

    /// 编码到 chunk 缓冲区的前 512 字节
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < YAFFS_OBJECT_HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "buffer too small for object header",
            ));
        }

        let mut put = |off: usize, v: u32| LittleEndian::write_u32(&mut buf[off..off + 4], v);
        put(0, self.obj_type);
        put(4, self.parent_obj_id);
        put(268, self.mode);
        put(272, self.uid);
        put(276, self.gid);
        put(280, self.atime);
        put(284, self.mtime);
        put(288, self.ctime);
        put(292, self.file_size_low);
        put(296, self.equiv_id);
        put(460, self.rdev);
        put(464, self.win_ctime[0]);
        put(468, self.win_ctime[1]);
        put(472, self.win_atime[0]);
        put(476, self.win_atime[1]);
        put(480, self.win_mtime[0]);
        put(484, self.win_mtime[1]);
        put(488, self.inband_shadowed_obj_id);
        put(492, self.inband_is_shrink);
        put(496, self.file_size_high);
        put(500, self.reserved);
        put(504, self.shadows_obj);
        put(508, self.is_shrink);

        LittleEndian::write_u16(&mut buf[8..10], self.sum_no_longer_used);
        buf[10..10 + NAME_BUF_LEN].copy_from_slice(&self.name);
        buf[266..268].copy_from_slice(&self.name_pad);
        buf[300..300 + ALIAS_BUF_LEN].copy_from_slice(&self.alias);
        Ok(())
    }

    /// 对象类型，无法识别时返回 `None`
    pub fn object_type(&self) -> Option<ObjectType> {
        ObjectType::from_raw(self.obj_type)
    }

    /// 名字（截止到第一个 NUL）
    pub fn name(&self) -> String {
        cstr_lossy(&self.name)
    }

    /// 名字的原始字节（截止到第一个 NUL）
    pub fn name_bytes(&self) -> &[u8] {
        cstr_bytes(&self.name)
    }

    /// 设置名字，超过 255 字节时截断
    ///
    /// # 返回
    ///
    /// 名字是否发生变化
    pub fn set_name(&mut self, name: &str) -> bool {
        set_cstr(&mut self.name, truncate_utf8(name, YAFFS_MAX_NAME_LENGTH))
    }

    /// 符号链接目标（截止到第一个 NUL）
    pub fn alias(&self) -> String {
        cstr_lossy(&self.alias)
    }

    /// 设置符号链接目标，超过 159 字节时截断
    ///
    /// # 返回
    ///
    /// 别名是否发生变化
    pub fn set_alias(&mut self, alias: &str) -> bool {
        set_cstr(&mut self.alias, truncate_utf8(alias, YAFFS_MAX_ALIAS_LENGTH))
    }

    /// 权限位（低 12 位）
    pub fn permissions(&self) -> u32 {
        self.mode & MODE_PERMISSION_MASK
    }

    /// `ls -l` 风格的权限字符串
    pub fn mode_string(&self) -> String {
        mode_string(self.object_type(), self.mode)
    }
}

fn cstr_bytes(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

fn cstr_lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(cstr_bytes(buf)).into_owned()
}

/// 写入 NUL 填充的定长字符串，返回内容是否变化
fn set_cstr(buf: &mut [u8], value: &str) -> bool {
    if cstr_bytes(buf) == value.as_bytes() && buf[value.len()..].iter().all(|&b| b == 0) {
        return false;
    }
    let changed = cstr_bytes(buf) != value.as_bytes();
    buf.fill(0);
    buf[..value.len()].copy_from_slice(value.as_bytes());
    changed
}

/// 按字节数截断字符串，不拆分 UTF-8 字符
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// 生成 `ls -l` 风格的类型+权限字符串
///
/// 类型字符：`-` 文件/硬链接，`l` 符号链接，`d` 目录，`?` 未知，`!` 特殊文件，
/// 无法识别的类型也显示为 `?`。
pub fn mode_string(obj_type: Option<ObjectType>, mode: u32) -> String {
    let kind = match obj_type {
        Some(ObjectType::File) | Some(ObjectType::Hardlink) => '-',
        Some(ObjectType::Symlink) => 'l',
        Some(ObjectType::Directory) => 'd',
        Some(ObjectType::Special) => '!',
        Some(ObjectType::Unknown) | None => '?',
    };

    let bit = |mask: u32, c: char| if mode & mask != 0 { c } else { '-' };
    let exec = |exec_mask: u32, special_mask: u32, set: char, unset: char| {
        match (mode & special_mask != 0, mode & exec_mask != 0) {
            (true, true) => set,
            (true, false) => unset,
            (false, true) => 'x',
            (false, false) => '-',
        }
    };

    let mut s = String::with_capacity(10);
    s.push(kind);
    s.push(bit(MODE_USER_READ, 'r'));
    s.push(bit(MODE_USER_WRITE, 'w'));
    s.push(exec(MODE_USER_EXECUTE, MODE_SETUID, 's', 'S'));
    s.push(bit(MODE_GROUP_READ, 'r'));
    s.push(bit(MODE_GROUP_WRITE, 'w'));
    s.push(exec(MODE_GROUP_EXECUTE, MODE_SETGID, 's', 'S'));
    s.push(bit(MODE_ALL_READ, 'r'));
    s.push(bit(MODE_ALL_WRITE, 'w'));
    s.push(exec(MODE_ALL_EXECUTE, MODE_STICKY, 't', 'T'));
    s
}
