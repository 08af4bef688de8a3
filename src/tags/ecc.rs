//! Tags 的 ECC 计算
//!
//! 对应 YAFFS 的 `yaffs_ecc_calc_other()`，用于 packed tags v2 末尾的校验字段。
//! 这里只负责计算（写入时填充），读取时不做校验与纠错。

/// 任意长度数据的 ECC 结果
///
/// 对应 `struct yaffs_ecc_other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EccOther {
    /// 列校验（低 6 位有效）
    pub col_parity: u8,
    /// 行校验
    pub line_parity: u32,
    /// 行校验补
    pub line_parity_prime: u32,
}

/// 计算一个字节的列校验值
///
/// 与 YAFFS 的 `column_parity_table` 表项一致：
///
/// | 位 | 含义 |
/// |---|---|
/// | 7 | p4: bit 4..7 的奇偶 |
/// | 6 | p4': bit 0..3 的奇偶 |
/// | 5 | p2: bit 2,3,6,7 的奇偶 |
/// | 4 | p2': bit 0,1,4,5 的奇偶 |
/// | 3 | p1: bit 1,3,5,7 的奇偶 |
/// | 2 | p1': bit 0,2,4,6 的奇偶 |
/// | 0 | 整个字节的奇偶 |
#[inline]
pub const fn column_parity(b: u8) -> u8 {
    (masked_parity(b, 0xF0) << 7)
        | (masked_parity(b, 0x0F) << 6)
        | (masked_parity(b, 0xCC) << 5)
        | (masked_parity(b, 0x33) << 4)
        | (masked_parity(b, 0xAA) << 3)
        | (masked_parity(b, 0x55) << 2)
        | masked_parity(b, 0xFF)
}

#[inline]
const fn masked_parity(b: u8, mask: u8) -> u8 {
    (hweight8(b & mask) & 1) as u8
}

/// 字节中置位的个数
#[inline]
pub const fn hweight8(x: u8) -> u32 {
    x.count_ones()
}

/// 32 位字中置位的个数
#[inline]
pub const fn hweight32(x: u32) -> u32 {
    x.count_ones()
}

/// 计算任意长度数据的 ECC
pub fn calc_other(data: &[u8]) -> EccOther {
    let mut col_parity = 0u8;
    let mut line_parity = 0u32;
    let mut line_parity_prime = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        let b = column_parity(byte);
        col_parity ^= b;
        if b & 0x01 != 0 {
            // 该字节有奇数个置位
            line_parity ^= i as u32;
            line_parity_prime ^= !(i as u32);
        }
    }

    EccOther {
        col_parity: (col_parity >> 2) & 0x3F,
        line_parity,
        line_parity_prime,
    }
}
