//! Packed tags v2
//!
//! 对应 YAFFS 的 `yaffs_pack_tags2()` / `yaffs_unpack_tags2()`。
//!
//! spare 区布局（小端）：
//!
//! ```text
//! 0       4       8         12       16   17    20          24               28
//! +-------+-------+---------+--------+----+-----+-----------+----------------+
//! | seq   | obj_id| chunk_id| n_bytes|col | pad | line_par  | line_par_prime |
//! +-------+-------+---------+--------+----+-----+-----------+----------------+
//! ```
//!
//! 携带额外头信息时，`chunk_id` 的高 4 位是标志、低 28 位是父对象 ID，
//! `obj_id` 的高 4 位是对象类型。

use super::ecc::calc_other;
use super::ExtTags;
use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};
use byteorder::{ByteOrder, LittleEndian};

/// 把 tags 打包进 spare 缓冲区
///
/// 调用方应先把 spare 填充为 0xFF；本函数只写入前 28 字节中的有效字段，
/// 第 17..20 字节（对齐填充）保持原值。
///
/// # 参数
///
/// * `spare` - spare 缓冲区（至少 28 字节）
/// * `tags` - 要写入的 tags
/// * `tags_ecc` - 是否计算 tags 的 ECC
pub fn pack_tags2(spare: &mut [u8], tags: &ExtTags, tags_ecc: bool) -> Result<()> {
    if spare.len() < YAFFS_PACKED_TAGS2_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "spare buffer too small for packed tags",
        ));
    }

    let mut chunk_id = tags.chunk_id;
    let mut obj_id = tags.obj_id;
    let mut n_bytes = tags.n_bytes;

    if tags.chunk_id == 0 && tags.extra_available {
        // 父对象 ID 保存在 chunk_id 中
        chunk_id = EXTRA_HEADER_INFO_FLAG | tags.extra_parent_id;
        if tags.extra_is_shrink {
            chunk_id |= EXTRA_SHRINK_FLAG;
        }
        if tags.extra_shadows {
            chunk_id |= EXTRA_SHADOWS_FLAG;
        }

        obj_id &= !EXTRA_OBJECT_TYPE_MASK;
        obj_id |= tags.extra_obj_type << EXTRA_OBJECT_TYPE_SHIFT;

        n_bytes = match tags.extra_obj_type {
            YAFFS_OBJECT_TYPE_HARDLINK => tags.extra_equiv_id,
            YAFFS_OBJECT_TYPE_FILE => tags.extra_length,
            _ => 0,
        };
    }

    LittleEndian::write_u32(&mut spare[0..4], tags.seq_number);
    LittleEndian::write_u32(&mut spare[4..8], obj_id);
    LittleEndian::write_u32(&mut spare[8..12], chunk_id);
    LittleEndian::write_u32(&mut spare[12..16], n_bytes);

    if tags_ecc {
        let ecc = calc_other(&spare[..YAFFS_PACKED_TAGS2_TAGS_ONLY_SIZE]);
        spare[16] = ecc.col_parity;
        LittleEndian::write_u32(&mut spare[20..24], ecc.line_parity);
        LittleEndian::write_u32(&mut spare[24..28], ecc.line_parity_prime);
    }

    Ok(())
}

/// 从 spare 缓冲区解包 tags
///
/// 序列号为 0xFFFFFFFF 的 spare（擦除态）解包为 `chunk_used = false` 的空 tags。
/// ECC 不做校验。
pub fn unpack_tags2(spare: &[u8]) -> Result<ExtTags> {
    if spare.len() < YAFFS_PACKED_TAGS2_TAGS_ONLY_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "spare buffer too small for packed tags",
        ));
    }

    let seq_number = LittleEndian::read_u32(&spare[0..4]);
    if seq_number == 0xFFFF_FFFF {
        return Ok(ExtTags::default());
    }

    let raw_obj_id = LittleEndian::read_u32(&spare[4..8]);
    let raw_chunk_id = LittleEndian::read_u32(&spare[8..12]);
    let raw_n_bytes = LittleEndian::read_u32(&spare[12..16]);

    let mut tags = ExtTags {
        chunk_used: true,
        obj_id: raw_obj_id,
        chunk_id: raw_chunk_id,
        n_bytes: raw_n_bytes,
        serial_number: 0,
        seq_number,
        ..Default::default()
    };

    if raw_chunk_id & EXTRA_HEADER_INFO_FLAG != 0 {
        tags.chunk_id = 0;
        tags.n_bytes = 0;
        tags.extra_available = true;
        tags.extra_parent_id = raw_chunk_id & !ALL_EXTRA_FLAGS;
        tags.extra_is_shrink = raw_chunk_id & EXTRA_SHRINK_FLAG != 0;
        tags.extra_shadows = raw_chunk_id & EXTRA_SHADOWS_FLAG != 0;
        tags.extra_obj_type = raw_obj_id >> EXTRA_OBJECT_TYPE_SHIFT;
        tags.obj_id &= !EXTRA_OBJECT_TYPE_MASK;

        if tags.extra_obj_type == YAFFS_OBJECT_TYPE_HARDLINK {
            tags.extra_equiv_id = raw_n_bytes;
        } else {
            tags.extra_length = raw_n_bytes;
        }
    }

    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::is_object_header_page;

    fn erased_spare() -> [u8; 64] {
        [0xFF; 64]
    }

    #[test]
    fn test_pack_header_tags_layout() {
        let mut spare = erased_spare();
        let tags = ExtTags::for_write(257, 0, YAFFS_HEADER_BYTE_COUNT);
        pack_tags2(&mut spare, &tags, true).unwrap();

        assert_eq!(LittleEndian::read_u32(&spare[0..4]), YAFFS_LOWEST_SEQUENCE_NUMBER);
        assert_eq!(LittleEndian::read_u32(&spare[4..8]), 257);
        assert_eq!(LittleEndian::read_u32(&spare[8..12]), 0);
        assert_eq!(LittleEndian::read_u32(&spare[12..16]), 0xFFFF);
        // 对齐填充与 tags 之后的区域保持擦除态
        assert_eq!(&spare[17..20], &[0xFF; 3]);
        assert!(spare[28..].iter().all(|&b| b == 0xFF));

        let ecc = calc_other(&spare[..16]);
        assert_eq!(spare[16], ecc.col_parity);
        assert_eq!(LittleEndian::read_u32(&spare[20..24]), ecc.line_parity);
        assert_eq!(LittleEndian::read_u32(&spare[24..28]), ecc.line_parity_prime);
    }

    #[test]
    fn test_unpack_written_tags() {
        let mut spare = erased_spare();
        pack_tags2(&mut spare, &ExtTags::for_write(300, 4, 1234), true).unwrap();

        let tags = unpack_tags2(&spare).unwrap();
        assert!(tags.chunk_used);
        assert_eq!(tags.obj_id, 300);
        assert_eq!(tags.chunk_id, 4);
        assert_eq!(tags.n_bytes, 1234);
        assert_eq!(tags.seq_number, YAFFS_LOWEST_SEQUENCE_NUMBER);
        assert!(!tags.extra_available);
        assert!(!is_object_header_page(&tags));
    }

    #[test]
    fn test_unpack_erased_spare() {
        let tags = unpack_tags2(&erased_spare()).unwrap();
        assert!(!tags.chunk_used);
        assert_eq!(tags, ExtTags::default());
        assert!(!is_object_header_page(&tags));
    }

    #[test]
    fn test_header_sentinel_detection() {
        let mut spare = erased_spare();
        pack_tags2(&mut spare, &ExtTags::for_write(1, 0, 0xFFFF), true).unwrap();
        assert!(unpack_tags2(&spare).unwrap().is_object_header());

        // 任意位置、任意 chunk_id，只要字节数是哨兵值就是对象头
        let mut spare = erased_spare();
        pack_tags2(&mut spare, &ExtTags::for_write(400, 7, 0xFFFF), true).unwrap();
        assert!(unpack_tags2(&spare).unwrap().is_object_header());

        let mut spare = erased_spare();
        pack_tags2(&mut spare, &ExtTags::for_write(400, 1, 2048), true).unwrap();
        assert!(!unpack_tags2(&spare).unwrap().is_object_header());
    }

    #[test]
    fn test_extra_header_info() {
        let tags = ExtTags {
            chunk_used: true,
            obj_id: 260,
            chunk_id: 0,
            n_bytes: 0,
            seq_number: YAFFS_LOWEST_SEQUENCE_NUMBER,
            extra_available: true,
            extra_parent_id: 258,
            extra_is_shrink: true,
            extra_obj_type: YAFFS_OBJECT_TYPE_FILE,
            extra_length: 5000,
            ..Default::default()
        };

        let mut spare = erased_spare();
        pack_tags2(&mut spare, &tags, false).unwrap();

        let raw_chunk = LittleEndian::read_u32(&spare[8..12]);
        assert_eq!(raw_chunk, EXTRA_HEADER_INFO_FLAG | EXTRA_SHRINK_FLAG | 258);
        let raw_obj = LittleEndian::read_u32(&spare[4..8]);
        assert_eq!(raw_obj >> EXTRA_OBJECT_TYPE_SHIFT, YAFFS_OBJECT_TYPE_FILE);
        // 未计算 ECC
        assert_eq!(spare[16], 0xFF);

        let out = unpack_tags2(&spare).unwrap();
        assert!(out.extra_available);
        assert_eq!(out.obj_id, 260);
        assert_eq!(out.chunk_id, 0);
        assert_eq!(out.extra_parent_id, 258);
        assert!(out.extra_is_shrink);
        assert!(!out.extra_shadows);
        assert_eq!(out.extra_length, 5000);
    }

    #[test]
    fn test_short_spare_rejected() {
        let mut spare = [0xFFu8; 20];
        let err = pack_tags2(&mut spare, &ExtTags::for_write(1, 0, 0xFFFF), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(unpack_tags2(&spare[..8]).is_err());
    }
}
