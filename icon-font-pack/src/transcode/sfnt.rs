//! Reading the table directory of a compiled font, and writing the fixed
//! records of the container formats that wrap it

use write_fonts::{
    read::{tables::compute_checksum, FontRef},
    types::Tag,
    validate::Validate,
    FontWrite,
};

use crate::error::TranscodeError;

/// Offset of `checksumAdjustment` within the `head` table.
const CHECKSUM_ADJUSTMENT_OFFSET: usize = 8;
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// One table of an sfnt, in table directory order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SfntTable<'a> {
    pub tag: Tag,
    pub checksum: u32,
    /// Offset of the table from the start of the file.
    pub offset: usize,
    pub data: &'a [u8],
}

/// The sfnt version and tables of `font`.
pub(crate) fn tables(font: &[u8]) -> Result<(u32, Vec<SfntTable<'_>>), TranscodeError> {
    let font_ref = FontRef::new(font)?;
    let directory = font_ref.table_directory();
    let tables = directory
        .table_records()
        .iter()
        .map(|record| {
            let start = record.offset() as usize;
            let end = start + record.length() as usize;
            let data = font.get(start..end).ok_or_else(|| {
                TranscodeError::MalformedTtf(format!("table '{}' is out of bounds", record.tag()))
            })?;
            Ok(SfntTable {
                tag: record.tag(),
                checksum: record.checksum(),
                offset: start,
                data,
            })
        })
        .collect::<Result<Vec<_>, TranscodeError>>()?;
    Ok((directory.sfnt_version(), tables))
}

/// Round `len` up to a multiple of four, the alignment of every table.
pub(crate) fn round4(len: usize) -> usize {
    (len + 3) & !3
}

/// Serialize a record that holds no offsets.
pub(crate) fn dump<T: FontWrite + Validate>(record: &T) -> Result<Vec<u8>, TranscodeError> {
    write_fonts::dump_table(record).map_err(|e| TranscodeError::Serialize(e.to_string()))
}

/// Write `head.checksumAdjustment` so the whole file sums to the magic
/// number.
pub(crate) fn set_checksum_adjustment(font: &mut [u8]) -> Result<(), TranscodeError> {
    let head_offset = {
        let (_, tables) = tables(font)?;
        let head = tables
            .iter()
            .find(|table| table.tag == Tag::new(b"head"))
            .ok_or_else(|| TranscodeError::MalformedTtf("no head table".into()))?;
        head.offset
    };
    let field = head_offset + CHECKSUM_ADJUSTMENT_OFFSET;
    font[field..field + 4].copy_from_slice(&[0; 4]);
    let adjustment = CHECKSUM_MAGIC.wrapping_sub(compute_checksum(font));
    font[field..field + 4].copy_from_slice(&adjustment.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 4)]
    #[case(4, 4)]
    #[case(45, 48)]
    fn alignment(#[case] len: usize, #[case] expected: usize) {
        assert_eq!(round4(len), expected);
    }

    #[test]
    fn adjustment_needs_a_head_table() {
        let mut not_a_font = vec![0u8; 16];
        assert!(set_checksum_adjustment(&mut not_a_font).is_err());
    }
}
