//! Embedded OpenType (EOT) wrapping
//!
//! An uncompressed EOT (version 0x00020001) is a little endian header that
//! repeats some OS/2, head and name data, followed by the unmodified TTF.

use write_fonts::{
    read::{
        tables::{name::Name, os2::SelectionFlags},
        FontRef, TableProvider,
    },
    types::NameId,
};

use super::ttf::Ttf;
use crate::error::TranscodeError;

const VERSION: u32 = 0x0002_0001;
const MAGIC: u16 = 0x504C;
const DEFAULT_CHARSET: u8 = 1;

const WINDOWS_PLATFORM: u16 = 3;
const WINDOWS_ENGLISH_US: u16 = 0x409;

/// Wrap a TTF as an EOT.
pub fn ttf_to_eot(ttf: &Ttf) -> Result<Vec<u8>, TranscodeError> {
    let font_data = ttf.as_bytes();
    let font = FontRef::new(font_data)?;
    let os2 = font.os2()?;
    let head = font.head()?;
    let name = font.name()?;

    let mut header = Vec::with_capacity(128);
    // EOTSize is patched once the header length is known
    put_u32(&mut header, 0);
    put_u32(&mut header, font_data.len() as u32);
    put_u32(&mut header, VERSION);
    put_u32(&mut header, 0); // flags
    header.extend_from_slice(os2.panose_10());
    header.push(DEFAULT_CHARSET);
    header.push(os2.fs_selection().contains(SelectionFlags::ITALIC) as u8);
    put_u32(&mut header, os2.us_weight_class() as u32);
    put_u16(&mut header, os2.fs_type());
    put_u16(&mut header, MAGIC);
    put_u32(&mut header, os2.ul_unicode_range_1());
    put_u32(&mut header, os2.ul_unicode_range_2());
    put_u32(&mut header, os2.ul_unicode_range_3());
    put_u32(&mut header, os2.ul_unicode_range_4());
    put_u32(&mut header, os2.ul_code_page_range_1().unwrap_or(0));
    put_u32(&mut header, os2.ul_code_page_range_2().unwrap_or(0));
    put_u32(&mut header, head.checksum_adjustment());
    for _ in 0..4 {
        put_u32(&mut header, 0); // reserved
    }
    put_u16(&mut header, 0); // padding1

    let names = [
        NameId::FAMILY_NAME,
        NameId::SUBFAMILY_NAME,
        NameId::VERSION_STRING,
        NameId::FULL_NAME,
    ];
    for (i, id) in names.into_iter().enumerate() {
        if i > 0 {
            put_u16(&mut header, 0); // padding
        }
        put_name(&mut header, &utf16le_name(&name, id)?);
    }
    // root string, unused
    put_u16(&mut header, 0);
    put_u16(&mut header, 0);

    let total = (header.len() + font_data.len()) as u32;
    header[..4].copy_from_slice(&total.to_le_bytes());
    header.extend_from_slice(font_data);
    log::debug!("EOT: {} bytes", header.len());
    Ok(header)
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_name(buf: &mut Vec<u8>, name: &[u8]) {
    put_u16(buf, name.len() as u16);
    buf.extend_from_slice(name);
}

/// The Windows English name record `id`, as UTF-16LE bytes.
fn utf16le_name(name: &Name, id: NameId) -> Result<Vec<u8>, TranscodeError> {
    let Some(record) = name.name_record().iter().find(|record| {
        record.platform_id() == WINDOWS_PLATFORM
            && record.language_id() == WINDOWS_ENGLISH_US
            && record.name_id() == id
    }) else {
        return Ok(Vec::new());
    };
    let string: String = record.string(name.string_data())?.chars().collect();
    let mut bytes: Vec<u8> = string.encode_utf16().flat_map(u16::to_le_bytes).collect();
    bytes.truncate(u16::MAX as usize & !1);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FontConfig, glyph::GlyphContent, icon::ResolvedIcon, svg_font,
        transcode::ttf::build_ttf,
    };

    fn ttf(config: &FontConfig) -> Ttf {
        let icons = [ResolvedIcon {
            name: "a".into(),
            codepoint: '\u{E001}',
            glyph: GlyphContent::Path("M0 0L100 0L100 100Z".into()),
        }];
        build_ttf(&svg_font::synthesize(&icons, config).unwrap(), config).unwrap()
    }

    fn le_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    fn le_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
    }

    #[test]
    fn header_fields() {
        let config = FontConfig {
            font_name: "Demo".into(),
            ..Default::default()
        };
        let ttf = ttf(&config);
        let eot = ttf_to_eot(&ttf).unwrap();

        assert_eq!(le_u32(&eot, 0) as usize, eot.len());
        assert_eq!(le_u32(&eot, 4) as usize, ttf.as_bytes().len());
        assert_eq!(le_u32(&eot, 8), VERSION);
        assert_eq!(eot[26], DEFAULT_CHARSET);
        assert_eq!(le_u32(&eot, 28), 400);
        assert_eq!(le_u16(&eot, 34), MAGIC);
        assert!(eot.ends_with(ttf.as_bytes()));

        // family name follows padding1 at offset 82
        let family_len = le_u16(&eot, 82) as usize;
        let family: Vec<u16> = eot[84..84 + family_len]
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(String::from_utf16(&family).unwrap(), "Demo");
    }

    #[test]
    fn checksum_adjustment_is_copied() {
        let ttf = ttf(&FontConfig::default());
        let eot = ttf_to_eot(&ttf).unwrap();
        let font = FontRef::new(ttf.as_bytes()).unwrap();
        assert_eq!(le_u32(&eot, 60), font.head().unwrap().checksum_adjustment());
    }
}
