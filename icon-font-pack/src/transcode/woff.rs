//! WOFF 1.0 packing
//!
//! See <https://www.w3.org/TR/WOFF/>. Each table is zlib compressed on its
//! own and stored compressed only when that makes it smaller.

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use write_fonts::{
    read::{FontRef, TableProvider},
    types::Tag,
    validate::{Validate, ValidationCtx},
    FontWrite, TableWriter,
};

use super::{
    sfnt::{self, round4},
    ttf::Ttf,
};
use crate::error::TranscodeError;

const SIGNATURE: Tag = Tag::new(b"wOFF");
const HEADER_LEN: usize = 44;
const DIRECTORY_ENTRY_LEN: usize = 20;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_ENTRY_LEN: usize = 16;

/// The WOFF header followed by the table directory.
struct WoffHeader {
    flavor: u32,
    length: u32,
    total_sfnt_size: u32,
    major_version: u16,
    minor_version: u16,
    entries: Vec<WoffEntry>,
}

struct WoffEntry {
    tag: Tag,
    offset: u32,
    comp_length: u32,
    orig_length: u32,
    orig_checksum: u32,
}

impl FontWrite for WoffHeader {
    fn write_into(&self, writer: &mut TableWriter) {
        SIGNATURE.write_into(writer);
        self.flavor.write_into(writer);
        self.length.write_into(writer);
        (self.entries.len() as u16).write_into(writer);
        0u16.write_into(writer); // reserved
        self.total_sfnt_size.write_into(writer);
        self.major_version.write_into(writer);
        self.minor_version.write_into(writer);
        // no metadata or private block
        writer.write_slice(&[0; 20]);
        self.entries.as_slice().write_into(writer);
    }
}

impl FontWrite for WoffEntry {
    fn write_into(&self, writer: &mut TableWriter) {
        self.tag.write_into(writer);
        self.offset.write_into(writer);
        self.comp_length.write_into(writer);
        self.orig_length.write_into(writer);
        self.orig_checksum.write_into(writer);
    }
}

impl Validate for WoffHeader {
    fn validate_impl(&self, ctx: &mut ValidationCtx) {
        ctx.in_table("WOFF header", |ctx| {
            if self.entries.len() > u16::MAX as usize {
                ctx.report("too many tables");
            }
        })
    }
}

/// Pack a TTF as WOFF 1.0.
pub fn ttf_to_woff(ttf: &Ttf) -> Result<Vec<u8>, TranscodeError> {
    let font = ttf.as_bytes();
    let (flavor, tables) = sfnt::tables(font)?;
    let revision = FontRef::new(font)?.head()?.font_revision().to_bits() as u32;

    let mut stored = Vec::with_capacity(tables.len());
    for table in &tables {
        let compressed = zlib(table.data)?;
        let data = if compressed.len() < table.data.len() {
            compressed
        } else {
            table.data.to_vec()
        };
        stored.push(data);
    }

    let directory_len = HEADER_LEN + tables.len() * DIRECTORY_ENTRY_LEN;
    let total_len = directory_len + stored.iter().map(|d| round4(d.len())).sum::<usize>();
    let total_sfnt_size = SFNT_HEADER_LEN
        + tables.len() * SFNT_ENTRY_LEN
        + tables.iter().map(|t| round4(t.data.len())).sum::<usize>();

    let mut offset = directory_len;
    let mut entries = Vec::with_capacity(tables.len());
    for (table, data) in tables.iter().zip(&stored) {
        entries.push(WoffEntry {
            tag: table.tag,
            offset: offset as u32,
            comp_length: data.len() as u32,
            orig_length: table.data.len() as u32,
            orig_checksum: table.checksum,
        });
        offset += round4(data.len());
    }
    let header = WoffHeader {
        flavor,
        length: total_len as u32,
        total_sfnt_size: total_sfnt_size as u32,
        major_version: (revision >> 16) as u16,
        minor_version: revision as u16,
        entries,
    };

    let mut out = sfnt::dump(&header)?;
    out.reserve(total_len - out.len());
    for data in &stored {
        out.extend_from_slice(data);
        out.resize(round4(out.len()), 0);
    }
    debug_assert_eq!(out.len(), total_len);
    log::debug!("WOFF: {} -> {} bytes", font.len(), out.len());
    Ok(out)
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;

    use super::*;
    use crate::{
        config::FontConfig, glyph::GlyphContent, icon::ResolvedIcon, svg_font,
        transcode::ttf::build_ttf,
    };

    use write_fonts::read::FontData;

    #[test]
    fn tables_unpack_to_the_original() {
        let config = FontConfig::default();
        let icons: Vec<_> = (0..20)
            .map(|i| ResolvedIcon {
                name: format!("square{i}"),
                codepoint: char::from_u32(0xE001 + i).unwrap(),
                glyph: GlyphContent::Path(format!("M{i} 0L100 0L100 100L{i} 100Z")),
            })
            .collect();
        let ttf = build_ttf(&svg_font::synthesize(&icons, &config).unwrap(), &config).unwrap();
        let woff = ttf_to_woff(&ttf).unwrap();

        let data = FontData::new(&woff);
        let u32_at = |at: usize| data.read_at::<u32>(at).unwrap() as usize;
        assert_eq!(data.read_at::<Tag>(0).unwrap(), SIGNATURE);
        assert_eq!(u32_at(4), 0x0001_0000);
        assert_eq!(u32_at(8), woff.len());
        assert_eq!(woff.len() % 4, 0);

        let (_, tables) = sfnt::tables(ttf.as_bytes()).unwrap();
        let num_tables = data.read_at::<u16>(12).unwrap() as usize;
        assert_eq!(num_tables, tables.len());

        for (i, table) in tables.iter().enumerate() {
            let entry = HEADER_LEN + i * DIRECTORY_ENTRY_LEN;
            assert_eq!(data.read_at::<Tag>(entry).unwrap(), table.tag);
            let offset = u32_at(entry + 4);
            let comp_len = u32_at(entry + 8);
            let orig_len = u32_at(entry + 12);
            assert_eq!(orig_len, table.data.len());
            assert_eq!(data.read_at::<u32>(entry + 16).unwrap(), table.checksum);
            assert_eq!(offset % 4, 0);
            let stored = &woff[offset..offset + comp_len];
            let unpacked = if comp_len < orig_len {
                let mut out = Vec::new();
                ZlibDecoder::new(stored).read_to_end(&mut out).unwrap();
                out
            } else {
                stored.to_vec()
            };
            assert_eq!(unpacked, table.data, "table {}", table.tag);
        }
    }
}
