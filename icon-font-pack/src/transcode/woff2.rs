//! WOFF 2.0 packing
//!
//! See <https://www.w3.org/TR/WOFF2/>. Tables are stored with the null
//! transform and compressed together as one brotli stream by the resolved
//! [`PlatformCapabilities`] backend.

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
use crate::{
    error::{PackError, TranscodeError},
    platform::PlatformCapabilities,
};

const SIGNATURE: Tag = Tag::new(b"wOF2");
const HEADER_LEN: usize = 48;
const SFNT_HEADER_LEN: usize = 12;
const SFNT_ENTRY_LEN: usize = 16;

/// Tags with a one byte encoding in the table directory.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];
const ARBITRARY_TAG: u8 = 63;

/// Transform version 3 is the null transform for `glyf` and `loca`; for
/// every other table it is version 0.
const GLYF_LOCA_NULL_TRANSFORM: u8 = 3 << 6;

const GLYF: Tag = Tag::new(b"glyf");
const LOCA: Tag = Tag::new(b"loca");

/// The WOFF2 header followed by the already encoded table directory.
struct Woff2Header {
    flavor: u32,
    length: u32,
    num_tables: u16,
    total_sfnt_size: u32,
    total_compressed_size: u32,
    major_version: u16,
    minor_version: u16,
    directory: Vec<u8>,
}

impl FontWrite for Woff2Header {
    fn write_into(&self, writer: &mut TableWriter) {
        SIGNATURE.write_into(writer);
        self.flavor.write_into(writer);
        self.length.write_into(writer);
        self.num_tables.write_into(writer);
        0u16.write_into(writer); // reserved
        self.total_sfnt_size.write_into(writer);
        self.total_compressed_size.write_into(writer);
        self.major_version.write_into(writer);
        self.minor_version.write_into(writer);
        // no metadata or private block
        writer.write_slice(&[0; 20]);
        writer.write_slice(&self.directory);
    }
}

impl Validate for Woff2Header {
    fn validate_impl(&self, ctx: &mut ValidationCtx) {
        ctx.in_table("WOFF2 header", |ctx| {
            if self.num_tables == 0 {
                ctx.report("a font needs at least one table");
            }
        })
    }
}

/// Pack a TTF as WOFF 2.0, compressing with `backend`.
pub fn ttf_to_woff2(ttf: &Ttf, backend: &dyn PlatformCapabilities) -> Result<Vec<u8>, PackError> {
    let font = ttf.as_bytes();
    let (flavor, mut tables) = sfnt::tables(font)?;
    let revision = FontRef::new(font)
        .and_then(|font| font.head())
        .map_err(TranscodeError::from)?
        .font_revision()
        .to_bits() as u32;

    // loca has to directly follow glyf
    tables.sort_by_key(|table| table.tag);
    if let Some(loca) = tables.iter().position(|t| t.tag == LOCA) {
        let loca = tables.remove(loca);
        let glyf = tables.iter().position(|t| t.tag == GLYF).map_or(0, |i| i + 1);
        tables.insert(glyf, loca);
    }

    let mut directory = Vec::with_capacity(tables.len() * 6);
    let mut stream = Vec::with_capacity(font.len());
    for table in &tables {
        write_directory_entry(&mut directory, table.tag, table.data.len() as u32);
        stream.extend_from_slice(table.data);
    }
    let compressed = backend.compress(&stream)?;

    let total_sfnt_size = SFNT_HEADER_LEN
        + tables.len() * SFNT_ENTRY_LEN
        + tables.iter().map(|t| round4(t.data.len())).sum::<usize>();
    let total_len = round4(HEADER_LEN + directory.len() + compressed.len());

    let header = Woff2Header {
        flavor,
        length: total_len as u32,
        num_tables: tables.len() as u16,
        total_sfnt_size: total_sfnt_size as u32,
        total_compressed_size: compressed.len() as u32,
        major_version: (revision >> 16) as u16,
        minor_version: revision as u16,
        directory,
    };
    let mut out = sfnt::dump(&header)?;
    out.reserve(total_len - out.len());
    out.extend_from_slice(&compressed);
    out.resize(total_len, 0);

    log::debug!(
        "WOFF2 ({} backend): {} -> {} bytes",
        backend.name(),
        font.len(),
        out.len()
    );
    Ok(out)
}

fn write_directory_entry(out: &mut Vec<u8>, tag: Tag, orig_length: u32) {
    let raw = tag.to_be_bytes();
    let known = KNOWN_TAGS.iter().position(|known| **known == raw);
    let transform = if tag == GLYF || tag == LOCA {
        GLYF_LOCA_NULL_TRANSFORM
    } else {
        0
    };
    match known {
        Some(index) => out.push(index as u8 | transform),
        None => {
            out.push(ARBITRARY_TAG | transform);
            out.extend_from_slice(&raw);
        }
    }
    write_base128(out, orig_length);
}

/// UIntBase128: big endian groups of seven bits, high bit set on all but the
/// last byte, no leading zero groups.
fn write_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7F) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}
