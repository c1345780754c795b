//! Compact binary wire form.
//!
//! Little-endian layout:
//!
//! ```text
//! magic  b"BINI"
//! u32    version (currently 1)
//! u32    name-table offset (from start of file)
//! blocks until the name table begins:
//!   u16  block-name offset into the name table
//!   u16  entry-record count
//!   entry record:
//!     u16  option-name offset
//!     u8   value count (first value is the entry value, the rest are its
//!          sub-values; 0 records a value-less option)
//!     value:
//!       u8   tag (1 = i32, 2 = f32, 3 = u32 name-table offset)
//!       ...  payload
//! name table: NUL-terminated strings
//! ```
//!
//! The writer only ever emits string-tagged values so a binary round-trip
//! preserves value text exactly; the int/float tags exist to read files
//! produced by other tools, rendered to decimal text on load. Comments are
//! not representable in this form.

use std::collections::HashMap;

use super::{
    FileEncoding, FormatError, IniBlock, IniDocument, IniEntry, ParsedFile, WireFormat,
    apply_template, push_entry,
};
use crate::schema::FileTemplate;

const MAGIC: &[u8; 4] = b"BINI";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;

/// True when the leading bytes carry the binary magic.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

pub(crate) fn read(
    bytes: &[u8],
    template: &FileTemplate,
    file_index: usize,
) -> Result<ParsedFile, FormatError> {
    if !is_binary(bytes) {
        return Err(FormatError::BadMagic);
    }

    let mut reader = Reader {
        bytes,
        pos: MAGIC.len(),
        end: bytes.len(),
    };
    let version = reader.u32("version")?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let table_offset = reader.u32("name table offset")? as usize;
    if table_offset < HEADER_LEN || table_offset > bytes.len() {
        return Err(FormatError::Truncated {
            context: "name table",
            offset: table_offset,
        });
    }
    let names = NameTable {
        data: &bytes[table_offset..],
    };
    reader.end = table_offset;

    let mut document = IniDocument::new(file_index);

    while reader.pos < reader.end {
        let name_offset = reader.u16("block name")?;
        let entry_count = reader.u16("entry count")?;
        let mut block = IniBlock::new(names.resolve(name_offset as u32)?);

        for _ in 0..entry_count {
            let option_offset = reader.u16("option name")?;
            let option_name = names.resolve(option_offset as u32)?.to_owned();
            let value_count = reader.u8("value count")?;

            if value_count == 0 {
                // Value-less option: keep its presence without an entry.
                if block.option(&option_name).is_none() {
                    block.options.push(super::IniOption::new(option_name));
                }
                continue;
            }

            let mut values = Vec::with_capacity(value_count as usize);
            for _ in 0..value_count {
                values.push(reader.value(&names)?);
            }
            let mut values = values.into_iter();
            let entry = IniEntry::with_sub_values(
                values.next().unwrap_or_default(),
                values.collect(),
            );
            push_entry(&mut block, &option_name, entry);
        }

        document.blocks.push(block);
    }

    let warnings = apply_template(&mut document, template);

    Ok(ParsedFile {
        document,
        format: WireFormat::Binary,
        encoding: FileEncoding::Utf8,
        warnings,
    })
}

pub(crate) fn write(document: &IniDocument) -> Result<Vec<u8>, FormatError> {
    let mut names = NameTableBuilder::default();
    let mut body: Vec<u8> = Vec::new();

    for block in &document.blocks {
        let name_offset = names.intern_u16(&block.name)?;
        let entry_records: usize = block
            .options
            .iter()
            .map(|option| option.entries.len().max(1))
            .sum();
        let entry_records =
            u16::try_from(entry_records).map_err(|_| FormatError::NameTableOverflow)?;

        body.extend_from_slice(&name_offset.to_le_bytes());
        body.extend_from_slice(&entry_records.to_le_bytes());

        for option in &block.options {
            let option_offset = names.intern_u16(&option.name)?;

            if option.entries.is_empty() {
                body.extend_from_slice(&option_offset.to_le_bytes());
                body.push(0);
                continue;
            }

            for entry in &option.entries {
                let value_count = 1 + entry.sub_values.len();
                let value_count = u8::try_from(value_count)
                    .map_err(|_| FormatError::TooManyValues(option.name.clone()))?;

                body.extend_from_slice(&option_offset.to_le_bytes());
                body.push(value_count);

                for value in std::iter::once(&entry.value).chain(&entry.sub_values) {
                    body.push(TAG_STRING);
                    body.extend_from_slice(&names.intern(value).to_le_bytes());
                }
            }
        }
    }

    let table_offset = u32::try_from(HEADER_LEN + body.len())
        .map_err(|_| FormatError::NameTableOverflow)?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + names.data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&table_offset.to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&names.data);
    Ok(out)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize, context: &'static str) -> Result<&[u8], FormatError> {
        if self.pos + len > self.end {
            return Err(FormatError::Truncated {
                context,
                offset: self.pos,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, FormatError> {
        Ok(self.take(1, context)?[0])
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, FormatError> {
        let bytes = self.take(2, context)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, context: &'static str) -> Result<u32, FormatError> {
        let bytes = self.take(4, context)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn value(&mut self, names: &NameTable<'_>) -> Result<String, FormatError> {
        let tag_offset = self.pos;
        let tag = self.u8("value tag")?;
        match tag {
            TAG_INT => {
                let bytes = self.take(4, "int value")?;
                let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(value.to_string())
            }
            TAG_FLOAT => {
                let bytes = self.take(4, "float value")?;
                let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(value.to_string())
            }
            TAG_STRING => {
                let offset = self.u32("string value")?;
                Ok(names.resolve(offset)?.to_owned())
            }
            other => Err(FormatError::BadValueTag {
                tag: other,
                offset: tag_offset,
            }),
        }
    }
}

struct NameTable<'a> {
    data: &'a [u8],
}

impl NameTable<'_> {
    fn resolve(&self, offset: u32) -> Result<&str, FormatError> {
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(FormatError::BadStringOffset(offset));
        }
        let end = self.data[start..]
            .iter()
            .position(|&byte| byte == 0)
            .map(|nul| start + nul)
            .ok_or(FormatError::BadStringOffset(offset))?;
        std::str::from_utf8(&self.data[start..end])
            .map_err(|_| FormatError::Encoding(FileEncoding::Utf8))
    }
}

#[derive(Default)]
struct NameTableBuilder {
    data: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl NameTableBuilder {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(name) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(name.as_bytes());
        self.data.push(0);
        self.offsets.insert(name.to_owned(), offset);
        offset
    }

    /// Block and option names carry u16 offsets on the wire.
    fn intern_u16(&mut self, name: &str) -> Result<u16, FormatError> {
        u16::try_from(self.intern(name)).map_err(|_| FormatError::NameTableOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BlockTemplate, FileTemplate, OptionTemplate};
    use pretty_assertions::assert_eq;

    fn template() -> FileTemplate {
        FileTemplate {
            name: "system".into(),
            role: Default::default(),
            blocks: vec![BlockTemplate {
                name: "Object".into(),
                multiple: true,
                identifier: Some("nickname".into()),
                options: vec![
                    OptionTemplate {
                        name: "nickname".into(),
                        multiple: false,
                    },
                    OptionTemplate {
                        name: "pos".into(),
                        multiple: true,
                    },
                ],
            }],
        }
    }

    fn sample_document() -> IniDocument {
        let parsed = crate::format::text::read(
            b"[Object]\nnickname = li01_01\npos = 1, 2, 3\npos = 4, 5, 6\n+sub one\n",
            &template(),
            0,
            &crate::format::CodecOptions::default(),
        )
        .unwrap();
        parsed.document
    }

    #[test]
    fn write_read_round_trip() {
        let document = sample_document();
        let bytes = write(&document).unwrap();

        assert!(is_binary(&bytes));
        let reread = read(&bytes, &template(), 0).unwrap();
        assert_eq!(reread.document, document);
        assert_eq!(reread.format, WireFormat::Binary);
    }

    #[test]
    fn valueless_options_round_trip_as_zero_count_records() {
        let mut document = IniDocument::new(0);
        let mut block = IniBlock::new("Object");
        block.options.push(crate::format::IniOption::new("archetype"));
        document.blocks.push(block);

        let bytes = write(&document).unwrap();
        let reread = read(&bytes, &template(), 0).unwrap();

        let option = reread.document.blocks[0].option("archetype").unwrap();
        assert!(option.entries.is_empty());
    }

    #[test]
    fn name_table_is_deduplicated() {
        let mut document = IniDocument::new(0);
        for _ in 0..3 {
            let mut block = IniBlock::new("Object");
            push_entry(&mut block, "pos", IniEntry::new("1"));
            document.blocks.push(block);
        }

        let bytes = write(&document).unwrap();
        let table_offset =
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let table = &bytes[table_offset..];
        // "Object", "pos" and "1" once each, NUL-terminated.
        assert_eq!(table.iter().filter(|&&byte| byte == 0).count(), 3);
    }

    #[test]
    fn int_and_float_values_render_to_text() {
        // Hand-assemble a file with typed values: [Object] pos = -7, then 2.5.
        let mut names = NameTableBuilder::default();
        let object = names.intern("Object") as u16;
        let pos = names.intern("pos") as u16;

        let mut body = Vec::new();
        body.extend_from_slice(&object.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&pos.to_le_bytes());
        body.push(2);
        body.push(TAG_INT);
        body.extend_from_slice(&(-7i32).to_le_bytes());
        body.push(TAG_FLOAT);
        body.extend_from_slice(&2.5f32.to_le_bytes());

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&((HEADER_LEN + body.len()) as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(&names.data);

        let parsed = read(&bytes, &template(), 0).unwrap();
        let entry = &parsed.document.blocks[0].options[0].entries[0];
        assert_eq!(entry.value, "-7");
        assert_eq!(entry.sub_values, vec!["2.5"]);
    }

    #[test]
    fn truncated_record_fails_atomically() {
        let document = sample_document();
        let bytes = write(&document).unwrap();

        // Chop inside the record body, keeping the header intact but moving
        // the advertised name table past the end.
        let err = read(&bytes[..HEADER_LEN + 3], &template(), 0).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { .. }));
    }

    #[test]
    fn bad_magic_is_rejected() {
        assert_eq!(
            read(b"INIB\0\0\0\0", &template(), 0).unwrap_err(),
            FormatError::BadMagic
        );
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&9u32.to_le_bytes());
        bytes.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());
        assert_eq!(
            read(&bytes, &template(), 0).unwrap_err(),
            FormatError::UnsupportedVersion(9)
        );
    }

    #[test]
    fn string_offset_outside_table_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&((HEADER_LEN + 4) as u32).to_le_bytes());
        // One block record pointing at offset 200 of a tiny table.
        bytes.extend_from_slice(&200u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(b"x\0");

        assert_eq!(
            read(&bytes, &template(), 0).unwrap_err(),
            FormatError::BadStringOffset(200)
        );
    }
}
