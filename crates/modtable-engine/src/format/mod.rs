/*!
 * # Format Codec
 *
 * Value model and dual-format codec for the configuration files the editor
 * works on. Two wire representations carry the same logical structure:
 *
 * - a line-oriented textual form (`[BlockName]` sections, `key = value`
 *   option lines, `; comment` lines, `+sub` continuation lines), and
 * - a compact binary form (magic-prefixed name table plus per-block
 *   option/value records, see [`bini`]).
 *
 * Reading auto-detects the wire format from the leading bytes and the text
 * encoding from BOMs unless an explicit encoding is forced. Reads are atomic:
 * any [`FormatError`] yields no partial document. Writes are fully buffered
 * into a `Vec<u8>` so the persistence boundary never sees a half-written
 * file.
 *
 * Untouched values round-trip in their original textual form: the parser
 * keeps the raw text after `=` and the writer re-emits it verbatim. Only
 * values the editor replaced are serialized canonically.
 */

pub mod bini;
pub mod encoding;
pub mod text;

use crate::schema::FileTemplate;

pub use encoding::FileEncoding;

/// One value within an option, plus optional ordered sub-values
/// (multi-line option bodies).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniEntry {
    pub value: String,
    pub sub_values: Vec<String>,
}

impl IniEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_values: Vec::new(),
        }
    }

    pub fn with_sub_values(value: impl Into<String>, sub_values: Vec<String>) -> Self {
        Self {
            value: value.into(),
            sub_values,
        }
    }
}

/// A named, possibly multi-valued field within a block. Repeated occurrences
/// of the same key in the source collapse into one option with one entry per
/// occurrence. `template_index` is `None` for options the schema does not
/// know; those pass through the codec verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniOption {
    pub name: String,
    pub entries: Vec<IniEntry>,
    pub template_index: Option<usize>,
}

impl IniOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            template_index: None,
        }
    }

    /// First entry value, if any.
    pub fn first_value(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.value.as_str())
    }
}

/// One named section of a document: free-text comments, ordered options, an
/// optional pointer at the option whose first entry supplies the block's
/// display name, and the matched template-type index (`None` when the schema
/// does not recognize the block).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniBlock {
    pub name: String,
    pub comments: String,
    pub options: Vec<IniOption>,
    pub main_option_index: Option<usize>,
    pub template_index: Option<usize>,
}

impl IniBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Case-insensitive option lookup.
    pub fn option(&self, name: &str) -> Option<&IniOption> {
        self.options
            .iter()
            .find(|option| option.name.eq_ignore_ascii_case(name))
    }

    /// First entry value of the named option.
    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(IniOption::first_value)
    }

    /// Display name supplied by the main option's first entry, if set.
    pub fn display_name(&self) -> Option<&str> {
        self.main_option_index
            .and_then(|index| self.options.get(index))
            .and_then(IniOption::first_value)
    }
}

/// Ordered list of blocks plus the file-type index it was parsed against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IniDocument {
    pub blocks: Vec<IniBlock>,
    pub file_index: usize,
}

impl IniDocument {
    pub fn new(file_index: usize) -> Self {
        Self {
            blocks: Vec::new(),
            file_index,
        }
    }
}

/// Which wire representation a document was read from or should be written
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Text,
    Binary,
}

/// Codec configuration. Writing is deterministic given these options.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Retain block-preceding comment lines on read and re-emit them on
    /// write.
    pub preserve_comments: bool,
    /// Pad option names so the `=` signs of a block line up.
    pub pad_alignment: bool,
    /// Emit a blank line between blocks.
    pub blank_line_between_blocks: bool,
    /// Text encoding, or `Automatic` to sniff BOMs / UTF-8 validity.
    pub encoding: FileEncoding,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            preserve_comments: true,
            pad_alignment: false,
            blank_line_between_blocks: true,
            encoding: FileEncoding::Automatic,
        }
    }
}

/// Malformed or truncated input. Reads fail atomically with one of these;
/// no partial document is exposed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("line {line}: section header `{text}` is missing its closing bracket")]
    MalformedHeader { line: usize, text: String },
    #[error("line {line}: option line `{text}` appears before any section header")]
    OrphanOption { line: usize, text: String },
    #[error("line {line}: continuation line has no preceding option entry")]
    DanglingContinuation { line: usize },
    #[error("binary document truncated while reading {context} at offset {offset}")]
    Truncated { context: &'static str, offset: usize },
    #[error("not a binary document: bad magic")]
    BadMagic,
    #[error("unsupported binary format version {0}")]
    UnsupportedVersion(u32),
    #[error("string offset {0} points outside the name table")]
    BadStringOffset(u32),
    #[error("unknown value tag {tag} at offset {offset}")]
    BadValueTag { tag: u8, offset: usize },
    #[error("entry `{0}` carries more values than the binary form can record")]
    TooManyValues(String),
    #[error("name table grew past the offset range of the binary form")]
    NameTableOverflow,
    #[error("input is not valid {0:?} text")]
    Encoding(FileEncoding),
}

/// Unknown block or option name. Non-fatal: the data is retained verbatim
/// with `template_index = None` rather than discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaWarning {
    pub block: String,
    pub option: Option<String>,
}

impl std::fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.option {
            Some(option) => write!(f, "unknown option `{}` in block `{}`", option, self.block),
            None => write!(f, "unknown block `{}`", self.block),
        }
    }
}

/// Result of a successful read: the document, what it was encoded as (so a
/// later save can re-use the same wire format and encoding), and any
/// non-fatal schema mismatches.
#[derive(Debug)]
pub struct ParsedFile {
    pub document: IniDocument,
    pub format: WireFormat,
    /// Resolved encoding, never `Automatic`.
    pub encoding: FileEncoding,
    pub warnings: Vec<SchemaWarning>,
}

/// Read raw bytes into a document, selecting the wire format by inspecting
/// the leading bytes.
pub fn read_bytes(
    bytes: &[u8],
    template: &FileTemplate,
    file_index: usize,
    options: &CodecOptions,
) -> Result<ParsedFile, FormatError> {
    if bini::is_binary(bytes) {
        bini::read(bytes, template, file_index)
    } else {
        text::read(bytes, template, file_index, options)
    }
}

/// Read raw bytes as a specific wire format, bypassing detection.
pub fn read_bytes_as(
    bytes: &[u8],
    template: &FileTemplate,
    file_index: usize,
    options: &CodecOptions,
    format: WireFormat,
) -> Result<ParsedFile, FormatError> {
    match format {
        WireFormat::Text => text::read(bytes, template, file_index, options),
        WireFormat::Binary => bini::read(bytes, template, file_index),
    }
}

/// Serialize a document to the requested wire format, fully buffered.
pub fn write_bytes(
    document: &IniDocument,
    options: &CodecOptions,
    format: WireFormat,
) -> Result<Vec<u8>, FormatError> {
    match format {
        WireFormat::Text => {
            let rendered = text::write(document, options);
            Ok(encoding::encode(&rendered, options.encoding))
        }
        WireFormat::Binary => bini::write(document),
    }
}

/// Match a freshly parsed document against the schema: exact,
/// case-insensitive name matching for blocks and options, main-option
/// resolution via the template's identifier, and warnings for everything the
/// schema does not know.
pub(crate) fn apply_template(
    document: &mut IniDocument,
    template: &FileTemplate,
) -> Vec<SchemaWarning> {
    let mut warnings = Vec::new();

    for block in &mut document.blocks {
        let Some(block_index) = template.block_index(&block.name) else {
            log::debug!("block `{}` not in schema, passing through", block.name);
            warnings.push(SchemaWarning {
                block: block.name.clone(),
                option: None,
            });
            continue;
        };

        block.template_index = Some(block_index);
        let block_template = &template.blocks[block_index];

        for (position, option) in block.options.iter_mut().enumerate() {
            option.template_index = block_template.option_index(&option.name);
            if option.template_index.is_none() {
                warnings.push(SchemaWarning {
                    block: block.name.clone(),
                    option: Some(option.name.clone()),
                });
            }

            if let Some(identifier) = &block_template.identifier
                && identifier.eq_ignore_ascii_case(&option.name)
            {
                block.main_option_index = Some(position);
            }
        }
    }

    warnings
}

/// Shared by both readers: append an entry to the named option of `block`,
/// collapsing repeated keys (case-insensitive) into one multi-entry option.
pub(crate) fn push_entry(block: &mut IniBlock, name: &str, entry: IniEntry) {
    match block
        .options
        .iter_mut()
        .find(|option| option.name.eq_ignore_ascii_case(name))
    {
        Some(option) => option.entries.push(entry),
        None => {
            let mut option = IniOption::new(name);
            option.entries.push(entry);
            block.options.push(option);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BlockTemplate, FileTemplate, OptionTemplate};

    fn system_template() -> FileTemplate {
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
                        name: "archetype".into(),
                        multiple: false,
                    },
                ],
            }],
        }
    }

    #[test]
    fn apply_template_matches_case_insensitively() {
        let mut document = IniDocument::new(0);
        let mut block = IniBlock::new("OBJECT");
        push_entry(&mut block, "NICKNAME", IniEntry::new("li01_01"));
        document.blocks.push(block);

        let warnings = apply_template(&mut document, &system_template());

        assert!(warnings.is_empty());
        let block = &document.blocks[0];
        assert_eq!(block.template_index, Some(0));
        assert_eq!(block.options[0].template_index, Some(0));
        assert_eq!(block.main_option_index, Some(0));
        assert_eq!(block.display_name(), Some("li01_01"));
    }

    #[test]
    fn apply_template_retains_unknown_blocks_and_options() {
        let mut document = IniDocument::new(0);
        document.blocks.push(IniBlock::new("Mystery"));
        let mut known = IniBlock::new("Object");
        push_entry(&mut known, "frequency", IniEntry::new("42"));
        document.blocks.push(known);

        let warnings = apply_template(&mut document, &system_template());

        // Nothing is discarded, everything unknown is reported.
        assert_eq!(document.blocks.len(), 2);
        assert_eq!(document.blocks[0].template_index, None);
        assert_eq!(document.blocks[1].options[0].template_index, None);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].to_string(), "unknown block `Mystery`");
        assert_eq!(
            warnings[1].to_string(),
            "unknown option `frequency` in block `Object`"
        );
    }

    #[test]
    fn push_entry_collapses_repeated_keys() {
        let mut block = IniBlock::new("Object");
        push_entry(&mut block, "fate", IniEntry::new("a"));
        push_entry(&mut block, "FATE", IniEntry::new("b"));

        assert_eq!(block.options.len(), 1);
        assert_eq!(block.options[0].entries.len(), 2);
    }

    #[test]
    fn forcing_a_wire_format_bypasses_detection() {
        let template = system_template();
        let options = CodecOptions::default();

        let err = read_bytes_as(
            b"[Object]\nnickname = x\n",
            &template,
            0,
            &options,
            WireFormat::Binary,
        )
        .unwrap_err();
        assert_eq!(err, FormatError::BadMagic);
    }

    #[test]
    fn read_bytes_dispatches_on_leading_bytes() {
        let template = system_template();
        let options = CodecOptions::default();

        let text = read_bytes(b"[Object]\nnickname = x\n", &template, 0, &options).unwrap();
        assert_eq!(text.format, WireFormat::Text);

        let binary = write_bytes(&text.document, &options, WireFormat::Binary).unwrap();
        let reread = read_bytes(&binary, &template, 0, &options).unwrap();
        assert_eq!(reread.format, WireFormat::Binary);
        assert_eq!(reread.document, text.document);
    }
}
