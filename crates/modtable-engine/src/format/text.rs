//! Line-oriented textual wire form.
//!
//! ```text
//! ; comment attached to the next block
//! [Object]
//! nickname = li01_01_base
//! pos = 100, 200, 300
//! +ring_file.ini
//! ```
//!
//! `;` lines preceding a header attach to that block (when comment
//! preservation is on; comment lines after the last block attach to nothing
//! and are dropped), each `key = value` occurrence is one entry of the
//! key's option, a bare `key` line is a value-less option, and `+`
//! continuation lines append sub-values to the entry above them. Entry
//! values keep the raw text after `=` so untouched values are re-emitted
//! exactly as they were read.

use std::fmt::Write as _;

use super::encoding;
use super::{
    CodecOptions, FormatError, IniBlock, IniDocument, IniEntry, IniOption, ParsedFile, WireFormat,
    apply_template, push_entry,
};
use crate::schema::FileTemplate;

pub(crate) fn read(
    bytes: &[u8],
    template: &FileTemplate,
    file_index: usize,
    options: &CodecOptions,
) -> Result<ParsedFile, FormatError> {
    let (text, resolved_encoding) = encoding::decode(bytes, options.encoding)?;

    let mut document = IniDocument::new(file_index);
    let mut pending_comments: Vec<String> = Vec::new();

    for (line_number, raw_line) in text.lines().enumerate() {
        let line_number = line_number + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix(';') {
            if options.preserve_comments {
                pending_comments.push(comment.trim_start().to_owned());
            }
            continue;
        }

        if line.starts_with('[') {
            let Some(end) = line.find(']') else {
                return Err(FormatError::MalformedHeader {
                    line: line_number,
                    text: line.to_owned(),
                });
            };

            let mut block = IniBlock::new(line[1..end].trim());
            if !pending_comments.is_empty() {
                block.comments = pending_comments.join("\n");
                pending_comments.clear();
            }
            document.blocks.push(block);
            continue;
        }

        let Some(block) = document.blocks.last_mut() else {
            return Err(FormatError::OrphanOption {
                line: line_number,
                text: line.to_owned(),
            });
        };

        if let Some(sub_value) = line.strip_prefix('+') {
            let entry = block
                .options
                .last_mut()
                .and_then(|option| option.entries.last_mut());
            let Some(entry) = entry else {
                return Err(FormatError::DanglingContinuation { line: line_number });
            };
            entry.sub_values.push(sub_value.trim().to_owned());
            continue;
        }

        // A bare `key` line (no `=`) records a value-less option; otherwise
        // the entry keeps the raw trimmed text after `=`.
        match line.split_once('=') {
            Some((name, value)) => {
                push_entry(block, name.trim(), IniEntry::new(value.trim()));
            }
            None => {
                if block.option(line).is_none() {
                    block.options.push(IniOption::new(line));
                }
            }
        }
    }

    if !pending_comments.is_empty() {
        // Comments survive as block-preceding text only; lines after the
        // last block precede nothing and are not retained.
        log::debug!(
            "dropping {} trailing comment line(s)",
            pending_comments.len()
        );
    }

    let warnings = apply_template(&mut document, template);

    Ok(ParsedFile {
        document,
        format: WireFormat::Text,
        encoding: resolved_encoding,
        warnings,
    })
}

pub(crate) fn write(document: &IniDocument, options: &CodecOptions) -> String {
    let mut out = String::new();

    for (position, block) in document.blocks.iter().enumerate() {
        if position > 0 && options.blank_line_between_blocks {
            out.push('\n');
        }

        if options.preserve_comments && !block.comments.is_empty() {
            for line in block.comments.lines() {
                if line.is_empty() {
                    out.push_str(";\n");
                } else {
                    let _ = writeln!(out, "; {line}");
                }
            }
        }

        let _ = writeln!(out, "[{}]", block.name);

        let pad_width = if options.pad_alignment {
            block
                .options
                .iter()
                .filter(|option| !option.entries.is_empty())
                .map(|option| option.name.len())
                .max()
                .unwrap_or(0)
        } else {
            0
        };

        for option in &block.options {
            if option.entries.is_empty() {
                let _ = writeln!(out, "{}", option.name);
                continue;
            }
            for entry in &option.entries {
                if pad_width > 0 {
                    let _ = writeln!(out, "{:<pad_width$} = {}", option.name, entry.value);
                } else {
                    let _ = writeln!(out, "{} = {}", option.name, entry.value);
                }
                for sub_value in &entry.sub_values {
                    let _ = writeln!(out, "+{sub_value}");
                }
            }
        }
    }

    out
}
