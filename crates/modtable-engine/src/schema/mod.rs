/*!
 * # Template Schema
 *
 * Static per-file-type definition of valid blocks and options, loaded once
 * from a TOML document and immutable afterwards (share it across sessions
 * behind an `Arc`). Matching is exact and case-insensitive; anything the
 * schema does not know passes through the codec verbatim.
 *
 * ```toml
 * [[file]]
 * name = "system"
 * role = "system"
 *
 * [[file.block]]
 * name = "Object"
 * identifier = "nickname"
 *
 * [[file.block.option]]
 * name = "nickname"
 *
 * [[file.block.option]]
 * name = "archetype"
 * ```
 */

use serde::{Deserialize, Serialize};

use crate::format::{IniBlock, IniEntry, IniOption};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to parse template schema: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("file template index {0} is out of range")]
    UnknownFile(usize),
}

/// Which viewer mode a file type drives. The original editor hardcoded
/// template indices for this; here it is declared on the file template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    System,
    Universe,
    SolarArchetype,
    ModelPreview,
    #[default]
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTemplate {
    pub name: String,
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub name: String,
    /// Whether more than one live instance of this block may exist. Adding
    /// to a document that already holds the single allowed instance becomes
    /// an edit of that instance.
    #[serde(default = "default_true")]
    pub multiple: bool,
    /// Option whose first entry names the block (the `MainOption`).
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, rename = "option")]
    pub options: Vec<OptionTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTemplate {
    pub name: String,
    #[serde(default)]
    pub role: FileRole,
    #[serde(default, rename = "block")]
    pub blocks: Vec<BlockTemplate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, rename = "file")]
    pub files: Vec<FileTemplate>,
}

impl Template {
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(source)?)
    }

    pub fn file(&self, file_index: usize) -> Result<&FileTemplate, SchemaError> {
        self.files
            .get(file_index)
            .ok_or(SchemaError::UnknownFile(file_index))
    }
}

impl FileTemplate {
    /// Case-insensitive block template lookup.
    pub fn block_index(&self, name: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.name.eq_ignore_ascii_case(name))
    }

    pub fn block(&self, block_index: usize) -> Option<&BlockTemplate> {
        self.blocks.get(block_index)
    }

    /// Build the schema-default block for a template: every templated option
    /// present and empty, except the identifier option which is pre-filled
    /// with `name` and becomes the main option.
    pub fn default_block(&self, block_index: usize, name: &str) -> Option<IniBlock> {
        let block_template = self.block(block_index)?;

        let mut block = IniBlock::new(&block_template.name);
        block.template_index = Some(block_index);

        for (position, option_template) in block_template.options.iter().enumerate() {
            let mut option = IniOption::new(&option_template.name);
            option.template_index = Some(position);

            if let Some(identifier) = &block_template.identifier
                && identifier.eq_ignore_ascii_case(&option_template.name)
            {
                block.main_option_index = Some(position);
                option.entries.push(IniEntry::new(name));
            }

            block.options.push(option);
        }

        Some(block)
    }
}

impl BlockTemplate {
    /// Case-insensitive option template lookup.
    pub fn option_index(&self, name: &str) -> Option<usize> {
        self.options
            .iter()
            .position(|option| option.name.eq_ignore_ascii_case(name))
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[file]]
        name = "system"
        role = "system"

        [[file.block]]
        name = "SystemInfo"
        multiple = false

        [[file.block.option]]
        name = "space_color"

        [[file.block]]
        name = "Object"
        identifier = "nickname"

        [[file.block.option]]
        name = "nickname"

        [[file.block.option]]
        name = "archetype"

        [[file]]
        name = "universe"
        role = "universe"
    "#;

    #[test]
    fn parses_toml_schema() {
        let template = Template::from_toml_str(SAMPLE).unwrap();

        assert_eq!(template.files.len(), 2);
        let system = template.file(0).unwrap();
        assert_eq!(system.role, FileRole::System);
        assert_eq!(system.blocks.len(), 2);
        // `multiple` defaults to true, explicit false sticks.
        assert!(!system.blocks[0].multiple);
        assert!(system.blocks[1].multiple);
        assert_eq!(system.blocks[1].identifier.as_deref(), Some("nickname"));
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let template = Template::from_toml_str(SAMPLE).unwrap();
        let system = template.file(0).unwrap();

        assert_eq!(system.block_index("OBJECT"), Some(1));
        assert_eq!(system.block_index("object"), Some(1));
        assert_eq!(system.block_index("nope"), None);
        assert_eq!(system.blocks[1].option_index("ARCHETYPE"), Some(1));
    }

    #[test]
    fn unknown_file_index_is_an_error() {
        let template = Template::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(
            template.file(7),
            Err(SchemaError::UnknownFile(7))
        ));
    }

    #[test]
    fn default_block_prefills_the_identifier() {
        let template = Template::from_toml_str(SAMPLE).unwrap();
        let system = template.file(0).unwrap();

        let block = system.default_block(1, "new_object").unwrap();
        assert_eq!(block.name, "Object");
        assert_eq!(block.template_index, Some(1));
        assert_eq!(block.options.len(), 2);
        assert_eq!(block.main_option_index, Some(0));
        assert_eq!(block.display_name(), Some("new_object"));
        assert!(block.options[1].entries.is_empty());

        assert!(system.default_block(9, "x").is_none());
    }
}
