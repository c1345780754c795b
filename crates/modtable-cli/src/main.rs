use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use modtable_engine::{
    ArchetypeManager, CodecOptions, EditorSession, FileRole, FileTemplate, ParsedFile, Template,
    WireFormat, io, read_bytes, write_bytes,
};

#[derive(Parser)]
#[command(name = "modtable", version, about = "Inspect and convert mod configuration files")]
struct Cli {
    /// TOML template schema describing the known file types
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Index of the file type within the template schema
    #[arg(long, global = true, default_value_t = 0)]
    file_type: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a file and print its blocks with their classification
    Inspect {
        file: PathBuf,
        /// Solar archetype file to resolve object types against
        #[arg(long)]
        archetypes: Option<PathBuf>,
    },
    /// Re-serialize a file in the requested wire format
    Convert {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        to: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Binary,
}

impl From<Format> for WireFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => WireFormat::Text,
            Format::Binary => WireFormat::Binary,
        }
    }
}

/// Schema-less fallback: everything parses, nothing classifies.
fn generic_template() -> Template {
    Template {
        files: vec![FileTemplate {
            name: "generic".into(),
            role: FileRole::Generic,
            blocks: Vec::new(),
        }],
    }
}

fn parse_file(
    path: &Path,
    template: &FileTemplate,
    file_index: usize,
    options: &CodecOptions,
) -> Result<ParsedFile> {
    let bytes =
        io::read_bytes(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = read_bytes(&bytes, template, file_index, options)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    for warning in &parsed.warnings {
        log::warn!("{}: {warning}", path.display());
    }
    Ok(parsed)
}

fn convert(
    input: &Path,
    output: &Path,
    template: &FileTemplate,
    file_index: usize,
    format: WireFormat,
) -> Result<usize> {
    let options = CodecOptions::default();
    let parsed = parse_file(input, template, file_index, &options)?;

    // Save with what detection resolved so a UTF-16 file stays UTF-16.
    let write_options = CodecOptions {
        encoding: parsed.encoding,
        ..options
    };
    let rendered = write_bytes(&parsed.document, &write_options, format)
        .with_context(|| format!("failed to serialize {}", output.display()))?;
    io::write_bytes(output, &rendered)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(parsed.document.blocks.len())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let (template, file_index) = match &cli.template {
        Some(path) => {
            let template = io::load_template(path)
                .with_context(|| format!("failed to load template {}", path.display()))?;
            if template.files.get(cli.file_type).is_none() {
                anyhow::bail!("file type {} is not in the template", cli.file_type);
            }
            (template, cli.file_type)
        }
        None => (generic_template(), 0),
    };
    let file_template = template.files[file_index].clone();
    let options = CodecOptions::default();

    match cli.command {
        Command::Inspect { file, archetypes } => {
            let parsed = parse_file(&file, &file_template, file_index, &options)?;
            let mut session = EditorSession::from_document(Arc::new(template), parsed.document)?;

            if let Some(path) = archetypes {
                let archetype_template = generic_template();
                let archetype_file =
                    parse_file(&path, &archetype_template.files[0], 0, &options)?;
                let manager = ArchetypeManager::from_document(&archetype_file.document);
                log::info!("loaded {} archetypes from {}", manager.len(), path.display());
                session.load_archetypes(&archetype_file.document);
            }

            println!(
                "{} ({:?}, {:?}, viewer {:?})",
                file.display(),
                parsed.format,
                parsed.encoding,
                session.viewer_type()
            );
            println!("{:>5}  {:>4}  {:<28}  {}", "index", "id", "name", "type");
            for block in session.data().blocks_ordered() {
                println!(
                    "{:>5}  {:>4}  {:<28}  {}",
                    block.index, block.id, block.name, block.content_type
                );
            }
        }
        Command::Convert { input, output, to } => {
            let blocks = convert(&input, &output, &file_template, file_index, to.into())?;
            println!("{} -> {} ({blocks} blocks)", input.display(), output.display());
        }
    }

    Ok(())
}
