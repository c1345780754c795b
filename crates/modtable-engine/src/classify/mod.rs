/*!
 * # Archetype Resolver / Content Classifier
 *
 * Assigns a semantic [`ContentType`] to each block from its template
 * identity and option values, optionally cross-referencing a separately
 * loaded archetype document. Classification is a pure function dispatched
 * through an explicit per-viewer function table; it is re-run whenever a
 * block's defining options change and whenever the archetype document is
 * (re)loaded.
 *
 * Missing or unresolvable archetype data degrades affected blocks to the
 * [`ContentType::None`] sentinel. It is never an error.
 */

use std::collections::HashMap;
use std::fmt;

use crate::format::IniDocument;
use crate::schema::FileRole;
use crate::table::TableBlock;

/// Editing/viewing mode of a session, derived from the file template's
/// role. Only `System` mode cross-references the archetype document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerType {
    System,
    Universe,
    SolarArchetype,
    ModelPreview,
    #[default]
    None,
}

type ClassifyFn = fn(&mut TableBlock, Option<&ArchetypeManager>);

impl ViewerType {
    pub fn from_role(role: FileRole) -> Self {
        match role {
            FileRole::System => ViewerType::System,
            FileRole::Universe => ViewerType::Universe,
            FileRole::SolarArchetype => ViewerType::SolarArchetype,
            FileRole::ModelPreview => ViewerType::ModelPreview,
            FileRole::Generic => ViewerType::None,
        }
    }

    /// Per-variant classifier table. `None` viewer means nothing ever
    /// classifies.
    fn classifier(self) -> Option<ClassifyFn> {
        match self {
            ViewerType::System => Some(classify_system),
            ViewerType::Universe => Some(classify_universe),
            ViewerType::SolarArchetype => Some(classify_solar_archetype),
            ViewerType::ModelPreview => Some(classify_model_preview),
            ViewerType::None => None,
        }
    }
}

/// Semantic content type of a block. `None` is the "unclassified" sentinel;
/// only non-sentinel blocks are eligible for visibility toggling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    None,
    System,
    LightSource,
    Construct,
    Depot,
    DockingRing,
    JumpGate,
    JumpHole,
    Planet,
    Satellite,
    Ship,
    Station,
    Sun,
    TradeLane,
    WeaponsPlatform,
    Zone,
    ZoneExclusion,
    ZonePath,
    ModelPreview,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ContentType::None => "None",
            ContentType::System => "System",
            ContentType::LightSource => "Light Source",
            ContentType::Construct => "Construct",
            ContentType::Depot => "Depot",
            ContentType::DockingRing => "Docking Ring",
            ContentType::JumpGate => "Jump Gate",
            ContentType::JumpHole => "Jump Hole",
            ContentType::Planet => "Planet",
            ContentType::Satellite => "Satellite",
            ContentType::Ship => "Ship",
            ContentType::Station => "Station",
            ContentType::Sun => "Sun",
            ContentType::TradeLane => "Trade Lane",
            ContentType::WeaponsPlatform => "Weapons Platform",
            ContentType::Zone => "Zone",
            ContentType::ZoneExclusion => "Exclusion Zone",
            ContentType::ZonePath => "Path Zone",
            ContentType::ModelPreview => "Model Preview",
        };
        f.write_str(text)
    }
}

/// Classify one block for the given viewer mode.
pub fn classify(viewer: ViewerType, block: &mut TableBlock, archetype: Option<&ArchetypeManager>) {
    match viewer.classifier() {
        Some(classifier) => classifier(block, archetype),
        None => block.content_type = ContentType::None,
    }
}

fn classify_system(block: &mut TableBlock, archetype: Option<&ArchetypeManager>) {
    // Re-derived below; an edit may have removed the defining option.
    block.archetype = None;
    let block_name = block.block.name.to_ascii_lowercase();
    block.content_type = match block_name.as_str() {
        "lightsource" => ContentType::LightSource,
        "zone" => zone_content_type(block),
        "object" => match block.block.option_value("archetype") {
            Some(key) => {
                let key = key.to_owned();
                let resolved = archetype.and_then(|manager| manager.type_of(&key));
                if resolved.is_none() {
                    log::debug!("archetype `{key}` unresolved, degrading to sentinel");
                }
                block.archetype = Some(key);
                resolved.unwrap_or(ContentType::None)
            }
            None => ContentType::None,
        },
        _ => ContentType::None,
    };
}

fn classify_universe(block: &mut TableBlock, _archetype: Option<&ArchetypeManager>) {
    block.content_type = if block.block.name.eq_ignore_ascii_case("system") {
        ContentType::System
    } else {
        ContentType::None
    };
}

fn classify_solar_archetype(block: &mut TableBlock, _archetype: Option<&ArchetypeManager>) {
    block.content_type = if block.block.name.eq_ignore_ascii_case("solar") {
        block
            .block
            .option_value("type")
            .map(solar_content_type)
            .unwrap_or(ContentType::None)
    } else {
        ContentType::None
    };
}

fn classify_model_preview(block: &mut TableBlock, _archetype: Option<&ArchetypeManager>) {
    block.content_type = if block.block.option("da_archetype").is_some() {
        ContentType::ModelPreview
    } else {
        ContentType::None
    };
}

/// Shape refinement for `[Zone]` blocks: path zones carry a `usage`, an
/// exclusion zone is named as such, everything else is a plain zone.
fn zone_content_type(block: &TableBlock) -> ContentType {
    if block.block.option("usage").is_some() {
        return ContentType::ZonePath;
    }
    let nickname = block.block.option_value("nickname").unwrap_or("");
    if nickname.to_ascii_lowercase().contains("exclusion") {
        ContentType::ZoneExclusion
    } else {
        ContentType::Zone
    }
}

/// Map a solar archetype `type` value to a content type.
pub fn solar_content_type(value: &str) -> ContentType {
    match value.to_ascii_lowercase().as_str() {
        "sun" => ContentType::Sun,
        "planet" => ContentType::Planet,
        "station" => ContentType::Station,
        "jump_gate" | "jumpgate" => ContentType::JumpGate,
        "jump_hole" | "jumphole" => ContentType::JumpHole,
        "docking_ring" => ContentType::DockingRing,
        "satellite" | "mission_satellite" => ContentType::Satellite,
        "weapons_platform" => ContentType::WeaponsPlatform,
        "tradelane_ring" => ContentType::TradeLane,
        "depot" | "destroyable_depot" => ContentType::Depot,
        "non_targetable" => ContentType::Construct,
        _ => ContentType::None,
    }
}

/// Lookup table from a parsed archetype document: solar nickname (case
/// folded) to the content type its `type` option declares.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeManager {
    types: HashMap<String, ContentType>,
}

impl ArchetypeManager {
    pub fn from_document(document: &IniDocument) -> Self {
        let mut types = HashMap::new();

        for block in &document.blocks {
            if !block.name.eq_ignore_ascii_case("solar") {
                continue;
            }
            let Some(nickname) = block.option_value("nickname") else {
                log::debug!("solar block without nickname skipped");
                continue;
            };
            let content_type = block
                .option_value("type")
                .map(solar_content_type)
                .unwrap_or(ContentType::None);
            types.insert(nickname.to_ascii_lowercase(), content_type);
        }

        log::debug!("archetype table loaded with {} entries", types.len());
        Self { types }
    }

    /// Resolve an archetype key, case-insensitively. `None` means the key
    /// is unknown and the caller degrades to the sentinel.
    pub fn type_of(&self, nickname: &str) -> Option<ContentType> {
        self.types.get(&nickname.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
