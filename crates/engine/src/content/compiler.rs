use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use glam::Vec3;
use roxmltree::{Document, Node};
use tracing::debug;

use crate::AppPaths;

use super::database::{CityStateDef, CityStateDefId, DefDatabase, UnitDef, UnitDefId};
use super::discovery::{discover_mod_sources, ContentDiscoveryError, ContentRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Default)]
struct ParsedDefs {
    units: Vec<UnitDef>,
    city_states: Vec<CityStateDef>,
    names: Vec<String>,
}

/// Compiles `<Defs>` XML from the base directory and every enabled mod.
/// A def name may appear once per mod; across mods the last mod wins.
pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut units = BTreeMap::<String, UnitDef>::new();
    let mut city_states = BTreeMap::<String, CityStateDef>::new();
    let mut names = Vec::<String>::new();
    let mut seen_names = HashSet::<String>::new();

    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut units_in_mod = HashSet::<String>::new();
        let mut cities_in_mod = HashSet::<String>::new();

        for xml_file in &xml_files {
            let raw = fs::read_to_string(xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let parsed = parse_defs_document(&source.mod_id, xml_file, &raw)?;

            for def in parsed.units {
                if !units_in_mod.insert(def.def_name.clone()) {
                    return Err(duplicate_in_mod("UnitDef", &def.def_name, &source.mod_id, xml_file));
                }
                units.insert(def.def_name.clone(), def);
            }
            for def in parsed.city_states {
                if !cities_in_mod.insert(def.def_name.clone()) {
                    return Err(duplicate_in_mod(
                        "CityStateDef",
                        &def.def_name,
                        &source.mod_id,
                        xml_file,
                    ));
                }
                city_states.insert(def.def_name.clone(), def);
            }
            for name in parsed.names {
                if seen_names.insert(name.clone()) {
                    names.push(name);
                }
            }
        }

        debug!(
            mod_id = %source.mod_id,
            mod_load_index = source.mod_load_index,
            xml_file_count = xml_files.len(),
            "content_mod_compiled"
        );
    }

    Ok(DefDatabase::new(
        units.into_values().collect(),
        city_states.into_values().collect(),
        names,
    ))
}

fn duplicate_in_mod(kind: &str, def_name: &str, mod_id: &str, file_path: &Path) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::DuplicateDefInMod,
        message: format!(
            "duplicate {kind} '{def_name}' in mod '{mod_id}'; each mod may define a defName only once"
        ),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: None,
    }
}

/// Error construction and field parsing for one document.
struct DocContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn error(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn text(&self, node: Node<'_, '_>, field: &str) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{field}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn number<T: FromStr>(&self, node: Node<'_, '_>, field: &str) -> Result<T, ContentCompileError> {
        let value = self.text(node, field)?;
        value.parse::<T>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field} '{value}' is not a valid number"),
                node,
            )
        })
    }

    fn non_negative(&self, node: Node<'_, '_>, field: &str) -> Result<f32, ContentCompileError> {
        let parsed = self.number::<f32>(node, field)?;
        if !parsed.is_finite() || parsed < 0.0 {
            return Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field} must be finite and >= 0"),
                node,
            ));
        }
        Ok(parsed)
    }

    fn fraction(&self, node: Node<'_, '_>, field: &str) -> Result<f32, ContentCompileError> {
        let parsed = self.non_negative(node, field)?;
        if parsed > 1.0 {
            return Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field} must be within [0, 1]"),
                node,
            ));
        }
        Ok(parsed)
    }

    fn boolean(&self, node: Node<'_, '_>, field: &str) -> Result<bool, ContentCompileError> {
        let value = self.text(node, field)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field} '{value}' must be true or false"),
                node,
            )),
        }
    }

    /// Parses `x,y,z`.
    fn vec3(&self, node: Node<'_, '_>, field: &str) -> Result<Vec3, ContentCompileError> {
        let value = self.text(node, field)?;
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>();
        match parts.as_deref() {
            Ok([x, y, z]) if x.is_finite() && y.is_finite() && z.is_finite() => {
                Ok(Vec3::new(*x, *y, *z))
            }
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field} '{value}' must be three comma-separated numbers"),
                node,
            )),
        }
    }

    fn missing(&self, def_type: &str, field: &str, node: Node<'_, '_>) -> ContentCompileError {
        self.error(
            ContentErrorCode::MissingField,
            format!("missing required field <{field}> in <{def_type}>"),
            node,
        )
    }
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<ParsedDefs, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = DocContext {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut parsed = ParsedDefs::default();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "UnitDef" => parsed.units.push(parse_unit_def(&ctx, child)?),
            "CityStateDef" => parsed.city_states.push(parse_city_state_def(&ctx, child)?),
            "Names" => parsed.names.extend(parse_names(&ctx, child)?),
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected <UnitDef>, <CityStateDef> or <Names>"
                    ),
                    child,
                ))
            }
        }
    }

    Ok(parsed)
}

/// Yields each element child once, rejecting repeated field names.
fn unique_fields<'a, 'input>(
    ctx: &DocContext<'_, '_>,
    def_type: &str,
    node: Node<'a, 'input>,
) -> Result<Vec<(String, Node<'a, 'input>)>, ContentCompileError> {
    let mut seen = HashSet::<String>::new();
    let mut fields = Vec::new();
    for field in node.children().filter(|child| child.is_element()) {
        let name = field.tag_name().name().to_string();
        if !seen.insert(name.clone()) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{name}> in <{def_type}>"),
                field,
            ));
        }
        fields.push((name, field));
    }
    Ok(fields)
}

fn unknown_field(ctx: &DocContext<'_, '_>, def_type: &str, name: &str, node: Node<'_, '_>) -> ContentCompileError {
    ctx.error(
        ContentErrorCode::UnknownField,
        format!("unknown field <{name}> in <{def_type}>"),
        node,
    )
}

fn parse_unit_def(ctx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<UnitDef, ContentCompileError> {
    const DEF: &str = "UnitDef";
    let mut def_name = None;
    let mut label = None;
    let mut model = None;
    let mut scale = 1.0;
    let mut damage = None;
    let mut health = None;
    let mut speed = 1.0;
    let mut ranged = false;
    let mut attack_range = 1.0;
    let mut attack_trigger = 0.5;

    for (name, field) in unique_fields(ctx, DEF, node)? {
        match name.as_str() {
            "defName" => def_name = Some(ctx.text(field, "defName")?),
            "label" => label = Some(ctx.text(field, "label")?),
            "model" => model = Some(ctx.text(field, "model")?),
            "scale" => scale = ctx.non_negative(field, "scale")?,
            "damage" => damage = Some(ctx.number::<u32>(field, "damage")?),
            "health" => health = Some(ctx.number::<u32>(field, "health")?),
            "speed" => speed = ctx.non_negative(field, "speed")?,
            "ranged" => ranged = ctx.boolean(field, "ranged")?,
            "attackRange" => attack_range = ctx.non_negative(field, "attackRange")?,
            "attackTrigger" => attack_trigger = ctx.fraction(field, "attackTrigger")?,
            _ => return Err(unknown_field(ctx, DEF, &name, field)),
        }
    }

    let def_name = def_name.ok_or_else(|| ctx.missing(DEF, "defName", node))?;
    let health = health.ok_or_else(|| ctx.missing(DEF, "health", node))?;
    let damage = damage.ok_or_else(|| ctx.missing(DEF, "damage", node))?;
    Ok(UnitDef {
        id: UnitDefId(0),
        label: label.unwrap_or_else(|| def_name.clone()),
        model: model.unwrap_or_else(|| def_name.clone()),
        def_name,
        scale,
        damage,
        health,
        speed,
        ranged,
        attack_range,
        attack_trigger,
    })
}

fn parse_city_state_def(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<CityStateDef, ContentCompileError> {
    const DEF: &str = "CityStateDef";
    let mut def_name = None;
    let mut label = None;
    let mut position = None;
    let mut rotation = Vec3::ZERO;
    let mut renown = 0;
    let mut garrison = 0;
    let mut description = String::new();

    for (name, field) in unique_fields(ctx, DEF, node)? {
        match name.as_str() {
            "defName" => def_name = Some(ctx.text(field, "defName")?),
            "label" => label = Some(ctx.text(field, "label")?),
            "position" => position = Some(ctx.vec3(field, "position")?),
            "rotation" => rotation = ctx.vec3(field, "rotation")?,
            "renown" => renown = ctx.number::<u32>(field, "renown")?,
            "garrison" => garrison = ctx.number::<u32>(field, "garrison")?,
            "description" => {
                description = field.text().map(str::trim).unwrap_or_default().to_string()
            }
            _ => return Err(unknown_field(ctx, DEF, &name, field)),
        }
    }

    let def_name = def_name.ok_or_else(|| ctx.missing(DEF, "defName", node))?;
    let position = position.ok_or_else(|| ctx.missing(DEF, "position", node))?;
    Ok(CityStateDef {
        id: CityStateDefId(0),
        label: label.unwrap_or_else(|| def_name.clone()),
        def_name,
        position,
        rotation,
        renown,
        garrison,
        description,
    })
}

fn parse_names(ctx: &DocContext<'_, '_>, node: Node<'_, '_>) -> Result<Vec<String>, ContentCompileError> {
    let mut names = Vec::new();
    for item in node.children().filter(|child| child.is_element()) {
        if item.tag_name().name() != "li" {
            return Err(unknown_field(ctx, "Names", item.tag_name().name(), item));
        }
        names.push(ctx.text(item, "li")?);
    }
    Ok(names)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    if !root.is_dir() {
        return Ok(files);
    }
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentDiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        ContentDiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check enabled mod list",
                mod_id,
                expected_dir.display()
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}
