//! Template catalog: named event blueprints persisted as JSON or TOML.
//!
//! JSON is the canonical record written by [`TemplateCatalog::save`]; TOML is
//! the hand-editable form. Either is picked up at startup, and writing one
//! form removes the other so a name never has two competing records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use raidcall_core::{EventTemplate, RaidcallError, Result};

use crate::builtin;
use crate::fsio;

/// Serialized form of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Json,
    Toml,
}

impl TemplateFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn encode(self, template: &EventTemplate) -> Result<Vec<u8>> {
        let text = match self {
            Self::Json => serde_json::to_string_pretty(template)
                .map_err(|e| RaidcallError::Persistence(format!("Serialize template: {e}")))?,
            Self::Toml => toml::to_string_pretty(template)
                .map_err(|e| RaidcallError::Persistence(format!("Serialize template: {e}")))?,
        };
        Ok(text.into_bytes())
    }

    pub fn decode(self, bytes: &[u8]) -> Result<EventTemplate> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| RaidcallError::Validation(format!("Template is not UTF-8: {e}")))?;
        match self {
            Self::Json => serde_json::from_str(text)
                .map_err(|e| RaidcallError::Validation(format!("Parse template JSON: {e}"))),
            Self::Toml => toml::from_str(text)
                .map_err(|e| RaidcallError::Validation(format!("Parse template TOML: {e}"))),
        }
    }
}

impl std::str::FromStr for TemplateFormat {
    type Err = RaidcallError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(RaidcallError::Validation(format!(
                "unknown template format '{other}' (use json or toml)"
            ))),
        }
    }
}

/// Persistent, validated collection of templates keyed by name.
pub struct TemplateCatalog {
    dir: PathBuf,
    templates: RwLock<HashMap<String, EventTemplate>>,
}

impl TemplateCatalog {
    /// Open the catalog at `dir`, loading every `.json`/`.toml` record.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            RaidcallError::Persistence(format!("Create {}: {e}", dir.display()))
        })?;
        let catalog = Self {
            dir: dir.to_path_buf(),
            templates: RwLock::new(HashMap::new()),
        };
        let loaded = catalog.load()?;
        tracing::info!("📦 Loaded {loaded} templates from {}", dir.display());
        Ok(catalog)
    }

    /// Open and seed the built-in templates when the catalog is empty.
    pub fn open_with_defaults(dir: &Path, now: DateTime<Utc>) -> Result<Self> {
        let catalog = Self::open(dir)?;
        if catalog.count() == 0 {
            let defaults = builtin::default_templates();
            let n = defaults.len();
            for template in defaults {
                catalog.save(template, now)?;
            }
            tracing::info!("✅ Created {n} default templates");
        }
        Ok(catalog)
    }

    /// Validate, stamp and persist as JSON.
    pub fn save(&self, template: EventTemplate, now: DateTime<Utc>) -> Result<EventTemplate> {
        self.save_as(template, TemplateFormat::Json, now)
    }

    /// Validate, stamp and persist in the given format.
    pub fn save_as(
        &self,
        mut template: EventTemplate,
        format: TemplateFormat,
        now: DateTime<Utc>,
    ) -> Result<EventTemplate> {
        template.created_at.get_or_insert(now);
        template.updated_at = Some(now);
        self.store(template, format)
    }

    pub fn get(&self, name: &str) -> Result<EventTemplate> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| RaidcallError::template_not_found(name))
    }

    /// All templates sorted by name.
    pub fn list(&self) -> Vec<EventTemplate> {
        let mut templates: Vec<_> = self.read().values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        templates
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Remove a template in both forms. Absent templates are fine.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut templates = self.write();
        if stem_owner(&templates, name).is_none() {
            for format in [TemplateFormat::Json, TemplateFormat::Toml] {
                fsio::remove_if_exists(&self.record_path(name, format))?;
            }
        }
        if templates.remove(name).is_some() {
            tracing::info!("🗑️ Template deleted: {name}");
        }
        Ok(())
    }

    /// Deep copy `source` under `new_name`.
    pub fn clone_template(
        &self,
        source: &str,
        new_name: &str,
        now: DateTime<Utc>,
    ) -> Result<EventTemplate> {
        let mut copy = self.get(source)?;
        copy.name = new_name.to_string();
        copy.created_at = None;
        self.save(copy, now)
    }

    /// Serialize a template for transfer.
    pub fn export(&self, name: &str, format: TemplateFormat) -> Result<Vec<u8>> {
        format.encode(&self.get(name)?)
    }

    /// Parse and store a template, keeping its timestamps as given.
    pub fn import(&self, bytes: &[u8], format: TemplateFormat) -> Result<EventTemplate> {
        let template = format.decode(bytes)?;
        self.store(template, TemplateFormat::Json)
    }

    fn store(&self, template: EventTemplate, format: TemplateFormat) -> Result<EventTemplate> {
        template.validate()?;
        if template.file_stem().is_empty() {
            return Err(RaidcallError::Validation(format!(
                "template name '{}' has no filesystem-safe characters",
                template.name
            )));
        }

        let mut templates = self.write();
        if let Some(owner) = stem_owner(&templates, &template.name) {
            return Err(RaidcallError::Validation(format!(
                "template name '{}' maps to the same file as '{owner}'",
                template.name
            )));
        }
        let bytes = format.encode(&template)?;
        fsio::write_atomic(&self.record_path(&template.name, format), &bytes)?;
        let other = match format {
            TemplateFormat::Json => TemplateFormat::Toml,
            TemplateFormat::Toml => TemplateFormat::Json,
        };
        fsio::remove_if_exists(&self.record_path(&template.name, other))?;

        tracing::debug!("💾 Saved template '{}' as {}", template.name, format.extension());
        templates.insert(template.name.clone(), template.clone());
        Ok(template)
    }

    fn record_path(&self, name: &str, format: TemplateFormat) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            raidcall_core::sanitize_filename(name),
            format.extension()
        ))
    }

    fn load(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            RaidcallError::Persistence(format!("Read {}: {e}", self.dir.display()))
        })?;

        let mut templates = self.write();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(format) = TemplateFormat::from_path(&path) else {
                continue;
            };
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("⚠️ Failed to read {}: {e}", path.display());
                    continue;
                }
            };
            match format.decode(&bytes) {
                Ok(template) => {
                    templates.insert(template.name.clone(), template);
                }
                Err(e) => tracing::warn!("⚠️ Skipping {}: {e}", path.display()),
            }
        }
        Ok(templates.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, EventTemplate>> {
        self.templates.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, EventTemplate>> {
        self.templates.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Another indexed template whose record file `name` would share.
fn stem_owner<'a>(templates: &'a HashMap<String, EventTemplate>, name: &str) -> Option<&'a str> {
    let stem = raidcall_core::sanitize_filename(name);
    templates
        .values()
        .find(|t| t.name != name && t.file_stem() == stem)
        .map(|t| t.name.as_str())
}
