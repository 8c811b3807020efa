use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "wpmigrate.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub export_file: PathBuf,
    pub individual_posts_dir: PathBuf,
    pub structured_json_dir: PathBuf,
    pub structured_xml_dir: PathBuf,
    pub images_dir: PathBuf,
    pub materials_dir: PathBuf,
    pub content_dir: PathBuf,
    pub reports_dir: PathBuf,
    // prefixes recorded in records as `photo_local_path` / `local_path`
    pub image_prefix: String,
    pub material_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            export_file: PathBuf::from("migration/export.xml"),
            individual_posts_dir: PathBuf::from("migration/individual-posts"),
            structured_json_dir: PathBuf::from("migration/output/structured-json"),
            structured_xml_dir: PathBuf::from("migration/output/structured-xml"),
            images_dir: PathBuf::from("migration/output/assets/images"),
            materials_dir: PathBuf::from("migration/output/assets/materials"),
            content_dir: PathBuf::from("content/meetings"),
            reports_dir: PathBuf::from("migration/output"),
            image_prefix: "assets/images".to_string(),
            material_prefix: "assets/materials".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub referer: Option<String>,
    pub timeout_secs: u64,
    pub material_timeout_secs: u64,
    pub delay_ms: u64, // pause between records in batch runs
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("wpmigrate/", env!("CARGO_PKG_VERSION")).to_string(),
            referer: None,
            timeout_secs: 15,
            material_timeout_secs: 30,
            delay_ms: 2000,
        }
    }
}

impl Config {
    /// Reads `explicit`, else `<root>/wpmigrate.toml` when present, else defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub export_file: PathBuf,
    pub individual_posts_dir: PathBuf,
    pub structured_json_dir: PathBuf,
    pub structured_xml_dir: PathBuf,
    pub images_dir: PathBuf,
    pub materials_dir: PathBuf,
    pub content_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, config: &PathsConfig) -> Self {
        let root = root.into();
        Self {
            export_file: root.join(&config.export_file),
            individual_posts_dir: root.join(&config.individual_posts_dir),
            structured_json_dir: root.join(&config.structured_json_dir),
            structured_xml_dir: root.join(&config.structured_xml_dir),
            images_dir: root.join(&config.images_dir),
            materials_dir: root.join(&config.materials_dir),
            content_dir: root.join(&config.content_dir),
            reports_dir: root.join(&config.reports_dir),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.individual_posts_dir)?;
        fs::create_dir_all(&self.structured_json_dir)?;
        fs::create_dir_all(&self.structured_xml_dir)?;
        fs::create_dir_all(&self.images_dir)?;
        fs::create_dir_all(&self.materials_dir)?;
        fs::create_dir_all(&self.content_dir)?;
        fs::create_dir_all(&self.reports_dir)?;
        Ok(())
    }

    /// Structured XML twin of a JSON record, matched by file stem.
    pub fn xml_for_json(&self, json_path: &Path) -> Option<PathBuf> {
        let stem = json_path.file_stem()?;
        let mut name = stem.to_os_string();
        name.push(".xml");
        Some(self.structured_xml_dir.join(name))
    }
}

/// Files in `dir` with the given extension, sorted by name.
pub fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|found| found == ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [paths]
            content_dir = "site/content/meetings"

            [fetch]
            delay_ms = 0
            referer = "https://example.org/"
            "#,
        )
        .unwrap();
        assert_eq!(config.paths.content_dir, PathBuf::from("site/content/meetings"));
        assert_eq!(config.paths.image_prefix, "assets/images");
        assert_eq!(config.fetch.delay_ms, 0);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.referer.as_deref(), Some("https://example.org/"));
    }

    #[test]
    fn missing_file_means_defaults_but_explicit_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path(), None).unwrap(), Config::default());
        assert!(Config::load(dir.path(), Some(dir.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn paths_resolve_against_root_and_pair_records() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path(), &PathsConfig::default());
        paths.ensure().unwrap();
        assert!(paths.content_dir.is_dir());

        let json = paths.structured_json_dir.join("april-2021-14812.json");
        assert_eq!(
            paths.xml_for_json(&json),
            Some(paths.structured_xml_dir.join("april-2021-14812.xml"))
        );

        fs::write(paths.content_dir.join("b.md"), "").unwrap();
        fs::write(paths.content_dir.join("a.md"), "").unwrap();
        fs::write(paths.content_dir.join("notes.txt"), "").unwrap();
        let found = files_with_extension(&paths.content_dir, "md").unwrap();
        assert_eq!(
            found,
            vec![paths.content_dir.join("a.md"), paths.content_dir.join("b.md")]
        );
    }
}
