//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::identity::EntityId;
use crate::engine::schedule::Cadence;

/// Marker directory holding project configuration
pub const PROJECT_DIR: &str = ".haccp";

/// Directory holding one YAML file per product plan
pub const PLANS_DIR: &str = "plans";

/// Suffix of plan files
pub const PLAN_SUFFIX: &str = ".haccp.yaml";

/// Represents a HACCP project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .haccp/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        Self::init_with(path, &ProjectDefaults::default(), false)
    }

    /// Initialize even if .haccp/ exists. Existing plans are left alone.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        Self::init_with(path, &ProjectDefaults::default(), true)
    }

    /// Create the project layout with `defaults` written into config.yaml.
    /// With `force`, an existing config is replaced; plan files never are.
    pub fn init_with(
        path: &Path,
        defaults: &ProjectDefaults,
        force: bool,
    ) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if !force && root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        let project_dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&project_dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(project_dir.join("config.yaml"), defaults.render())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join(PLANS_DIR))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Ok(Self { root })
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .haccp configuration directory
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Get the directory holding plan files
    pub fn plans_dir(&self) -> PathBuf {
        self.root.join(PLANS_DIR)
    }

    /// Path of the plan file for a product
    pub fn plan_path(&self, product_id: &EntityId) -> PathBuf {
        self.plans_dir().join(format!("{}{}", product_id, PLAN_SUFFIX))
    }

    /// Iterate all plan files in the project
    pub fn iter_plan_files(&self) -> impl Iterator<Item = PathBuf> {
        walkdir::WalkDir::new(self.plans_dir())
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().to_string_lossy().ends_with(PLAN_SUFFIX))
            .map(|e| e.path().to_path_buf())
    }
}

/// Project-wide defaults seeded into `.haccp/config.yaml` at init.
/// Unset values are written commented out so the file documents itself.
#[derive(Debug, Clone, Default)]
pub struct ProjectDefaults {
    pub author: Option<String>,
    pub verification_cadence: Option<Cadence>,
    pub out_of_spec_window_days: Option<u32>,
}

impl ProjectDefaults {
    pub fn render(&self) -> String {
        let mut out = String::from("# HACCP project configuration\n");

        out.push_str("\n# Default author for new records (can be overridden by global config)\n");
        match self.author {
            Some(ref author) => out.push_str(&format!("author: {:?}\n", author)),
            None => out.push_str("# author: \"\"\n"),
        }

        out.push_str("\n# Default output format (auto, yaml, json, tsv, id)\n");
        out.push_str("# default_format: auto\n");

        out.push_str("\n# Trailing window, in days, for out-of-spec counts on the dashboard\n");
        match self.out_of_spec_window_days {
            Some(days) => out.push_str(&format!("out_of_spec_window_days: {}\n", days)),
            None => out.push_str("# out_of_spec_window_days: 30\n"),
        }

        out.push_str("\n# Verification cadence proposed for new CCPs\n");
        out.push_str("# (daily, weekly, monthly, quarterly, annually)\n");
        match self.verification_cadence {
            Some(cadence) => {
                out.push_str(&format!("default_verification_cadence: {}\n", cadence))
            }
            None => out.push_str("# default_verification_cadence: monthly\n"),
        }

        out
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a HACCP project (searched from {searched_from:?}). Run 'haccp init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("HACCP project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.config_dir().join("config.yaml").exists());
        assert!(project.plans_dir().is_dir());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_init_with_seeds_config_defaults() {
        let tmp = tempdir().unwrap();
        let defaults = ProjectDefaults {
            author: Some("Jo Quality".to_string()),
            verification_cadence: Some(Cadence::Weekly),
            out_of_spec_window_days: None,
        };
        let project = Project::init_with(tmp.path(), &defaults, false).unwrap();

        let text = std::fs::read_to_string(project.config_dir().join("config.yaml")).unwrap();
        let value: serde_yml::Value = serde_yml::from_str(&text).unwrap();
        assert_eq!(value["author"].as_str(), Some("Jo Quality"));
        assert_eq!(value["default_verification_cadence"].as_str(), Some("weekly"));
        assert!(value.get("out_of_spec_window_days").is_none());
        assert!(text.contains("# out_of_spec_window_days: 30"));
    }

    #[test]
    fn test_forced_init_keeps_plan_files() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let plan = project.plan_path(&EntityId::new(EntityPrefix::Prod));
        std::fs::write(&plan, "kept").unwrap();

        let defaults = ProjectDefaults {
            out_of_spec_window_days: Some(7),
            ..Default::default()
        };
        let project = Project::init_with(tmp.path(), &defaults, true).unwrap();
        assert_eq!(std::fs::read_to_string(&plan).unwrap(), "kept");
        let text = std::fs::read_to_string(project.config_dir().join("config.yaml")).unwrap();
        assert!(text.contains("out_of_spec_window_days: 7"));
    }

    #[test]
    fn test_project_discover_finds_marker_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_marker_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn test_plan_path_naming() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let id = EntityId::new(EntityPrefix::Prod);
        let path = project.plan_path(&id);
        assert!(path.starts_with(project.plans_dir()));
        assert!(path.to_string_lossy().ends_with(".haccp.yaml"));

        std::fs::write(&path, "").unwrap();
        std::fs::write(project.plans_dir().join("notes.txt"), "").unwrap();
        assert_eq!(project.iter_plan_files().count(), 1);
    }
}
