//! File-backed plan repository
//!
//! One YAML file per product under `plans/`. Writes are serialized per
//! product with an exclusive lock file and land through a temp file that is
//! renamed over the old plan, so readers always see a complete file.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::core::error::{HaccpError, Result};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::project::Project;
use crate::engine::plan::HazardPlan;
use crate::engine::registry::PlanRepository;

/// How long a writer waits for another writer's lock
const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_POLL: Duration = Duration::from_millis(25);
/// Locks older than this are left over from a crashed process
const STALE_LOCK: Duration = Duration::from_secs(60);
/// Serializes product creation so code uniqueness holds across processes
const CREATE_LOCK: &str = ".create.lock";

/// Plans stored as YAML files in a project
#[derive(Debug, Clone)]
pub struct PlanStore {
    project: Project,
    lock_wait: Duration,
}

impl PlanStore {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            lock_wait: LOCK_WAIT,
        }
    }

    /// Override how long writers wait for a busy plan
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    fn read_plan(&self, path: &Path) -> Result<HazardPlan> {
        let contents = fs::read_to_string(path)?;
        let plan: HazardPlan = serde_yml::from_str(&contents)
            .map_err(|e| HaccpError::yaml(&e, &contents, &path.display().to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    fn load(&self, product_id: &EntityId) -> Result<HazardPlan> {
        let path = self.project.plan_path(product_id);
        if !path.exists() {
            return Err(HaccpError::not_found(product_id));
        }
        self.read_plan(&path)
    }

    fn write_plan(&self, plan: &HazardPlan) -> Result<()> {
        let path = self.project.plan_path(plan.product_id());
        let yaml = serde_yml::to_string(plan).map_err(|e| {
            HaccpError::Validation(format!("cannot serialize plan {}: {}", plan.product_id(), e))
        })?;

        let tmp = path.with_extension(format!("tmp-{}", ulid::Ulid::new()));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        file.write_all(yaml.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(product = %plan.product_id(), revision = plan.revision(), "plan written");
        Ok(())
    }

    fn lock(&self, product_id: &EntityId) -> Result<PlanLock> {
        PlanLock::acquire(
            self.project.plans_dir().join(format!("{}.lock", product_id)),
            &product_id.to_string(),
            self.lock_wait,
        )
    }

    /// Project-wide lock held while a new product is checked and written
    fn create_lock(&self, code: &str) -> Result<PlanLock> {
        PlanLock::acquire(self.project.plans_dir().join(CREATE_LOCK), code, self.lock_wait)
    }
}

impl PlanRepository for PlanStore {
    fn create(&self, plan: HazardPlan) -> Result<Arc<HazardPlan>> {
        plan.validate()?;
        fs::create_dir_all(self.project.plans_dir())?;
        let _registry = self.create_lock(&plan.product().code)?;
        let _lock = self.lock(plan.product_id())?;

        if self.project.plan_path(plan.product_id()).exists() {
            return Err(HaccpError::Validation(format!(
                "plan {} already exists",
                plan.product_id()
            )));
        }
        if let Some(other) = self
            .list()?
            .into_iter()
            .find(|p| p.product().code.eq_ignore_ascii_case(&plan.product().code))
        {
            return Err(HaccpError::Validation(format!(
                "product code {} is already used by {}",
                plan.product().code,
                other.product_id()
            )));
        }

        self.write_plan(&plan)?;
        Ok(Arc::new(plan))
    }

    fn get(&self, product_id: &EntityId) -> Result<Arc<HazardPlan>> {
        self.load(product_id).map(Arc::new)
    }

    fn list(&self) -> Result<Vec<Arc<HazardPlan>>> {
        let mut plans = Vec::new();
        for path in self.project.iter_plan_files() {
            let plan = self.read_plan(&path)?;
            if product_id_from_path(&path).as_ref() != Some(plan.product_id()) {
                return Err(HaccpError::Validation(format!(
                    "{} holds the plan of {}; plan files are named after their product id",
                    path.display(),
                    plan.product_id()
                )));
            }
            plans.push(Arc::new(plan));
        }
        plans.sort_by(|a, b| a.product().code.cmp(&b.product().code));
        Ok(plans)
    }

    fn save(&self, plan: HazardPlan, expected_revision: u32) -> Result<Arc<HazardPlan>> {
        let _lock = self.lock(plan.product_id())?;

        let found = self.load(plan.product_id())?.revision();
        if found != expected_revision {
            warn!(
                product = %plan.product_id(),
                expected = expected_revision,
                found,
                "plan changed on disk since it was read"
            );
            return Err(HaccpError::Conflict {
                kind: "plan",
                id: plan.product_id().to_string(),
                expected: expected_revision,
                found,
            });
        }

        self.write_plan(&plan)?;
        Ok(Arc::new(plan))
    }

    fn delete(&self, product_id: &EntityId) -> Result<HazardPlan> {
        let _lock = self.lock(product_id)?;
        let plan = self.load(product_id)?;
        plan.ensure_deletable()?;
        fs::remove_file(self.project.plan_path(product_id))?;
        Ok(plan)
    }
}

/// Exclusive lock file, released on drop
#[derive(Debug)]
struct PlanLock {
    path: PathBuf,
}

impl PlanLock {
    fn acquire(path: PathBuf, holder: &str, wait: Duration) -> Result<Self> {
        let started = std::time::Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        warn!(lock = %path.display(), "removing stale plan lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= wait {
                        return Err(HaccpError::Locked(holder.to_string()));
                    }
                    thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map_or(false, |age| age > STALE_LOCK)
    }
}

impl Drop for PlanLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Parse a product id from a plan file name
pub fn product_id_from_path(path: &Path) -> Option<EntityId> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(crate::core::project::PLAN_SUFFIX)?;
    EntityId::parse_as(stem, EntityPrefix::Prod).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product::Product;
    use crate::entities::step::StepParameters;
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn store() -> (TempDir, PlanStore) {
        crate::logging::init_test();
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        (tmp, PlanStore::new(project).with_lock_wait(Duration::from_millis(100)))
    }

    fn product(code: &str) -> HazardPlan {
        HazardPlan::new(Product::new(
            code.to_string(),
            "Test product".to_string(),
            "qa".to_string(),
        ))
    }

    #[test]
    fn test_create_and_reload() {
        let (_tmp, store) = store();
        let plan = store.create(product("BRD-01")).unwrap();
        let id = plan.product_id().clone();

        store
            .update(&id, |plan| {
                plan.add_step(10, "Mixing", None, StepParameters::default())
                    .map(|_| ())
            })
            .unwrap();

        let loaded = store.get(&id).unwrap();
        assert_eq!(loaded.steps().len(), 1);
        assert_eq!(loaded.revision(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(
            product_id_from_path(&store.project().plan_path(&id)),
            Some(id)
        );
    }

    #[test]
    fn test_stale_revision_conflicts() {
        let (_tmp, store) = store();
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        let snapshot = store.get(&id).unwrap();

        let mut first = HazardPlan::clone(&snapshot);
        first
            .add_step(10, "Mixing", None, StepParameters::default())
            .unwrap();
        store.save(first, 0).unwrap();

        let mut second = HazardPlan::clone(&snapshot);
        second
            .add_step(20, "Baking", None, StepParameters::default())
            .unwrap();
        let err = store.save(second, 0).unwrap_err();
        assert!(matches!(err, HaccpError::Conflict { expected: 0, found: 1, .. }));
        assert_eq!(store.get(&id).unwrap().steps()[0].name, "Mixing");
    }

    #[test]
    fn test_held_lock_times_out() {
        let (_tmp, store) = store();
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        let _held = store.lock(&id).unwrap();

        let err = store
            .update(&id, |plan| {
                plan.add_step(10, "Mixing", None, StepParameters::default())
                    .map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, HaccpError::Locked(_)));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let (_tmp, store) = store();
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        drop(store.lock(&id).unwrap());
        assert!(store.lock(&id).is_ok());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let (_tmp, store) = store();
        store.create(product("BRD-01")).unwrap();
        assert!(matches!(
            store.create(product("brd-01")),
            Err(HaccpError::Validation(_))
        ));
    }

    #[test]
    fn test_concurrent_creates_keep_codes_unique() {
        let (_tmp, store) = store();
        let store = Arc::new(store.with_lock_wait(Duration::from_secs(5)));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.create(product("BRD-01")).is_ok()
                })
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(created, 1);
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(!store.project().plans_dir().join(CREATE_LOCK).exists());
    }

    #[test]
    fn test_concurrent_writers_never_lose_updates() {
        let (_tmp, store) = store();
        let store = Arc::new(store.with_lock_wait(Duration::from_secs(5)));
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        let writers = 6;
        let barrier = Arc::new(Barrier::new(writers));

        let handles: Vec<_> = (0..writers)
            .map(|n| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    loop {
                        let result = store.update(&id, |plan| {
                            plan.add_step(
                                (n as u32 + 1) * 10,
                                &format!("Step {}", n),
                                None,
                                StepParameters::default(),
                            )
                            .map(|_| ())
                        });
                        match result {
                            Ok(()) => break,
                            Err(e) if e.is_conflict() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let plan = store.get(&id).unwrap();
        assert_eq!(plan.steps().len(), writers);
        assert_eq!(plan.revision() as usize, writers);
    }

    #[test]
    fn test_corrupt_file_reports_yaml_error() {
        let (_tmp, store) = store();
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        fs::write(store.project().plan_path(&id), "product: [oops").unwrap();
        assert!(matches!(store.get(&id), Err(HaccpError::Yaml(_))));
    }

    #[test]
    fn test_unknown_plan_is_not_found() {
        let (_tmp, store) = store();
        let id = EntityId::new(EntityPrefix::Prod);
        assert!(matches!(store.get(&id), Err(HaccpError::NotFound { .. })));
    }

    #[test]
    fn test_delete_removes_file() {
        let (_tmp, store) = store();
        let id = store.create(product("BRD-01")).unwrap().product_id().clone();
        store.delete(&id).unwrap();
        assert!(!store.project().plan_path(&id).exists());
        assert!(store.list().unwrap().is_empty());
    }
}
