//! Plan repositories - where aggregates live between operations
//!
//! Readers get immutable [`Arc`] snapshots and never block writers.
//! Writers go through [`PlanRepository::update`], which applies a change to
//! a private copy and commits it only if nobody else committed in between
//! (compare-and-swap on [`HazardPlan::revision`]).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::core::error::{HaccpError, Result};
use crate::core::identity::EntityId;
use crate::engine::plan::{DashboardSummary, HazardPlan};

/// Storage for HACCP plans, one per product
pub trait PlanRepository {
    /// Store a brand-new plan. Product codes are unique.
    fn create(&self, plan: HazardPlan) -> Result<Arc<HazardPlan>>;

    /// Current snapshot of one plan
    fn get(&self, product_id: &EntityId) -> Result<Arc<HazardPlan>>;

    /// Snapshots of every plan, ordered by product code
    fn list(&self) -> Result<Vec<Arc<HazardPlan>>>;

    /// Replace a plan, failing with `Conflict` unless the stored revision
    /// still equals `expected_revision`
    fn save(&self, plan: HazardPlan, expected_revision: u32) -> Result<Arc<HazardPlan>>;

    /// Remove a plan. Refused while any of its CCPs is still open.
    fn delete(&self, product_id: &EntityId) -> Result<HazardPlan>;

    /// Apply one aggregate operation and commit it atomically
    fn update<T, F>(&self, product_id: &EntityId, change: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(&mut HazardPlan) -> Result<T>,
    {
        let snapshot = self.get(product_id)?;
        let expected = snapshot.revision();
        let mut draft = HazardPlan::clone(&snapshot);
        let out = change(&mut draft)?;
        if draft.revision() != expected {
            self.save(draft, expected)?;
        }
        Ok(out)
    }

    /// Find a plan by product code (case-insensitive)
    fn find_by_code(&self, code: &str) -> Result<Arc<HazardPlan>> {
        self.list()?
            .into_iter()
            .find(|p| p.product().code.eq_ignore_ascii_case(code))
            .ok_or_else(|| HaccpError::NotFound {
                kind: "product",
                id: code.to_string(),
            })
    }

    /// Dashboard counts summed over every product
    fn dashboard_summary(&self, now: DateTime<Utc>, window: Duration) -> Result<DashboardSummary> {
        Ok(self
            .list()?
            .iter()
            .map(|p| p.dashboard_summary(now, window))
            .fold(DashboardSummary::default(), DashboardSummary::merge))
    }
}

/// Thread-safe in-memory repository
#[derive(Debug, Default)]
pub struct PlanRegistry {
    plans: RwLock<HashMap<EntityId, Arc<HazardPlan>>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EntityId, Arc<HazardPlan>>> {
        self.plans.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EntityId, Arc<HazardPlan>>> {
        self.plans.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlanRepository for PlanRegistry {
    fn create(&self, plan: HazardPlan) -> Result<Arc<HazardPlan>> {
        plan.validate()?;
        let mut plans = self.write();
        if plans.contains_key(plan.product_id()) {
            return Err(HaccpError::Validation(format!(
                "plan {} already exists",
                plan.product_id()
            )));
        }
        if let Some(other) = plans
            .values()
            .find(|p| p.product().code.eq_ignore_ascii_case(&plan.product().code))
        {
            return Err(HaccpError::Validation(format!(
                "product code {} is already used by {}",
                plan.product().code,
                other.product_id()
            )));
        }
        let plan = Arc::new(plan);
        plans.insert(plan.product_id().clone(), Arc::clone(&plan));
        Ok(plan)
    }

    fn get(&self, product_id: &EntityId) -> Result<Arc<HazardPlan>> {
        self.read()
            .get(product_id)
            .cloned()
            .ok_or_else(|| HaccpError::not_found(product_id))
    }

    fn list(&self) -> Result<Vec<Arc<HazardPlan>>> {
        let mut plans: Vec<Arc<HazardPlan>> = self.read().values().cloned().collect();
        plans.sort_by(|a, b| a.product().code.cmp(&b.product().code));
        Ok(plans)
    }

    fn save(&self, plan: HazardPlan, expected_revision: u32) -> Result<Arc<HazardPlan>> {
        let mut plans = self.write();
        let current = plans
            .get(plan.product_id())
            .ok_or_else(|| HaccpError::not_found(plan.product_id()))?;
        if current.revision() != expected_revision {
            debug!(
                product = %plan.product_id(),
                expected = expected_revision,
                found = current.revision(),
                "revision conflict"
            );
            return Err(HaccpError::Conflict {
                kind: "plan",
                id: plan.product_id().to_string(),
                expected: expected_revision,
                found: current.revision(),
            });
        }
        let plan = Arc::new(plan);
        plans.insert(plan.product_id().clone(), Arc::clone(&plan));
        Ok(plan)
    }

    fn delete(&self, product_id: &EntityId) -> Result<HazardPlan> {
        let mut plans = self.write();
        let plan = plans
            .get(product_id)
            .ok_or_else(|| HaccpError::not_found(product_id))?;
        plan.ensure_deletable()?;
        let plan = plans
            .remove(product_id)
            .ok_or_else(|| HaccpError::not_found(product_id))?;
        Ok(Arc::try_unwrap(plan).unwrap_or_else(|shared| HazardPlan::clone(&shared)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product::Product;
    use crate::entities::step::StepParameters;
    use std::sync::Barrier;
    use std::thread;

    fn registry_with_plan() -> (PlanRegistry, EntityId) {
        let registry = PlanRegistry::new();
        let plan = HazardPlan::new(Product::new(
            "SAL-02".to_string(),
            "Smoked salmon".to_string(),
            "qa".to_string(),
        ));
        let id = plan.product_id().clone();
        registry.create(plan).unwrap();
        (registry, id)
    }

    #[test]
    fn test_update_commits_and_bumps_revision() {
        let (registry, id) = registry_with_plan();
        registry
            .update(&id, |plan| {
                plan.add_step(10, "Receiving", None, StepParameters::default())
                    .map(|_| ())
            })
            .unwrap();
        let plan = registry.get(&id).unwrap();
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.revision(), 1);
    }

    #[test]
    fn test_failed_update_changes_nothing() {
        let (registry, id) = registry_with_plan();
        let err = registry
            .update(&id, |plan| {
                plan.add_step(10, "  ", None, StepParameters::default())
                    .map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
        assert_eq!(registry.get(&id).unwrap().revision(), 0);
    }

    #[test]
    fn test_stale_save_is_conflict() {
        let (registry, id) = registry_with_plan();
        let snapshot = registry.get(&id).unwrap();

        let mut first = HazardPlan::clone(&snapshot);
        first
            .add_step(10, "Receiving", None, StepParameters::default())
            .unwrap();
        registry.save(first, snapshot.revision()).unwrap();

        let mut second = HazardPlan::clone(&snapshot);
        second
            .add_step(20, "Cooking", None, StepParameters::default())
            .unwrap();
        let err = registry.save(second, snapshot.revision()).unwrap_err();
        assert!(err.is_conflict());

        // the first write survives intact
        let plan = registry.get(&id).unwrap();
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.steps()[0].name, "Receiving");
    }

    #[test]
    fn test_snapshots_are_isolated_from_writes() {
        let (registry, id) = registry_with_plan();
        let before = registry.get(&id).unwrap();
        registry
            .update(&id, |plan| {
                plan.add_step(10, "Receiving", None, StepParameters::default())
                    .map(|_| ())
            })
            .unwrap();
        assert!(before.steps().is_empty());
    }

    #[test]
    fn test_concurrent_writers_never_lose_updates() {
        let (registry, id) = registry_with_plan();
        let registry = Arc::new(registry);
        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));

        let handles: Vec<_> = (0..writers)
            .map(|n| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    loop {
                        let result = registry.update(&id, |plan| {
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

        let plan = registry.get(&id).unwrap();
        assert_eq!(plan.steps().len(), writers);
        assert_eq!(plan.revision() as usize, writers);
    }

    #[test]
    fn test_duplicate_product_code_rejected() {
        let (registry, _) = registry_with_plan();
        let plan = HazardPlan::new(Product::new(
            "sal-02".to_string(),
            "Other".to_string(),
            "qa".to_string(),
        ));
        assert!(matches!(
            registry.create(plan),
            Err(HaccpError::Validation(_))
        ));
        assert!(registry.find_by_code("SAL-02").is_ok());
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let registry = PlanRegistry::new();
        let id = EntityId::new(crate::core::identity::EntityPrefix::Prod);
        assert!(matches!(
            registry.delete(&id),
            Err(HaccpError::NotFound { .. })
        ));
    }
}
