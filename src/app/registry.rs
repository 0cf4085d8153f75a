//! Delegate registry and request-scoped views.
//!
//! Connection handles are exposed to application code under dotted delegate
//! paths (`model`, `audit.model`). The registry is an explicit map owned by
//! the application context; per-request access goes through an overlay that
//! copies a view of the shared handle on first access, so request-local
//! model overrides never leak across requests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::db::DatabaseHandle;
use crate::error::OrmbootError;
use crate::model::ModelDef;

/// Application-wide registry of connection handles keyed by delegate path.
#[derive(Default)]
pub struct DelegateRegistry {
    entries: BTreeMap<String, Arc<DatabaseHandle>>,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handle under its delegate path.
    ///
    /// Fails when the path is already bound, or when it overlaps an
    /// existing binding in either direction (`a.b` vs `a.b.db`) — the
    /// shorter path would have to be both a namespace and a handle.
    pub fn bind(&mut self, handle: Arc<DatabaseHandle>) -> Result<(), OrmbootError> {
        let path = handle.delegate().to_string();
        if self.entries.contains_key(&path) {
            return Err(OrmbootError::DuplicateDelegate(path));
        }
        for existing in self.entries.keys() {
            if is_dotted_prefix(existing, &path) || is_dotted_prefix(&path, existing) {
                return Err(OrmbootError::DelegateConflict(path, existing.clone()));
            }
        }
        self.entries.insert(path, handle);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Arc<DatabaseHandle>> {
        self.entries.get(path)
    }

    /// All bound handles, in delegate-path order.
    pub fn handles(&self) -> Vec<Arc<DatabaseHandle>> {
        self.entries.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<DatabaseHandle>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_dotted_prefix(shorter: &str, longer: &str) -> bool {
    longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer.as_bytes()[shorter.len()] == b'.'
}

/// Request-local view of one handle: shares the connection, shadows model
/// definitions with request-local overrides.
pub struct RequestView {
    handle: Arc<DatabaseHandle>,
    overrides: Mutex<HashMap<String, ModelDef>>,
}

impl RequestView {
    fn new(handle: Arc<DatabaseHandle>) -> Self {
        Self {
            handle,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn handle(&self) -> &Arc<DatabaseHandle> {
        &self.handle
    }

    /// Look up a model, request-local overrides first.
    pub fn model(&self, name: &str) -> Option<ModelDef> {
        if let Some(m) = self
            .overrides
            .lock()
            .expect("request overrides poisoned")
            .get(name)
        {
            return Some(m.clone());
        }
        self.handle
            .database()
            .models()
            .into_iter()
            .find(|m| m.name == name)
    }

    /// Shadow a model definition for the rest of this request.
    pub fn override_model(&self, model: ModelDef) {
        self.overrides
            .lock()
            .expect("request overrides poisoned")
            .insert(model.name.clone(), model);
    }
}

/// Per-request overlay over the registry. Views are created lazily on first
/// access per delegate path and cached for the scope's lifetime.
pub struct RequestScope<'a> {
    registry: &'a DelegateRegistry,
    views: Mutex<HashMap<String, Arc<RequestView>>>,
}

impl<'a> RequestScope<'a> {
    pub fn new(registry: &'a DelegateRegistry) -> Self {
        Self {
            registry,
            views: Mutex::new(HashMap::new()),
        }
    }

    /// The request-scoped view for `path`, created on first access.
    pub fn delegate(&self, path: &str) -> Option<Arc<RequestView>> {
        let mut views = self.views.lock().expect("request views poisoned");
        if let Some(view) = views.get(path) {
            return Some(view.clone());
        }
        let handle = self.registry.get(path)?.clone();
        let view = Arc::new(RequestView::new(handle));
        views.insert(path.to_string(), view.clone());
        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db::Database;
    use async_trait::async_trait;
    use std::sync::RwLock;

    struct NullDatabase {
        models: RwLock<Vec<ModelDef>>,
    }

    impl NullDatabase {
        fn new() -> Self {
            Self {
                models: RwLock::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Database for NullDatabase {
        async fn ping(&self) -> Result<(), OrmbootError> {
            Ok(())
        }

        fn register_models(&self, models: Vec<ModelDef>) {
            self.models.write().unwrap().extend(models);
        }

        fn models(&self) -> Vec<ModelDef> {
            self.models.read().unwrap().clone()
        }
    }

    fn handle(delegate: &str) -> Arc<DatabaseHandle> {
        let mut settings = Settings::default();
        settings.delegate = delegate.to_string();
        let cfg = settings.resolve().remove(0);
        Arc::new(DatabaseHandle::new(cfg, Arc::new(NullDatabase::new())))
    }

    fn model(name: &str, table: &str) -> ModelDef {
        ModelDef {
            name: name.to_string(),
            path: "user.sql".into(),
            source: "CREATE TABLE t ();".to_string(),
            table_name: table.to_string(),
            connection: None,
        }
    }

    #[test]
    fn duplicate_delegate_is_fatal() {
        let mut registry = DelegateRegistry::new();
        registry.bind(handle("model")).expect("first bind");
        let err = registry.bind(handle("model")).expect_err("second bind");
        assert!(matches!(err, OrmbootError::DuplicateDelegate(p) if p == "model"));
    }

    #[test]
    fn dotted_prefix_overlap_is_rejected_both_ways() {
        let mut registry = DelegateRegistry::new();
        registry.bind(handle("a.b")).expect("bind a.b");
        assert!(matches!(
            registry.bind(handle("a.b.db")),
            Err(OrmbootError::DelegateConflict(..))
        ));

        let mut registry = DelegateRegistry::new();
        registry.bind(handle("a.b.db")).expect("bind a.b.db");
        assert!(matches!(
            registry.bind(handle("a.b")),
            Err(OrmbootError::DelegateConflict(..))
        ));
    }

    #[test]
    fn sibling_paths_coexist() {
        let mut registry = DelegateRegistry::new();
        registry.bind(handle("admin.model")).expect("bind");
        registry.bind(handle("admin.backup")).expect("bind sibling");
        assert_eq!(registry.len(), 2);
        assert!(registry.get("admin.model").is_some());
    }

    #[test]
    fn request_views_are_lazy_and_cached() {
        let mut registry = DelegateRegistry::new();
        registry.bind(handle("model")).expect("bind");

        let scope = RequestScope::new(&registry);
        assert!(scope.delegate("missing").is_none());
        let first = scope.delegate("model").expect("view");
        let second = scope.delegate("model").expect("view");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn request_overrides_do_not_leak_across_scopes() {
        let mut registry = DelegateRegistry::new();
        let h = handle("model");
        h.database().register_models(vec![model("User", "users")]);
        registry.bind(h).expect("bind");

        let scope_a = RequestScope::new(&registry);
        let scope_b = RequestScope::new(&registry);

        let view_a = scope_a.delegate("model").expect("view");
        view_a.override_model(model("User", "users_shadow"));

        assert_eq!(view_a.model("User").unwrap().table_name, "users_shadow");
        let view_b = scope_b.delegate("model").expect("view");
        assert_eq!(view_b.model("User").unwrap().table_name, "users");
        // the shared registration is untouched
        let shared = registry.get("model").unwrap().database().models();
        assert_eq!(shared[0].table_name, "users");
    }
}
