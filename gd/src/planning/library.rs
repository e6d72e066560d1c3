//! Pattern library
//!
//! A persisted collection of previously successful Plans, indexed by
//! structural signature. Injected behind a trait so in-memory and
//! file-backed stores are interchangeable without touching the
//! orchestrator.

use std::collections::HashMap;
use std::sync::RwLock;

use eyre::Result;
use tracing::{debug, info};

use planstore::Store;

use crate::domain::Plan;

/// Collection name in the backing store
const PATTERNS: &str = "patterns";

/// Storage abstraction for reusable plan patterns
pub trait PatternLibrary: Send + Sync {
    /// Exact-key lookup by signature (or fallback id)
    fn lookup(&self, signature: &str) -> Option<Plan>;

    /// All stored patterns
    fn all(&self) -> Vec<Plan>;

    /// Persist a plan as a pattern under its signature
    fn save(&self, plan: &Plan) -> Result<()>;

    /// Number of stored patterns
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pattern library backed by a planstore collection
///
/// Loads the full library at startup (skipping corrupt records) and keeps
/// an in-memory map for lookups; saves write through to disk.
pub struct FilePatternLibrary {
    store: Store,
    cache: RwLock<HashMap<String, Plan>>,
}

impl FilePatternLibrary {
    /// Open the library, rebuilding the in-memory index from disk
    pub fn open(store: Store) -> Result<Self> {
        let patterns: Vec<Plan> = store.list_in(PATTERNS)?;

        let mut cache = HashMap::new();
        for plan in patterns {
            let key = pattern_key(&plan);
            cache.insert(key, plan);
        }

        if !cache.is_empty() {
            info!(count = cache.len(), "Loaded pattern library");
        }

        Ok(Self {
            store,
            cache: RwLock::new(cache),
        })
    }
}

/// Patterns are keyed by signature, falling back to the plan id
fn pattern_key(plan: &Plan) -> String {
    plan.pattern_signature.clone().unwrap_or_else(|| plan.id.clone())
}

impl PatternLibrary for FilePatternLibrary {
    fn lookup(&self, signature: &str) -> Option<Plan> {
        self.cache
            .read()
            .expect("pattern cache lock poisoned")
            .get(signature)
            .cloned()
    }

    fn all(&self) -> Vec<Plan> {
        self.cache
            .read()
            .expect("pattern cache lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn save(&self, plan: &Plan) -> Result<()> {
        let key = pattern_key(plan);
        self.store.put_in(PATTERNS, &key, plan)?;
        self.cache
            .write()
            .expect("pattern cache lock poisoned")
            .insert(key.clone(), plan.clone());
        debug!(%key, "Pattern saved");
        Ok(())
    }

    fn len(&self) -> usize {
        self.cache.read().expect("pattern cache lock poisoned").len()
    }
}
