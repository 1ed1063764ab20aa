/*!
 * Object Manager
 *
 * Explicit registry of object types. A manager is created once, types are
 * registered during initialization, and every object type it hands out
 * outlives the objects created from it.
 */

use super::deferred::DeferredDeleter;
use super::object_type::{DeleteProcedure, ObjectType, TypeDescriptor};
use super::types::{DeleteFlags, ObjectTypeInfo};
use crate::collections::{Hashtable, SlotList};
use crate::core::config::{PoolParameters, RuntimeConfig};
use crate::core::errors::{RuntimeError, RuntimeResult};
use crate::core::hash::hash_bytes_murmur;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info};

struct TypeEntry {
    name: String,
    // None only in lookup probes
    descriptor: Option<Arc<dyn TypeDescriptor>>,
}

impl TypeEntry {
    fn probe(name: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: None,
        }
    }
}

fn type_entry_equal(a: &TypeEntry, b: &TypeEntry) -> bool {
    a.name == b.name
}

fn type_entry_hash(entry: &TypeEntry) -> u32 {
    hash_bytes_murmur(entry.name.as_bytes())
}

/// Registry of object types
pub struct ObjectManager {
    config: RuntimeConfig,
    types: RwLock<Hashtable<TypeEntry>>,
    deferred: Option<DeferredDeleter>,
}

impl ObjectManager {
    /// Manager with the default configuration
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let deferred = if config.deferred_delete {
            Some(DeferredDeleter::spawn()?)
        } else {
            None
        };

        info!(
            default_pool = ?config.default_pool.map(|p| p.max_count),
            deferred_delete = config.deferred_delete,
            "object manager initialized"
        );

        Ok(Self {
            types: RwLock::new(Hashtable::new(
                type_entry_equal as fn(&TypeEntry, &TypeEntry) -> bool,
                type_entry_hash as fn(&TypeEntry) -> u32,
                16,
            )),
            config,
            deferred,
        })
    }

    /// Build a manager and run `register` against it
    ///
    /// If any registration fails the manager is discarded and the error is
    /// returned, so no partially initialized registry is ever observable.
    ///
    /// # Example
    ///
    /// ```
    /// use refcore::core::RuntimeConfig;
    /// use refcore::object::ObjectManager;
    ///
    /// let (manager, process_type) = ObjectManager::initialize(RuntimeConfig::default(), |m| {
    ///     m.object_type::<u32>("Process").default_pool().register()
    /// })
    /// .unwrap();
    ///
    /// let process = process_type.create_object(4);
    /// assert_eq!(*process, 4);
    /// assert_eq!(manager.type_count(), 1);
    /// ```
    pub fn initialize<R>(
        config: RuntimeConfig,
        register: impl FnOnce(&Self) -> RuntimeResult<R>,
    ) -> RuntimeResult<(Self, R)> {
        let manager = Self::with_config(config)?;
        match register(&manager) {
            Ok(registered) => Ok((manager, registered)),
            Err(e) => {
                error!(error = %e, "object type registration failed, aborting initialization");
                Err(e)
            }
        }
    }

    /// Register a type; names must be unique
    pub fn create_object_type<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        delete_procedure: Option<DeleteProcedure<T>>,
        pool: Option<PoolParameters>,
    ) -> RuntimeResult<Arc<ObjectType<T>>> {
        let name = name.into();
        let mut types = self.types.write();

        if types.contains(&TypeEntry::probe(&name)) {
            return Err(RuntimeError::DuplicateType(name));
        }

        let object_type = Arc::new(ObjectType::new(
            name.clone(),
            delete_procedure,
            pool,
            self.deferred.as_ref().map(DeferredDeleter::queue),
        )?);

        debug!(
            object_type = %name,
            object_size = std::mem::size_of::<T>(),
            pool = ?pool.map(|p| p.max_count),
            "object type registered"
        );

        let descriptor: Arc<dyn TypeDescriptor> = object_type.clone();
        types.add_duplicate(TypeEntry {
            name,
            descriptor: Some(descriptor),
        });

        Ok(object_type)
    }

    /// Start a builder for a new type
    pub fn object_type<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
    ) -> ObjectTypeBuilder<'_, T> {
        ObjectTypeBuilder::new(self, name.into())
    }

    pub fn type_info(&self, name: &str) -> Option<ObjectTypeInfo> {
        self.types
            .read()
            .find(&TypeEntry::probe(name))
            .and_then(|entry| entry.descriptor.as_ref())
            .map(|descriptor| descriptor.info())
    }

    /// Snapshot of every registered type
    pub fn types(&self) -> Vec<ObjectTypeInfo> {
        let types = self.types.read();
        let mut infos: Vec<_> = types
            .iter()
            .filter_map(|entry| entry.descriptor.as_ref())
            .map(|descriptor| descriptor.info())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }

    /// Block until every deletion deferred so far has run
    pub fn flush_deferred(&self) -> RuntimeResult<()> {
        match &self.deferred {
            Some(deferred) => deferred.flush(),
            None => Ok(()),
        }
    }

    /// Deferred deletions submitted but not yet started
    pub fn pending_deletes(&self) -> usize {
        self.deferred
            .as_ref()
            .map(|deferred| deferred.queue().pending())
            .unwrap_or(0)
    }

    /// Slot list sized from the configuration
    pub fn create_slot_list<T>(&self) -> SlotList<T> {
        SlotList::new(self.config.slot_list_capacity)
    }

    /// Hashtable sized from the configuration
    pub fn create_hashtable<T, E, H>(&self, equal: E, hash: H) -> Hashtable<T, E, H>
    where
        E: Fn(&T, &T) -> bool,
        H: Fn(&T) -> u32,
    {
        Hashtable::new(equal, hash, self.config.hashtable_capacity)
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl std::fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectManager")
            .field("types", &self.type_count())
            .field("deferred_delete", &self.deferred.is_some())
            .finish()
    }
}

/// Builder for object type registration
pub struct ObjectTypeBuilder<'a, T> {
    manager: &'a ObjectManager,
    name: String,
    delete_procedure: Option<DeleteProcedure<T>>,
    pool: Option<PoolParameters>,
}

impl<'a, T: Send + Sync + 'static> ObjectTypeBuilder<'a, T> {
    fn new(manager: &'a ObjectManager, name: String) -> Self {
        Self {
            manager,
            name,
            delete_procedure: None,
            pool: None,
        }
    }

    /// Run `procedure` on each object before its payload is dropped
    pub fn with_delete_procedure(
        mut self,
        procedure: impl Fn(&mut T, DeleteFlags) + Send + Sync + 'static,
    ) -> Self {
        self.delete_procedure = Some(Box::new(procedure));
        self
    }

    /// Draw objects from a free list keeping at most `max_count` blocks
    pub fn with_pool(mut self, max_count: usize) -> Self {
        self.pool = Some(PoolParameters::new(max_count));
        self
    }

    /// Use the manager's configured default pool, if any
    pub fn default_pool(mut self) -> Self {
        self.pool = self.manager.config.default_pool;
        self
    }

    pub fn register(self) -> RuntimeResult<Arc<ObjectType<T>>> {
        self.manager
            .create_object_type(self.name, self.delete_procedure, self.pool)
    }
}
