use crate::{Entity, Value};
use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt::{self, Display},
    str::FromStr,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// What the engine does with cached reads when it writes.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Writes purge the entries of the written type, reads inside a transaction are not
    /// cached and a rollback clears the whole cache.
    #[default]
    Invalidate,
    /// Entries live until [`QueryCache::clear`], writes never purge them. Later reads
    /// can return stale objects.
    Retain,
}

impl FromStr for CachePolicy {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalidate" => Ok(CachePolicy::Invalidate),
            "retain" => Ok(CachePolicy::Retain),
            _ => Err(anyhow::Error::msg(format!(
                "Unknown cache policy `{s}`, expected `invalidate` or `retain`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Id(i64),
    Column { column: &'static str, value: Value },
    All,
}

/// Identity of a cached read: the entity type plus what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity: TypeId,
    type_name: &'static str,
    pub scope: CacheScope,
}

impl CacheKey {
    pub fn new<E: Entity>(scope: CacheScope) -> Self {
        Self {
            entity: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            scope,
        }
    }
    pub fn id<E: Entity>(id: i64) -> Self {
        Self::new::<E>(CacheScope::Id(id))
    }
    pub fn column<E: Entity>(column: &'static str, value: Value) -> Self {
        Self::new::<E>(CacheScope::Column { column, value })
    }
    pub fn all<E: Entity>() -> Self {
        Self::new::<E>(CacheScope::All)
    }
    pub fn entity(&self) -> TypeId {
        self.entity
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            CacheScope::Id(id) => write!(f, "{},{}", self.type_name, id),
            CacheScope::Column { column, value } => {
                write!(f, "{},{},{}", self.type_name, column, value)
            }
            CacheScope::All => write!(f, "{},*", self.type_name),
        }
    }
}

type Slot = Arc<dyn Any + Send + Sync>;

/// Point in the invalidation history of one entity type.
///
/// Taken before a read is fetched, a store made with an outdated generation is dropped:
/// the rows it holds may predate a write that was invalidated meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    cleared: u64,
    entity: u64,
}

/// Read cache of hydrated objects and object lists.
///
/// No eviction, entries are only removed by [`QueryCache::invalidate_entity`] and
/// [`QueryCache::clear`]. Lookups return clones.
#[derive(Default)]
pub struct QueryCache {
    objects: RwLock<HashMap<CacheKey, Slot>>,
    lists: RwLock<HashMap<CacheKey, Slot>>,
    generations: RwLock<HashMap<TypeId, u64>>,
    cleared: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation<E: Entity>(&self) -> Generation {
        self.generation_of(TypeId::of::<E>())
    }

    fn generation_of(&self, entity: TypeId) -> Generation {
        Generation {
            cleared: self.cleared.load(Ordering::Acquire),
            entity: self
                .generations
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&entity)
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Inserts unless `generation` is outdated, checked while holding the map lock so
    /// that an invalidation either sees the entry or the store sees the invalidation.
    fn store(
        &self,
        map: &RwLock<HashMap<CacheKey, Slot>>,
        key: CacheKey,
        slot: Slot,
        generation: Generation,
    ) -> bool {
        let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation_of(key.entity) != generation {
            log::trace!("Not caching {}, it was invalidated while reading", key);
            return false;
        }
        map.insert(key, slot);
        true
    }

    pub fn lookup_object<E: Entity>(&self, key: &CacheKey) -> Option<E> {
        let slot = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        let result = slot.downcast_ref::<E>().cloned();
        if result.is_none() {
            log::warn!("Cache entry {} does not hold a {}", key, type_name::<E>());
        }
        result
    }

    /// Cache `entity`, returns `false` when `generation` is outdated and nothing was stored.
    pub fn store_object<E: Entity>(
        &self,
        key: CacheKey,
        entity: E,
        generation: Generation,
    ) -> bool {
        log::trace!("Caching object {}", key);
        self.store(&self.objects, key, Arc::new(entity), generation)
    }

    pub fn lookup_list<E: Entity>(&self, key: &CacheKey) -> Option<Vec<E>> {
        let slot = self
            .lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        let result = slot.downcast_ref::<Vec<E>>().cloned();
        if result.is_none() {
            log::warn!("Cache entry {} does not hold a list of {}", key, type_name::<E>());
        }
        result
    }

    pub fn store_list<E: Entity>(
        &self,
        key: CacheKey,
        entities: Vec<E>,
        generation: Generation,
    ) -> bool {
        log::trace!("Caching list {} ({} objects)", key, entities.len());
        self.store(&self.lists, key, Arc::new(entities), generation)
    }

    /// Drop every entry of `E`, reads of `E` still in flight will not be cached.
    pub fn invalidate_entity<E: Entity>(&self) {
        let entity = TypeId::of::<E>();
        // Bumped before purging.
        *self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity)
            .or_default() += 1;
        let mut removed = 0;
        for map in [&self.objects, &self.lists] {
            let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
            let before = map.len();
            map.retain(|k, _| k.entity != entity);
            removed += before - map.len();
        }
        if removed > 0 {
            log::debug!("Invalidated {} cache entries of {}", removed, type_name::<E>());
        }
    }

    pub fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::AcqRel);
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.lists
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of entries, objects and lists together.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self
                .lists
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}
