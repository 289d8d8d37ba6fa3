use crate::{
    CacheKey, CachePolicy, Connection, Entity, EntityDescriptor, EngineConfig, Error,
    Pool, Query, QueryCache, Result, RowLabeled, RowsAffected, SqlWriter, TransactionContext,
    Value, bind_parameters, hydrate, hydrate::fits, primary_key, resolve,
};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

/// Connection used by one operation: the open transaction's or a pooled one.
///
/// A pooled connection goes back to the pool when the lease is dropped, the transaction
/// one stays in the engine.
enum Lease<'a, C: Connection> {
    Transaction(MappedMutexGuard<'a, TransactionContext<C>>),
    Pooled(C),
}

impl<C: Connection> Lease<'_, C> {
    fn connection(&mut self) -> &mut C {
        match self {
            Lease::Transaction(transaction) => &mut transaction.connection,
            Lease::Pooled(connection) => connection,
        }
    }

    fn in_transaction(&self) -> bool {
        matches!(self, Lease::Transaction(..))
    }
}

async fn fetch<C: Connection>(
    connection: &mut C,
    operation: &'static str,
    table: &'static str,
    query: &Query,
) -> Result<Vec<RowLabeled>> {
    log::debug!("{}", query);
    connection
        .fetch(query)
        .await
        .map_err(|e| Error::database(operation, table, e))
}

async fn execute<C: Connection>(
    connection: &mut C,
    operation: &'static str,
    table: &'static str,
    query: &Query,
) -> Result<RowsAffected> {
    log::debug!("{}", query);
    connection
        .execute(query)
        .await
        .map_err(|e| Error::database(operation, table, e))
}

async fn batch<C: Connection>(
    connection: &mut C,
    operation: &'static str,
    table: &'static str,
    sql: &str,
) -> Result<()> {
    log::debug!("{}", sql);
    connection
        .batch(sql)
        .await
        .map_err(|e| Error::database(operation, table, e))
}

/// Single boolean produced by an `EXISTS` probe.
async fn probe<C: Connection>(
    connection: &mut C,
    operation: &'static str,
    table: &'static str,
    query: &Query,
) -> Result<bool> {
    let rows = fetch(connection, operation, table, query).await?;
    match rows.first().and_then(|row| row.values().first()) {
        Some(Value::Boolean(Some(v))) => Ok(*v),
        other => Err(Error::database(
            operation,
            table,
            anyhow::Error::msg(format!(
                "Expected a boolean from the existence probe, got {}",
                other.map_or("no value".to_string(), |v| format!("{v:?}"))
            )),
        )),
    }
}

/// Entry point of the application: maps entities onto tables and runs their statements.
///
/// Operations run on a pooled connection, or on the transaction connection while a
/// transaction is open. At most one transaction per engine is open at any time, the
/// operations issued meanwhile are serialized on its connection.
///
/// ```ignore
/// let engine = RecordEngine::new(PostgresPool::connect(url).await?);
/// engine.create_table::<Foo>().await?;
/// let mut foo = Foo { id: 0, foo: "hello".into(), bar: 42 };
/// let id = engine.save(&mut foo).await?;
/// assert_eq!(engine.get::<Foo>(id).await?, Some(foo));
/// ```
pub struct RecordEngine<P: Pool> {
    pool: P,
    config: EngineConfig,
    cache: QueryCache,
    transaction: Mutex<Option<TransactionContext<P::Connection>>>,
}

impl<P: Pool> RecordEngine<P> {
    pub fn new(pool: P) -> Self {
        Self::with_config(pool, EngineConfig::default())
    }

    pub fn with_config(pool: P, config: EngineConfig) -> Self {
        log::debug!(
            "Record engine on {} with cache policy {:?}",
            P::NAME,
            config.cache_policy
        );
        Self {
            pool,
            config,
            cache: QueryCache::new(),
            transaction: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Resolved metadata of `E`.
    pub fn descriptor<E: Entity>(&self) -> Result<Arc<EntityDescriptor>> {
        resolve::<E>()
    }

    pub async fn in_transaction(&self) -> bool {
        self.transaction.lock().await.is_some()
    }

    fn sql(&self, write: impl FnOnce(&P::SqlWriter, &mut String)) -> String {
        let writer = self.pool.sql_writer();
        let mut out = String::with_capacity(128);
        write(&writer, &mut out);
        out
    }

    async fn lease(&self) -> Result<Lease<'_, P::Connection>> {
        let guard = self.transaction.lock().await;
        match MutexGuard::try_map(guard, Option::as_mut) {
            Ok(transaction) => Ok(Lease::Transaction(transaction)),
            Err(guard) => {
                drop(guard);
                let connection = self.pool.acquire().await.map_err(Error::connection)?;
                Ok(Lease::Pooled(connection))
            }
        }
    }

    fn caches_reads(&self, lease: &Lease<'_, P::Connection>) -> bool {
        match self.config.cache_policy {
            CachePolicy::Invalidate => !lease.in_transaction(),
            CachePolicy::Retain => true,
        }
    }

    fn written<E: Entity>(&self) {
        if self.config.cache_policy == CachePolicy::Invalidate {
            self.cache.invalidate_entity::<E>();
        }
    }

    /// Row with primary key `id`, `None` when there is no such row.
    pub async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let descriptor = resolve::<E>()?;
        let key = CacheKey::id::<E>(id);
        if let Some(entity) = self.cache.lookup_object::<E>(&key) {
            log::trace!("Cache hit {}", key);
            return Ok(Some(entity));
        }
        let query = Query::new(self.sql(|w, out| w.write_select_by_id(out, &descriptor))).bind(id);
        let generation = self.cache.generation::<E>();
        let mut lease = self.lease().await?;
        let rows = fetch(lease.connection(), "get", descriptor.table, &query).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let entity = hydrate::<E>(&descriptor, row)?;
        if self.caches_reads(&lease) {
            self.cache.store_object(key, entity.clone(), generation);
        }
        Ok(Some(entity))
    }

    /// Every row of the table, in the order the database returns them.
    pub async fn all<E: Entity>(&self) -> Result<Vec<E>> {
        let descriptor = resolve::<E>()?;
        let key = CacheKey::all::<E>();
        let query = Query::new(self.sql(|w, out| w.write_select_all(out, &descriptor)));
        self.list(&descriptor, key, "all", query).await
    }

    /// Rows whose `column` equals `value`.
    ///
    /// `column` must be one of the mapped columns of `E`, the primary key included, and
    /// `value` a non null integer or text matching its kind.
    pub async fn find_where<E: Entity>(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<E>> {
        let descriptor = resolve::<E>()?;
        let Some(column) = descriptor.column(column) else {
            return Err(Error::schema(
                descriptor.type_name,
                format!("`{}` is not a column of table `{}`", column, descriptor.table),
            ));
        };
        let value = value.into();
        if value.is_null() || !fits(column.kind, &value) {
            return Err(Error::schema(
                descriptor.type_name,
                format!(
                    "cannot compare {:?} column `{}` with {:?}",
                    column.kind, column.name, value
                ),
            ));
        }
        let key = CacheKey::column::<E>(column.name, value.clone());
        let query = Query::new(self.sql(|w, out| w.write_select_where(out, &descriptor, column)))
            .bind(value);
        self.list(&descriptor, key, "find_where", query).await
    }

    async fn list<E: Entity>(
        &self,
        descriptor: &EntityDescriptor,
        key: CacheKey,
        operation: &'static str,
        query: Query,
    ) -> Result<Vec<E>> {
        if let Some(entities) = self.cache.lookup_list::<E>(&key) {
            log::trace!("Cache hit {}", key);
            return Ok(entities);
        }
        let generation = self.cache.generation::<E>();
        let mut lease = self.lease().await?;
        let rows = fetch(lease.connection(), operation, descriptor.table, &query).await?;
        let entities = rows
            .iter()
            .map(|row| hydrate::<E>(descriptor, row))
            .collect::<Result<Vec<E>>>()?;
        if self.caches_reads(&lease) {
            self.cache.store_list(key, entities.clone(), generation);
        }
        Ok(entities)
    }

    /// Insert `entity` as a new row, the primary key is generated by the database and
    /// not written back (see [`RecordEngine::save`]).
    pub async fn insert<E: Entity>(&self, entity: &E) -> Result<RowsAffected> {
        let descriptor = resolve::<E>()?;
        let params = bind_parameters(&descriptor, entity)?;
        let query = Query::new(self.sql(|w, out| w.write_insert(out, &descriptor, false)))
            .with_params(params);
        let mut lease = self.lease().await?;
        let result = execute(lease.connection(), "insert", descriptor.table, &query).await?;
        self.written::<E>();
        Ok(result)
    }

    /// Overwrite the row with primary key `id` using the values of `entity`.
    ///
    /// Rejected for entities without columns besides the primary key.
    pub async fn update<E: Entity>(&self, entity: &E, id: i64) -> Result<RowsAffected> {
        let descriptor = resolve::<E>()?;
        if descriptor.value_columns().next().is_none() {
            return Err(Error::schema(
                descriptor.type_name,
                "there is nothing to update besides the primary key",
            ));
        }
        let params = bind_parameters(&descriptor, entity)?;
        let query = Query::new(self.sql(|w, out| w.write_update(out, &descriptor, false)))
            .with_params(params)
            .bind(id);
        let mut lease = self.lease().await?;
        let result = execute(lease.connection(), "update", descriptor.table, &query).await?;
        self.written::<E>();
        Ok(result)
    }

    pub async fn delete<E: Entity>(&self, id: i64) -> Result<RowsAffected> {
        let descriptor = resolve::<E>()?;
        self.delete_by_id::<E>(&descriptor, "delete", id).await
    }

    /// Delete the row of `entity`, identified by its primary key.
    pub async fn destroy<E: Entity>(&self, entity: &E) -> Result<RowsAffected> {
        let descriptor = resolve::<E>()?;
        let id = primary_key(&descriptor, entity)?;
        self.delete_by_id::<E>(&descriptor, "destroy", id).await
    }

    async fn delete_by_id<E: Entity>(
        &self,
        descriptor: &EntityDescriptor,
        operation: &'static str,
        id: i64,
    ) -> Result<RowsAffected> {
        let query = Query::new(self.sql(|w, out| w.write_delete(out, descriptor))).bind(id);
        let mut lease = self.lease().await?;
        let result = execute(lease.connection(), operation, descriptor.table, &query).await?;
        self.written::<E>();
        Ok(result)
    }

    /// Delete every row, the table stays.
    pub async fn destroy_all<E: Entity>(&self) -> Result<RowsAffected> {
        let descriptor = resolve::<E>()?;
        let query = Query::new(self.sql(|w, out| w.write_delete_all(out, &descriptor)));
        let mut lease = self.lease().await?;
        let result = execute(lease.connection(), "destroy_all", descriptor.table, &query).await?;
        self.written::<E>();
        Ok(result)
    }

    /// Drop the table if it exists and create it again, empty.
    pub async fn create_table<E: Entity>(&self) -> Result<()> {
        let descriptor = resolve::<E>()?;
        let mut lease = self.lease().await?;
        self.create_table_on(lease.connection(), &descriptor).await?;
        self.written::<E>();
        Ok(())
    }

    async fn create_table_on(
        &self,
        connection: &mut P::Connection,
        descriptor: &EntityDescriptor,
    ) -> Result<()> {
        let sql = self.sql(|w, out| w.write_create_table(out, descriptor));
        log::info!("Creating table {}", descriptor.table);
        batch(connection, "create_table", descriptor.table, &sql).await
    }

    pub async fn drop_table<E: Entity>(&self) -> Result<()> {
        let descriptor = resolve::<E>()?;
        let sql = self.sql(|w, out| w.write_drop_table(out, &descriptor));
        let mut lease = self.lease().await?;
        log::info!("Dropping table {}", descriptor.table);
        batch(lease.connection(), "drop_table", descriptor.table, &sql).await?;
        self.written::<E>();
        Ok(())
    }

    pub async fn table_exists<E: Entity>(&self) -> Result<bool> {
        let descriptor = resolve::<E>()?;
        let mut lease = self.lease().await?;
        self.table_exists_on(lease.connection(), &descriptor).await
    }

    async fn table_exists_on(
        &self,
        connection: &mut P::Connection,
        descriptor: &EntityDescriptor,
    ) -> Result<bool> {
        // Unquoted identifiers are stored lowercase in the catalog.
        let query = Query::new(self.sql(|w, out| w.write_table_exists(out)))
            .bind(descriptor.table.to_ascii_lowercase());
        probe(connection, "table_exists", descriptor.table, &query).await
    }

    async fn record_exists_on(
        &self,
        connection: &mut P::Connection,
        descriptor: &EntityDescriptor,
        id: i64,
    ) -> Result<bool> {
        let query =
            Query::new(self.sql(|w, out| w.write_record_exists(out, descriptor))).bind(id);
        probe(connection, "record_exists", descriptor.table, &query).await
    }

    /// Whether a row with the primary key of `entity` exists, `false` if the table does
    /// not exist.
    pub async fn record_exists<E: Entity>(&self, entity: &E) -> Result<bool> {
        let descriptor = resolve::<E>()?;
        let id = primary_key(&descriptor, entity)?;
        let mut lease = self.lease().await?;
        let connection = lease.connection();
        if !self.table_exists_on(connection, &descriptor).await? {
            return Ok(false);
        }
        self.record_exists_on(connection, &descriptor, id).await
    }

    /// Insert or update `entity` and write the stored primary key back into it.
    ///
    /// The table is created when missing. A row with the same primary key is updated,
    /// otherwise a new row is inserted and its generated key assigned to `entity`.
    /// Outside a transaction the existence probe and the write are separate statements.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<i64> {
        let descriptor = resolve::<E>()?;
        let id = primary_key(&descriptor, entity)?;
        let params = bind_parameters(&descriptor, &*entity)?;
        let mut lease = self.lease().await?;
        let connection = lease.connection();
        let exists = if self.table_exists_on(connection, &descriptor).await? {
            self.record_exists_on(connection, &descriptor, id).await?
        } else {
            self.create_table_on(connection, &descriptor).await?;
            false
        };
        if exists && descriptor.value_columns().next().is_none() {
            log::debug!("Nothing to update in {} {}", descriptor.table, id);
            return Ok(id);
        }
        let query = if exists {
            Query::new(self.sql(|w, out| w.write_update(out, &descriptor, true)))
                .with_params(params)
                .bind(id)
        } else {
            Query::new(self.sql(|w, out| w.write_insert(out, &descriptor, true)))
                .with_params(params)
        };
        let rows = fetch(connection, "save", descriptor.table, &query).await?;
        self.written::<E>();
        let pk = descriptor.primary_key.name;
        let Some(value) = rows.first().and_then(|row| row.get_column(pk)).cloned() else {
            return Err(Error::database(
                "save",
                descriptor.table,
                anyhow::Error::msg(format!("No `{}` was returned", pk)),
            ));
        };
        let Some(id) = value.as_i64() else {
            return Err(Error::hydration(
                descriptor.type_name,
                pk,
                format!("the returned key {} is not an integer", value),
            ));
        };
        entity
            .set_column(pk, value)
            .map_err(|e| Error::hydration(descriptor.type_name, pk, e))?;
        Ok(id)
    }

    /// Acquire a connection and start a transaction on it, every following operation
    /// runs on that connection until commit or rollback.
    pub async fn begin_transaction(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        if transaction.is_some() {
            return Err(Error::transaction("a transaction is already open"));
        }
        let mut connection = self.pool.acquire().await.map_err(Error::connection)?;
        let sql = self.sql(|w, out| w.write_transaction_begin(out));
        batch(&mut connection, "begin_transaction", "", &sql).await?;
        log::info!("Transaction started");
        *transaction = Some(TransactionContext::new(connection));
        Ok(())
    }

    pub async fn commit_transaction(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        let Some(mut context) = transaction.take() else {
            return Err(Error::transaction("cannot commit, no transaction is open"));
        };
        let sql = self.sql(|w, out| w.write_transaction_commit(out));
        let result = batch(&mut context.connection, "commit_transaction", "", &sql).await;
        if result.is_err() {
            let sql = self.sql(|w, out| w.write_transaction_rollback(out));
            if let Err(e) = context.connection.batch(&sql).await {
                log::error!("Could not roll back after the failed commit: {:#}", e);
            }
            self.rolled_back();
        } else {
            log::info!("Transaction committed");
        }
        result
    }

    /// Discard the whole transaction.
    pub async fn rollback(&self) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        let Some(mut context) = transaction.take() else {
            return Err(Error::transaction("cannot roll back, no transaction is open"));
        };
        let sql = self.sql(|w, out| w.write_transaction_rollback(out));
        let result = batch(&mut context.connection, "rollback", "", &sql).await;
        self.rolled_back();
        if result.is_ok() {
            log::info!("Transaction rolled back");
        }
        result
    }

    /// Undo the work done after the savepoint `name`, the transaction stays open and the
    /// savepoint stays valid.
    pub async fn rollback_to(&self, name: &str) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        let Some(context) = transaction.as_mut() else {
            return Err(Error::transaction(format!(
                "cannot roll back to savepoint `{name}`, no transaction is open"
            )));
        };
        if !context.has_savepoint(name) {
            return Err(Error::transaction(format!("unknown savepoint `{name}`")));
        }
        let sql = self.sql(|w, out| w.write_rollback_to_savepoint(out, name));
        batch(&mut context.connection, "rollback_to", "", &sql).await?;
        context.rewind_to(name);
        self.rolled_back();
        log::info!("Rolled back to savepoint {}", name);
        Ok(())
    }

    /// Mark a savepoint in the open transaction, does nothing when there is none.
    pub async fn set_savepoint(&self, name: &str) -> Result<()> {
        let mut transaction = self.transaction.lock().await;
        let Some(context) = transaction.as_mut() else {
            log::debug!("No transaction is open, savepoint `{}` ignored", name);
            return Ok(());
        };
        let sql = self.sql(|w, out| w.write_savepoint(out, name));
        batch(&mut context.connection, "set_savepoint", "", &sql).await?;
        context.push_savepoint(name);
        log::debug!("Savepoint {} set", name);
        Ok(())
    }

    fn rolled_back(&self) {
        if self.config.cache_policy == CachePolicy::Invalidate {
            self.cache.clear();
        }
    }
}
