mod mock;

#[cfg(test)]
mod tests {
    use crate::mock::{MockPool, Reply};
    use std::sync::Arc;
    use tiller::{CachePolicy, EngineConfig, Entity, RecordEngine, Value};
    use tokio::sync::Notify;

    #[derive(Entity, Default, Clone, Debug, PartialEq)]
    #[tiller(table = "foo")]
    struct Foo {
        #[tiller(primary_key)]
        id: i32,
        foo: String,
        bar: i32,
    }

    #[derive(Entity, Default, Clone, Debug, PartialEq)]
    #[tiller(table = "key_only")]
    struct KeyOnly {
        #[tiller(primary_key)]
        id: i64,
    }

    fn foo_row(id: i32, foo: &str, bar: i32) -> Reply {
        Reply::row(
            &["id", "foo", "bar"],
            vec![
                Value::Int32(Some(id)),
                Value::Varchar(Some(foo.into())),
                Value::Int32(Some(bar)),
            ],
        )
    }

    fn engine(pool: &MockPool, policy: CachePolicy) -> RecordEngine<MockPool> {
        RecordEngine::with_config(
            pool.clone(),
            EngineConfig::default().with_cache_policy(policy),
        )
    }

    #[tokio::test]
    async fn get_hydrates_and_caches() {
        let pool = MockPool::new();
        pool.reply(foo_row(1, "a", 2));
        let engine = engine(&pool, CachePolicy::Invalidate);
        let expected = Foo {
            id: 1,
            foo: "a".into(),
            bar: 2,
        };
        assert_eq!(
            engine.get::<Foo>(1).await.expect("Failed to get Foo"),
            Some(expected.clone())
        );
        assert_eq!(
            engine.get::<Foo>(1).await.expect("Failed to get Foo"),
            Some(expected)
        );
        let state = pool.state();
        assert_eq!(state.sql(), ["SELECT * FROM foo WHERE id = ?"]);
        assert_eq!(state.statements[0].params, [Value::Int64(Some(1))]);
        assert_eq!(state.acquired, 1);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn missing_rows_are_not_cached() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        assert_eq!(engine.get::<Foo>(5).await.expect("Failed to get Foo"), None);
        assert_eq!(engine.get::<Foo>(5).await.expect("Failed to get Foo"), None);
        assert_eq!(pool.state().statements.len(), 2);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn failures_release_the_connection() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);

        pool.reply(Reply::row(
            &["id", "foo", "bar"],
            vec![
                Value::Int32(Some(1)),
                Value::Varchar(Some("a".into())),
                Value::Varchar(Some("not a number".into())),
            ],
        ));
        let error = engine
            .get::<Foo>(1)
            .await
            .expect_err("A text value cannot hydrate an integer field");
        assert!(error.is_hydration());
        assert_eq!(pool.state().in_use(), 0);

        pool.reply(Reply::row(&["id", "foo"], vec![
            Value::Int32(Some(1)),
            Value::Varchar(Some("a".into())),
        ]));
        let error = engine
            .all::<Foo>()
            .await
            .expect_err("Every column must be in the row");
        assert!(error.is_hydration());
        assert_eq!(pool.state().in_use(), 0);

        pool.reply(Reply::Fail("relation \"foo\" does not exist"));
        let error = engine
            .all::<Foo>()
            .await
            .expect_err("The driver failure must be reported");
        assert!(error.is_database_operation());
        assert_eq!(
            error.to_string(),
            "Database operation `all` on table `foo` failed"
        );
        assert_eq!(pool.state().in_use(), 0);
        assert_eq!(pool.state().acquired, 3);
        assert!(engine.cache().is_empty());

        pool.state().refuse_connections = true;
        let error = engine
            .get::<Foo>(1)
            .await
            .expect_err("The pool refuses connections");
        assert!(error.is_connection());
    }

    #[tokio::test]
    async fn parameters_follow_declaration_order() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        let foo = Foo {
            id: 7,
            foo: "x".into(),
            bar: 3,
        };
        pool.reply(Reply::Affected(1));
        let result = engine.insert(&foo).await.expect("Failed to insert Foo");
        assert_eq!(result.rows_affected, 1);
        engine.update(&foo, 7).await.expect("Failed to update Foo");
        engine.delete::<Foo>(7).await.expect("Failed to delete Foo");
        engine.destroy(&foo).await.expect("Failed to destroy Foo");
        engine
            .destroy_all::<Foo>()
            .await
            .expect("Failed to destroy all Foo");
        engine
            .find_where::<Foo>("foo", "x")
            .await
            .expect("Failed to filter Foo");

        let state = pool.state();
        assert_eq!(
            state.sql(),
            [
                "INSERT INTO foo (foo, bar) VALUES (?, ?)",
                "UPDATE foo SET foo = ?, bar = ? WHERE id = ?",
                "DELETE FROM foo WHERE id = ?",
                "DELETE FROM foo WHERE id = ?",
                "DELETE FROM foo",
                "SELECT * FROM foo WHERE foo = ?",
            ]
        );
        let x = Value::Varchar(Some("x".into()));
        assert_eq!(state.statements[0].params, [x.clone(), Value::Int32(Some(3))]);
        assert_eq!(
            state.statements[1].params,
            [x.clone(), Value::Int32(Some(3)), Value::Int64(Some(7))]
        );
        assert_eq!(state.statements[2].params, [Value::Int64(Some(7))]);
        assert_eq!(state.statements[3].params, [Value::Int64(Some(7))]);
        assert!(state.statements[4].params.is_empty());
        assert_eq!(state.statements[5].params, [x]);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected_before_io() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        let error = engine
            .find_where::<Foo>("baz", 1)
            .await
            .expect_err("baz is not a column");
        assert!(error.is_schema_metadata());
        assert_eq!(pool.state().acquired, 0);
    }

    #[tokio::test]
    async fn save_inserts_new_rows() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(Reply::exists(true))
            .reply(Reply::exists(false))
            .reply(Reply::row(&["id"], vec![Value::Int32(Some(12))]));
        let mut foo = Foo {
            id: 0,
            foo: "new".into(),
            bar: 1,
        };
        assert_eq!(engine.save(&mut foo).await.expect("Failed to save Foo"), 12);
        assert_eq!(foo.id, 12);

        let state = pool.state();
        assert_eq!(
            state.sql(),
            [
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = ?)",
                "SELECT EXISTS (SELECT FROM foo WHERE id = ?)",
                "INSERT INTO foo (foo, bar) VALUES (?, ?) RETURNING id",
            ]
        );
        assert_eq!(
            state.statements[0].params,
            [Value::Varchar(Some("foo".into()))]
        );
        assert_eq!(state.statements[1].params, [Value::Int64(Some(0))]);
        assert_eq!(
            state.statements[2].params,
            [Value::Varchar(Some("new".into())), Value::Int32(Some(1))]
        );
        // The probes and the write share one connection
        assert_eq!(state.acquired, 1);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn save_updates_existing_rows() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(Reply::exists(true))
            .reply(Reply::exists(true))
            .reply(Reply::row(&["id"], vec![Value::Int32(Some(5))]));
        let mut foo = Foo {
            id: 5,
            foo: "old".into(),
            bar: 9,
        };
        assert_eq!(engine.save(&mut foo).await.expect("Failed to save Foo"), 5);
        let state = pool.state();
        assert_eq!(
            state.sql()[2],
            "UPDATE foo SET foo = ?, bar = ? WHERE id = ? RETURNING id"
        );
        assert_eq!(
            state.statements[2].params,
            [
                Value::Varchar(Some("old".into())),
                Value::Int32(Some(9)),
                Value::Int64(Some(5)),
            ]
        );
    }

    #[tokio::test]
    async fn save_creates_missing_table() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(Reply::exists(false))
            .reply(Reply::Done)
            .reply(Reply::row(&["id"], vec![Value::Int32(Some(1))]));
        let mut foo = Foo::default();
        assert_eq!(engine.save(&mut foo).await.expect("Failed to save Foo"), 1);
        let state = pool.state();
        assert_eq!(
            state.sql(),
            [
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = ?)",
                "DROP TABLE IF EXISTS foo CASCADE; CREATE TABLE foo \
                 (id serial primary key, foo varchar(30) not null, bar integer not null)",
                "INSERT INTO foo (foo, bar) VALUES (?, ?) RETURNING id",
            ]
        );
    }

    #[tokio::test]
    async fn record_exists_on_missing_table() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(Reply::exists(false));
        assert!(
            !engine
                .record_exists(&Foo::default())
                .await
                .expect("Could not check the record")
        );
        assert_eq!(pool.state().statements.len(), 1);

        pool.reply(Reply::exists(true)).reply(Reply::exists(true));
        assert!(
            engine
                .record_exists(&Foo::default())
                .await
                .expect("Could not check the record")
        );

        pool.reply(Reply::Rows(Vec::new()));
        let error = engine
            .table_exists::<Foo>()
            .await
            .expect_err("A probe without result is a failure");
        assert!(error.is_database_operation());
    }

    #[tokio::test]
    async fn invalidate_policy() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(foo_row(1, "a", 2)).reply(foo_row(1, "a", 2));
        engine.get::<Foo>(1).await.expect("Failed to get Foo");
        engine.all::<Foo>().await.expect("Failed to read all Foo");
        assert_eq!(engine.cache().len(), 2);

        pool.reply(Reply::Affected(1));
        engine
            .update(
                &Foo {
                    id: 1,
                    foo: "b".into(),
                    bar: 2,
                },
                1,
            )
            .await
            .expect("Failed to update Foo");
        assert!(engine.cache().is_empty());

        pool.reply(foo_row(1, "b", 2));
        assert_eq!(
            engine
                .get::<Foo>(1)
                .await
                .expect("Failed to get Foo")
                .map(|v| v.foo),
            Some("b".into())
        );
        assert_eq!(pool.state().statements.len(), 4);
    }

    #[tokio::test]
    async fn retain_policy() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Retain);
        pool.reply(foo_row(1, "a", 2));
        engine.get::<Foo>(1).await.expect("Failed to get Foo");

        pool.reply(Reply::Affected(1));
        engine
            .update(
                &Foo {
                    id: 1,
                    foo: "b".into(),
                    bar: 2,
                },
                1,
            )
            .await
            .expect("Failed to update Foo");
        assert_eq!(engine.cache().len(), 1);
        assert_eq!(
            engine
                .get::<Foo>(1)
                .await
                .expect("Failed to get Foo")
                .map(|v| v.foo),
            Some("a".into())
        );
        assert_eq!(pool.state().statements.len(), 2);
    }

    #[tokio::test]
    async fn transaction_state_machine() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);

        engine
            .set_savepoint("ignored")
            .await
            .expect("A savepoint outside a transaction is ignored");
        assert!(pool.state().statements.is_empty());
        assert!(engine.commit_transaction().await.unwrap_err().is_transaction());
        assert!(engine.rollback().await.unwrap_err().is_transaction());
        assert!(engine.rollback_to("s").await.unwrap_err().is_transaction());

        engine
            .begin_transaction()
            .await
            .expect("Could not begin a transaction");
        assert!(engine.in_transaction().await);
        assert_eq!(pool.state().in_use(), 1);
        assert!(engine.begin_transaction().await.unwrap_err().is_transaction());

        pool.reply(foo_row(1, "a", 2));
        engine.get::<Foo>(1).await.expect("Failed to get Foo");
        // Reads inside a transaction are not cached
        assert!(engine.cache().is_empty());
        engine
            .set_savepoint("s")
            .await
            .expect("Could not set the savepoint");
        assert!(
            engine
                .rollback_to("unknown")
                .await
                .unwrap_err()
                .is_transaction()
        );
        engine
            .rollback_to("s")
            .await
            .expect("Could not roll back to the savepoint");
        engine
            .rollback_to("s")
            .await
            .expect("The savepoint stays valid");
        engine.commit_transaction().await.expect("Could not commit");
        assert!(!engine.in_transaction().await);

        let state = pool.state();
        assert_eq!(
            state.sql(),
            [
                "BEGIN",
                "SELECT * FROM foo WHERE id = ?",
                "SAVEPOINT \"s\"",
                "ROLLBACK TO SAVEPOINT \"s\"",
                "ROLLBACK TO SAVEPOINT \"s\"",
                "COMMIT",
            ]
        );
        // Every statement ran on the transaction connection
        assert_eq!(state.acquired, 1);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        engine
            .begin_transaction()
            .await
            .expect("Could not begin a transaction");
        pool.reply(Reply::Fail("could not serialize access"));
        let error = engine
            .commit_transaction()
            .await
            .expect_err("The commit fails");
        assert!(error.is_database_operation());
        assert_eq!(
            error.to_string(),
            "Database operation `commit_transaction` failed"
        );
        assert!(!engine.in_transaction().await);
        let state = pool.state();
        assert_eq!(state.sql(), ["BEGIN", "COMMIT", "ROLLBACK"]);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn rollback_clears_the_cache() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(foo_row(1, "a", 2));
        engine.get::<Foo>(1).await.expect("Failed to get Foo");
        assert_eq!(engine.cache().len(), 1);
        engine
            .begin_transaction()
            .await
            .expect("Could not begin a transaction");
        engine.rollback().await.expect("Could not roll back");
        assert!(engine.cache().is_empty());

        let retaining = self::engine(&pool, CachePolicy::Retain);
        pool.reply(Reply::Done);
        retaining
            .begin_transaction()
            .await
            .expect("Could not begin a transaction");
        pool.reply(foo_row(1, "a", 2));
        retaining.get::<Foo>(1).await.expect("Failed to get Foo");
        retaining.rollback().await.expect("Could not roll back");
        assert_eq!(retaining.cache().len(), 1);
    }

    #[tokio::test]
    async fn filter_values_must_match_the_column() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        for (column, value) in [
            ("bar", Value::Null),
            ("bar", Value::Int32(None)),
            ("bar", Value::Boolean(Some(true))),
            ("bar", Value::Varchar(Some("1".into()))),
            ("foo", Value::Int32(Some(1))),
        ] {
            let error = engine
                .find_where::<Foo>(column, value.clone())
                .await
                .expect_err(&format!("{value:?} cannot be compared with {column}"));
            assert!(error.is_schema_metadata());
        }
        assert_eq!(pool.state().acquired, 0);
    }

    #[tokio::test]
    async fn key_only_entities() {
        let table_exists =
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = ?)";
        let record_exists = "SELECT EXISTS (SELECT FROM key_only WHERE id = ?)";
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        pool.reply(Reply::exists(true))
            .reply(Reply::exists(false))
            .reply(Reply::row(&["id"], vec![Value::Int64(Some(3))]));
        let mut key = KeyOnly::default();
        assert_eq!(engine.save(&mut key).await.expect("Failed to save KeyOnly"), 3);
        assert_eq!(key.id, 3);

        // Nothing to write for a row that exists
        pool.reply(Reply::exists(true)).reply(Reply::exists(true));
        assert_eq!(engine.save(&mut key).await.expect("Failed to save KeyOnly"), 3);

        pool.reply(Reply::Affected(1));
        let result = engine.insert(&key).await.expect("Failed to insert KeyOnly");
        assert_eq!(result.rows_affected, 1);
        let error = engine
            .update(&key, 3)
            .await
            .expect_err("There are no columns to update");
        assert!(error.is_schema_metadata());

        let state = pool.state();
        assert_eq!(
            state.sql(),
            [
                table_exists,
                record_exists,
                "INSERT INTO key_only DEFAULT VALUES RETURNING id",
                table_exists,
                record_exists,
                "INSERT INTO key_only DEFAULT VALUES",
            ]
        );
        assert!(state.statements[2].params.is_empty());
        assert!(state.statements[5].params.is_empty());
        assert_eq!(state.acquired, 3);
        assert_eq!(state.in_use(), 0);
    }

    #[tokio::test]
    async fn reads_overlapping_a_write_are_not_cached() {
        let pool = MockPool::new();
        let engine = engine(&pool, CachePolicy::Invalidate);
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let updated = Foo {
            id: 1,
            foo: "new".into(),
            bar: 2,
        };

        // The read fetches the old row, the update completes before it is stored
        pool.reply(Reply::Gated {
            entered: entered.clone(),
            release: release.clone(),
            reply: Box::new(foo_row(1, "old", 2)),
        })
        .reply(Reply::Affected(1))
        .reply(foo_row(1, "new", 2));
        let writer = async {
            entered.notified().await;
            let result = engine.update(&updated, 1).await;
            release.notify_one();
            result
        };
        let (read, written) = tokio::join!(engine.get::<Foo>(1), writer);
        assert_eq!(
            read.expect("Failed to get Foo").map(|v| v.foo),
            Some("old".to_string())
        );
        assert_eq!(written.expect("Failed to update Foo").rows_affected, 1);
        assert!(engine.cache().is_empty());
        assert_eq!(
            engine.get::<Foo>(1).await.expect("Failed to get Foo"),
            Some(updated.clone())
        );
        assert_eq!(engine.cache().len(), 1);

        // Same for lists
        pool.reply(Reply::Gated {
            entered: entered.clone(),
            release: release.clone(),
            reply: Box::new(foo_row(1, "new", 2)),
        })
        .reply(Reply::Affected(1))
        .reply(Reply::Rows(Vec::new()));
        let writer = async {
            entered.notified().await;
            let result = engine.destroy_all::<Foo>().await;
            release.notify_one();
            result
        };
        let (read, written) = tokio::join!(engine.all::<Foo>(), writer);
        assert_eq!(read.expect("Failed to read all Foo"), [updated]);
        assert_eq!(written.expect("Failed to destroy all Foo").rows_affected, 1);
        assert!(engine.cache().is_empty());
        assert!(
            engine
                .all::<Foo>()
                .await
                .expect("Failed to read all Foo")
                .is_empty()
        );

        let state = pool.state();
        assert_eq!(state.statements.len(), 6);
        assert_eq!(state.in_use(), 0);
    }
}
