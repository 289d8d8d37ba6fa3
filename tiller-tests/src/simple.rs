use tiller::{Entity, Pool, RecordEngine};

#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "simple_foo")]
pub struct Foo {
    #[tiller(primary_key)]
    pub id: i32,
    pub foo: String,
    pub bar: i32,
}

#[derive(Entity, Default, Clone, Debug)]
#[tiller(table = "two_keys")]
struct TwoKeys {
    #[tiller(primary_key)]
    first: i32,
    #[tiller(primary_key)]
    second: i32,
}

#[derive(Entity, Default, Clone, Debug)]
struct NoTable {
    #[tiller(primary_key)]
    id: i64,
}

pub async fn invalid_metadata<P: Pool>(engine: &RecordEngine<P>) {
    let error = engine
        .create_table::<TwoKeys>()
        .await
        .expect_err("Two primary keys must be rejected");
    assert!(error.is_schema_metadata());
    let error = engine
        .all::<NoTable>()
        .await
        .expect_err("A missing table name must be rejected");
    assert!(error.is_schema_metadata());
}

pub async fn simple<P: Pool>(engine: &RecordEngine<P>) {
    engine
        .drop_table::<Foo>()
        .await
        .expect("Failed to drop Foo table");
    assert!(
        !engine
            .table_exists::<Foo>()
            .await
            .expect("Could not check the table")
    );
    // A missing table means a missing record, without creating the table.
    assert!(
        !engine
            .record_exists(&Foo::default())
            .await
            .expect("Could not check the record")
    );
    assert!(
        !engine
            .table_exists::<Foo>()
            .await
            .expect("Could not check the table")
    );

    engine
        .create_table::<Foo>()
        .await
        .expect("Failed to create Foo table");
    assert!(
        engine
            .table_exists::<Foo>()
            .await
            .expect("Could not check the table")
    );
    assert!(
        engine
            .all::<Foo>()
            .await
            .expect("Failed to read all Foo")
            .is_empty()
    );

    let result = engine
        .insert(&Foo {
            id: 0,
            foo: "first".into(),
            bar: 1,
        })
        .await
        .expect("Failed to insert Foo");
    assert_eq!(result.rows_affected, 1);
    let all = engine.all::<Foo>().await.expect("Failed to read all Foo");
    assert_eq!(all.len(), 1);
    let first = all[0].clone();
    assert_eq!(first.foo, "first");
    assert_eq!(first.bar, 1);

    // Round trip
    let mut second = Foo {
        id: 0,
        foo: "second".into(),
        bar: 2,
    };
    let id = engine.save(&mut second).await.expect("Failed to save Foo");
    assert_eq!(second.id as i64, id);
    assert_ne!(second.id, first.id);
    assert_eq!(
        engine.get::<Foo>(id).await.expect("Failed to get Foo"),
        Some(second.clone())
    );
    assert_eq!(
        engine.get::<Foo>(987_654).await.expect("Failed to get Foo"),
        None
    );

    // Concurrent operations each lease their own connection
    let (one, two, all) = tokio::join!(
        engine.get::<Foo>(first.id as i64),
        engine.get::<Foo>(id),
        engine.all::<Foo>(),
    );
    assert_eq!(one.expect("Failed to get Foo"), Some(first.clone()));
    assert_eq!(two.expect("Failed to get Foo"), Some(second.clone()));
    assert_eq!(all.expect("Failed to read all Foo").len(), 2);

    assert_eq!(
        engine
            .find_where::<Foo>("foo", "second")
            .await
            .expect("Failed to filter Foo"),
        [second.clone()]
    );
    assert_eq!(
        engine
            .find_where::<Foo>("bar", 1)
            .await
            .expect("Failed to filter Foo"),
        [first.clone()]
    );
    assert_eq!(
        engine
            .find_where::<Foo>("id", second.id)
            .await
            .expect("Failed to filter Foo"),
        [second.clone()]
    );
    let error = engine
        .find_where::<Foo>("bar; DROP TABLE simple_foo", 1)
        .await
        .expect_err("Unknown columns must be rejected");
    assert!(error.is_schema_metadata());

    let updated = Foo {
        id: 0,
        foo: "updated".into(),
        bar: 20,
    };
    let result = engine
        .update(&updated, id)
        .await
        .expect("Failed to update Foo");
    assert_eq!(result.rows_affected, 1);
    let second = engine
        .get::<Foo>(id)
        .await
        .expect("Failed to get Foo")
        .expect("The updated Foo must exist");
    assert_eq!(
        second,
        Foo {
            id: id as i32,
            foo: "updated".into(),
            bar: 20,
        }
    );
    assert!(
        engine
            .record_exists(&second)
            .await
            .expect("Could not check the record")
    );

    let result = engine
        .delete::<Foo>(first.id as i64)
        .await
        .expect("Failed to delete Foo");
    assert_eq!(result.rows_affected, 1);
    assert_eq!(
        engine
            .get::<Foo>(first.id as i64)
            .await
            .expect("Failed to get Foo"),
        None
    );
    assert!(
        !engine
            .record_exists(&first)
            .await
            .expect("Could not check the record")
    );

    let result = engine.destroy(&second).await.expect("Failed to destroy Foo");
    assert_eq!(result.rows_affected, 1);
    assert!(
        engine
            .all::<Foo>()
            .await
            .expect("Failed to read all Foo")
            .is_empty()
    );

    engine
        .drop_table::<Foo>()
        .await
        .expect("Failed to drop Foo table");
}
