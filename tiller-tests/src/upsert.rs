use tiller::{Entity, Pool, RecordEngine};

#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "upsert_counter")]
pub struct Counter {
    #[tiller(primary_key)]
    pub id: i64,
    pub name: String,
    pub hits: i32,
}

pub async fn upsert<P: Pool>(engine: &RecordEngine<P>) {
    engine
        .drop_table::<Counter>()
        .await
        .expect("Failed to drop Counter table");

    // The first save creates the table
    let mut counter = Counter {
        id: 0,
        name: "visits".into(),
        hits: 1,
    };
    let id = engine
        .save(&mut counter)
        .await
        .expect("Failed to save Counter");
    assert!(
        engine
            .table_exists::<Counter>()
            .await
            .expect("Could not check the table")
    );
    assert_eq!(counter.id, id);

    // Saving again with the same key updates the row
    counter.hits = 2;
    let again = engine
        .save(&mut counter)
        .await
        .expect("Failed to save Counter");
    assert_eq!(again, id);
    assert_eq!(counter.id, id);
    assert_eq!(
        engine.all::<Counter>().await.expect("Failed to read all Counter"),
        [counter.clone()]
    );

    // A key with no row inserts, the database generates the stored key
    let mut other = Counter {
        id: id + 1000,
        name: "downloads".into(),
        hits: 7,
    };
    let other_id = engine
        .save(&mut other)
        .await
        .expect("Failed to save Counter");
    assert_ne!(other_id, id + 1000);
    assert_eq!(other.id, other_id);
    assert_eq!(
        engine
            .get::<Counter>(other_id)
            .await
            .expect("Failed to get Counter"),
        Some(other)
    );
    assert_eq!(
        engine
            .all::<Counter>()
            .await
            .expect("Failed to read all Counter")
            .len(),
        2
    );

    engine
        .drop_table::<Counter>()
        .await
        .expect("Failed to drop Counter table");
}
