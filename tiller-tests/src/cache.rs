use tiller::{Entity, Pool, RecordEngine};

#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "cache_setting")]
pub struct Setting {
    #[tiller(primary_key)]
    pub id: i32,
    pub name: String,
    pub choice: String,
}

async fn prepare<P: Pool>(engine: &RecordEngine<P>) -> i64 {
    engine
        .create_table::<Setting>()
        .await
        .expect("Failed to create Setting table");
    engine.cache().clear();
    let mut setting = Setting {
        id: 0,
        name: "theme".into(),
        choice: "dark".into(),
    };
    engine
        .save(&mut setting)
        .await
        .expect("Failed to save Setting")
}

fn light(id: i64) -> Setting {
    Setting {
        id: id as i32,
        name: "theme".into(),
        choice: "light".into(),
    }
}

/// Writes through the engine invalidate the cached reads of the entity.
pub async fn cache_invalidate<P: Pool>(engine: &RecordEngine<P>) {
    let id = prepare(engine).await;
    let cached = engine
        .get::<Setting>(id)
        .await
        .expect("Failed to get Setting")
        .expect("The saved Setting must exist");
    assert_eq!(cached.choice, "dark");
    engine
        .find_where::<Setting>("name", "theme")
        .await
        .expect("Failed to filter Setting");
    assert!(!engine.cache().is_empty());

    engine
        .update(&light(id), id)
        .await
        .expect("Failed to update Setting");
    assert!(engine.cache().is_empty());
    assert_eq!(
        engine.get::<Setting>(id).await.expect("Failed to get Setting"),
        Some(light(id))
    );
    assert_eq!(
        engine
            .find_where::<Setting>("name", "theme")
            .await
            .expect("Failed to filter Setting"),
        [light(id)]
    );

    engine
        .drop_table::<Setting>()
        .await
        .expect("Failed to drop Setting table");
}

/// Cached reads survive writes, the stale value is returned until the cache is cleared.
pub async fn cache_retain<P: Pool>(engine: &RecordEngine<P>) {
    let id = prepare(engine).await;
    let cached = engine
        .get::<Setting>(id)
        .await
        .expect("Failed to get Setting")
        .expect("The saved Setting must exist");
    assert_eq!(cached.choice, "dark");

    engine
        .update(&light(id), id)
        .await
        .expect("Failed to update Setting");
    assert_eq!(
        engine.get::<Setting>(id).await.expect("Failed to get Setting"),
        Some(cached)
    );

    engine.cache().clear();
    assert_eq!(
        engine.get::<Setting>(id).await.expect("Failed to get Setting"),
        Some(light(id))
    );

    engine
        .drop_table::<Setting>()
        .await
        .expect("Failed to drop Setting table");
    engine.cache().clear();
}
