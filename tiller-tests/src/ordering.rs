use tiller::{Entity, Pool, RecordEngine};

/// Columns declared text first, then integer.
#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "ordering_item")]
pub struct Item {
    pub label: String,
    pub amount: i32,
    #[tiller(primary_key)]
    pub id: i32,
    #[tiller(ignore)]
    pub note: String,
}

pub async fn ordering<P: Pool>(engine: &RecordEngine<P>) {
    engine
        .create_table::<Item>()
        .await
        .expect("Failed to create Item table");

    let mut item = Item {
        label: "apples".into(),
        amount: 12,
        id: 0,
        note: "not stored".into(),
    };
    let id = engine.save(&mut item).await.expect("Failed to save Item");
    let loaded = engine
        .get::<Item>(id)
        .await
        .expect("Failed to get Item")
        .expect("The saved Item must exist");
    assert_eq!(
        loaded,
        Item {
            label: "apples".into(),
            amount: 12,
            id: id as i32,
            note: String::new(),
        }
    );
    assert_eq!(
        engine
            .find_where::<Item>("amount", 12)
            .await
            .expect("Failed to filter Item"),
        [loaded.clone()]
    );
    let error = engine
        .find_where::<Item>("note", "not stored")
        .await
        .expect_err("Ignored fields are not columns");
    assert!(error.is_schema_metadata());

    let result = engine
        .update(
            &Item {
                label: "pears".into(),
                amount: 3,
                id: 0,
                note: String::new(),
            },
            id,
        )
        .await
        .expect("Failed to update Item");
    assert_eq!(result.rows_affected, 1);
    let loaded = engine
        .get::<Item>(id)
        .await
        .expect("Failed to get Item")
        .expect("The updated Item must exist");
    assert_eq!(loaded.label, "pears");
    assert_eq!(loaded.amount, 3);

    engine
        .drop_table::<Item>()
        .await
        .expect("Failed to drop Item table");
}
