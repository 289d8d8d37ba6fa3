use tiller::{Entity, Pool, RecordEngine};

#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "destroy_all_log")]
pub struct LogLine {
    #[tiller(primary_key)]
    pub id: i64,
    pub message: String,
    pub level: i16,
}

pub async fn destroy_all<P: Pool>(engine: &RecordEngine<P>) {
    engine
        .create_table::<LogLine>()
        .await
        .expect("Failed to create LogLine table");

    let result = engine
        .destroy_all::<LogLine>()
        .await
        .expect("Failed to destroy an empty table");
    assert_eq!(result.rows_affected, 0);

    for (i, message) in ["started", "running", "stopped"].into_iter().enumerate() {
        engine
            .insert(&LogLine {
                id: 0,
                message: message.into(),
                level: i as i16,
            })
            .await
            .expect("Failed to insert LogLine");
    }
    assert_eq!(
        engine
            .all::<LogLine>()
            .await
            .expect("Failed to read all LogLine")
            .len(),
        3
    );
    let result = engine
        .destroy_all::<LogLine>()
        .await
        .expect("Failed to destroy all LogLine");
    assert_eq!(result.rows_affected, 3);
    assert!(
        engine
            .all::<LogLine>()
            .await
            .expect("Failed to read all LogLine")
            .is_empty()
    );
    assert!(
        engine
            .table_exists::<LogLine>()
            .await
            .expect("Could not check the table")
    );

    engine
        .drop_table::<LogLine>()
        .await
        .expect("Failed to drop LogLine table");
}
