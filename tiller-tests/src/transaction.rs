use tiller::{Entity, Pool, RecordEngine};

#[derive(Entity, Default, Clone, Debug, PartialEq)]
#[tiller(table = "transaction_account")]
pub struct Account {
    #[tiller(primary_key)]
    pub id: i32,
    pub owner: String,
    pub balance: i32,
}

pub async fn transaction_states<P: Pool>(engine: &RecordEngine<P>) {
    assert!(!engine.in_transaction().await);
    // Outside a transaction a savepoint is ignored
    engine
        .set_savepoint("nowhere")
        .await
        .expect("A savepoint outside a transaction must be ignored");
    let error = engine
        .commit_transaction()
        .await
        .expect_err("Commit without a transaction must fail");
    assert!(error.is_transaction());
    let error = engine
        .rollback()
        .await
        .expect_err("Rollback without a transaction must fail");
    assert!(error.is_transaction());
    let error = engine
        .rollback_to("nowhere")
        .await
        .expect_err("Rollback to a savepoint without a transaction must fail");
    assert!(error.is_transaction());

    engine
        .begin_transaction()
        .await
        .expect("Could not begin a transaction");
    assert!(engine.in_transaction().await);
    let error = engine
        .begin_transaction()
        .await
        .expect_err("Nested transactions must fail");
    assert!(error.is_transaction());
    let error = engine
        .rollback_to("unknown")
        .await
        .expect_err("Unknown savepoints must fail");
    assert!(error.is_transaction());
    assert!(engine.in_transaction().await);
    engine.rollback().await.expect("Could not roll back");
    assert!(!engine.in_transaction().await);
}

pub async fn savepoints<P: Pool>(engine: &RecordEngine<P>) {
    engine
        .create_table::<Account>()
        .await
        .expect("Failed to create Account table");

    engine
        .begin_transaction()
        .await
        .expect("Could not begin a transaction");
    let mut account = Account {
        id: 0,
        owner: "ada".into(),
        balance: 42,
    };
    let id = engine
        .save(&mut account)
        .await
        .expect("Failed to save Account");
    engine
        .set_savepoint("before_withdraw")
        .await
        .expect("Could not set the savepoint");
    account.balance = 39;
    engine
        .save(&mut account)
        .await
        .expect("Failed to save Account");
    assert_eq!(
        engine
            .get::<Account>(id)
            .await
            .expect("Failed to get Account")
            .map(|v| v.balance),
        Some(39)
    );
    engine
        .rollback_to("before_withdraw")
        .await
        .expect("Could not roll back to the savepoint");
    assert!(engine.in_transaction().await);
    // The savepoint survives the rollback to it
    engine
        .rollback_to("before_withdraw")
        .await
        .expect("Could not roll back to the savepoint twice");
    engine
        .commit_transaction()
        .await
        .expect("Could not commit");
    assert!(!engine.in_transaction().await);
    assert_eq!(
        engine
            .get::<Account>(id)
            .await
            .expect("Failed to get Account")
            .map(|v| v.balance),
        Some(42)
    );

    // Rollback discards everything since begin
    engine
        .begin_transaction()
        .await
        .expect("Could not begin a transaction");
    engine
        .insert(&Account {
            id: 0,
            owner: "grace".into(),
            balance: 7,
        })
        .await
        .expect("Failed to insert Account");
    assert_eq!(
        engine
            .all::<Account>()
            .await
            .expect("Failed to read all Account")
            .len(),
        2
    );
    engine.rollback().await.expect("Could not roll back");
    assert_eq!(
        engine
            .all::<Account>()
            .await
            .expect("Failed to read all Account")
            .len(),
        1
    );

    engine
        .drop_table::<Account>()
        .await
        .expect("Failed to drop Account table");
}
