mod cache;
mod destroy_all;
mod ordering;
mod simple;
#[cfg(not(feature = "disable-transactions"))]
mod transaction;
mod upsert;

use crate::{
    cache::{cache_invalidate, cache_retain},
    destroy_all::destroy_all,
    ordering::ordering,
    simple::{invalid_metadata, simple},
    upsert::upsert,
};
#[cfg(not(feature = "disable-transactions"))]
use crate::transaction::{savepoints, transaction_states};
use log::LevelFilter;
use std::env;
use tiller::{CachePolicy, EngineConfig, Pool, RecordEngine};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against the database behind `pool`.
///
/// Each scenario uses its own tables and recreates them first.
pub async fn execute_tests<P: Pool + Clone>(pool: P) {
    let engine = RecordEngine::with_config(
        pool.clone(),
        EngineConfig::default().with_cache_policy(CachePolicy::Invalidate),
    );
    invalid_metadata(&engine).await;
    simple(&engine).await;
    upsert(&engine).await;
    ordering(&engine).await;
    destroy_all(&engine).await;
    cache_invalidate(&engine).await;
    #[cfg(not(feature = "disable-transactions"))]
    {
        transaction_states(&engine).await;
        savepoints(&engine).await;
    }
    let retaining = RecordEngine::with_config(
        pool,
        EngineConfig::default().with_cache_policy(CachePolicy::Retain),
    );
    cache_retain(&retaining).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
