use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};
use tiller::{Connection, GenericSqlWriter, Pool, Query, RowLabeled, RowsAffected, Value};
use tokio::sync::Notify;

/// What the next statement returns.
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<RowLabeled>),
    Affected(u64),
    Fail(&'static str),
    /// Success with nothing to return.
    Done,
    /// Signals `entered` once the statement is received, then waits for `release`
    /// before answering with `reply`.
    Gated {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        reply: Box<Reply>,
    },
}

impl Reply {
    /// Single row result.
    pub fn row(labels: &[&str], values: Vec<Value>) -> Self {
        let labels = labels.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        Reply::Rows(vec![RowLabeled::new(labels.into(), values.into())])
    }

    /// Result of an `EXISTS` probe.
    pub fn exists(value: bool) -> Self {
        Reply::row(&["exists"], vec![Value::Boolean(Some(value))])
    }
}

#[derive(Default, Debug)]
pub struct MockState {
    /// Every statement received, batches have no parameters.
    pub statements: Vec<Query>,
    pub replies: VecDeque<Reply>,
    pub acquired: usize,
    pub released: usize,
    pub refuse_connections: bool,
}

impl MockState {
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|v| v.sql.as_str()).collect()
    }

    pub fn in_use(&self) -> usize {
        self.acquired - self.released
    }
}

/// Pool handing out scripted connections that record what they run.
#[derive(Default, Clone)]
pub struct MockPool {
    pub state: Arc<Mutex<MockState>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.state().replies.push_back(reply);
        self
    }
}

impl Pool for MockPool {
    type Connection = MockConnection;
    type SqlWriter = GenericSqlWriter;

    const NAME: &'static str = "mock";

    fn sql_writer(&self) -> GenericSqlWriter {
        GenericSqlWriter::new()
    }

    async fn acquire(&self) -> anyhow::Result<MockConnection> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(anyhow::anyhow!("connection refused"));
        }
        state.acquired += 1;
        Ok(MockConnection {
            state: self.state.clone(),
        })
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn next(&mut self, query: Query) -> Option<Reply> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.statements.push(query);
        state.replies.pop_front()
    }

    async fn answer(&mut self, query: Query) -> Option<Reply> {
        match self.next(query) {
            Some(Reply::Gated {
                entered,
                release,
                reply,
            }) => {
                entered.notify_one();
                release.notified().await;
                Some(*reply)
            }
            reply => reply,
        }
    }
}

impl Connection for MockConnection {
    async fn fetch(&mut self, query: &Query) -> anyhow::Result<Vec<RowLabeled>> {
        match self.answer(query.clone()).await {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(reply @ (Reply::Affected(..) | Reply::Gated { .. })) => {
                Err(anyhow::anyhow!("Unexpected reply {reply:?} to a fetch"))
            }
            Some(Reply::Done) | None => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, query: &Query) -> anyhow::Result<RowsAffected> {
        match self.answer(query.clone()).await {
            Some(Reply::Affected(rows_affected)) => Ok(RowsAffected {
                rows_affected,
                last_affected_id: None,
            }),
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(reply @ (Reply::Rows(..) | Reply::Gated { .. })) => {
                Err(anyhow::anyhow!("Unexpected reply {reply:?} to an execute"))
            }
            Some(Reply::Done) | None => Ok(RowsAffected::default()),
        }
    }

    async fn batch(&mut self, sql: &str) -> anyhow::Result<()> {
        match self.answer(Query::new(sql)).await {
            Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Reply::Done) | None => Ok(()),
            Some(reply) => Err(anyhow::anyhow!("Unexpected reply {reply:?} to a batch")),
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .released += 1;
    }
}
