use crate::Connection;

/// The connection of an open transaction together with its savepoints.
///
/// Only bookkeeping lives here, the record engine issues the statements.
pub struct TransactionContext<C: Connection> {
    pub connection: C,
    savepoints: Vec<String>,
}

impl<C: Connection> TransactionContext<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            savepoints: Vec::new(),
        }
    }

    /// Savepoint names, oldest first.
    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    pub fn has_savepoint(&self, name: &str) -> bool {
        self.savepoints.iter().any(|v| v == name)
    }

    pub fn push_savepoint(&mut self, name: impl Into<String>) {
        self.savepoints.push(name.into());
    }

    /// Forget the savepoints created after the most recent one named `name`, which stays.
    ///
    /// Returns `false` if no savepoint has that name.
    pub fn rewind_to(&mut self, name: &str) -> bool {
        match self.savepoints.iter().rposition(|v| v == name) {
            Some(i) => {
                self.savepoints.truncate(i + 1);
                true
            }
            None => false,
        }
    }
}
