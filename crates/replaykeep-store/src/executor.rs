//! The three SQL operations the store's write paths need.
//!
//! Both a plain [`Connection`] and an open [`Transaction`] implement
//! [`Executor`], so the same insert logic runs standalone or inside a larger
//! transaction.

use rusqlite::{Connection, Params, Row, Transaction};

/// Minimal SQL execution capability.
pub trait Executor {
    /// Execute a statement, returning the number of affected rows.
    fn execute<P: Params>(&self, sql: &str, params: P) -> rusqlite::Result<usize>;

    /// Run a query and map every row.
    fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>;

    /// Run a query expected to return exactly one row.
    fn query_row<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>;
}

impl Executor for Connection {
    fn execute<P: Params>(&self, sql: &str, params: P) -> rusqlite::Result<usize> {
        Connection::execute(self, sql, params)
    }

    fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.prepare(sql)?;
        let rows = stmt.query_map(params, map)?.collect();
        rows
    }

    fn query_row<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        Connection::query_row(self, sql, params, map)
    }
}

impl Executor for Transaction<'_> {
    fn execute<P: Params>(&self, sql: &str, params: P) -> rusqlite::Result<usize> {
        <Connection as Executor>::execute(self, sql, params)
    }

    fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        <Connection as Executor>::query(self, sql, params, map)
    }

    fn query_row<T, P, F>(&self, sql: &str, params: P, map: F) -> rusqlite::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        <Connection as Executor>::query_row(self, sql, params, map)
    }
}
