use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::TrackedAccount;

impl Database {
    /// Insert an account or refresh its identity fields. The sync cursor is
    /// left untouched on update.
    pub fn upsert_account(&self, account: &TrackedAccount) -> Result<()> {
        self.conn().execute(
            "INSERT INTO accounts (puuid, game_name, tag_line, region, synced_at, tracked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (puuid) DO UPDATE SET
                 game_name = excluded.game_name,
                 tag_line  = excluded.tag_line,
                 region    = excluded.region,
                 tracked   = excluded.tracked",
            params![
                account.puuid,
                account.game_name,
                account.tag_line,
                account.region,
                account.synced_at.map(|at| at.timestamp()),
                account.tracked,
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, puuid: &str) -> Result<TrackedAccount> {
        self.conn()
            .query_row(
                "SELECT puuid, game_name, tag_line, region, synced_at, tracked
                 FROM accounts WHERE puuid = ?1",
                params![puuid],
                row_to_account,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Accounts the scheduler should sync, least recently synced first.
    pub fn list_tracked_accounts(&self) -> Result<Vec<TrackedAccount>> {
        let mut stmt = self.conn().prepare(
            "SELECT puuid, game_name, tag_line, region, synced_at, tracked
             FROM accounts
             WHERE tracked = 1
             ORDER BY synced_at ASC, puuid ASC",
        )?;

        let rows = stmt.query_map([], row_to_account)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }

    /// Advance the account's sync cursor.
    pub fn set_account_synced_at(&self, puuid: &str, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE accounts SET synced_at = ?1 WHERE puuid = ?2",
            params![at.timestamp(), puuid],
        )?;
        Ok(affected > 0)
    }

    pub fn set_account_tracked(&self, puuid: &str, tracked: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE accounts SET tracked = ?1 WHERE puuid = ?2",
            params![tracked, puuid],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedAccount> {
    let synced_secs: Option<i64> = row.get(4)?;
    let synced_at = synced_secs
        .map(|secs| {
            DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Integer,
                    format!("timestamp out of range: {secs}").into(),
                )
            })
        })
        .transpose()?;

    Ok(TrackedAccount {
        puuid: row.get(0)?,
        game_name: row.get(1)?,
        tag_line: row.get(2)?,
        region: row.get(3)?,
        synced_at,
        tracked: row.get(5)?,
    })
}
