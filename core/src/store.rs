//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods and never executes SQL directly.

use rusqlite::{Connection, OptionalExtension, params};
use chrono::{DateTime, Utc};
use crate::{
    error::SimResult,
    event::EventLogEntry,
    types::Tick,
};

pub struct SaveStore {
    conn: Connection,
}

impl SaveStore {
    /// Open (or create) the save database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, version: &str, started_at: DateTime<Utc>) -> SimResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO run (run_id, version, started_at) VALUES (?1, ?2, ?3)",
            params![run_id, version, started_at.to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Save slots ─────────────────────────────────────────────

    /// Write `state_json` to `slot`, replacing whatever was there.
    pub fn save_game(&self, slot: &str, version: u32, state_json: &str, saved_at: DateTime<Utc>) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO save_slot (slot, version, state_json, saved_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slot) DO UPDATE SET
                version = excluded.version,
                state_json = excluded.state_json,
                saved_at = excluded.saved_at",
            params![slot, version, state_json, saved_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// The stored JSON for `slot`, if any.
    pub fn load_game(&self, slot: &str) -> SimResult<Option<String>> {
        let json = self.conn
            .query_row(
                "SELECT state_json FROM save_slot WHERE slot = ?1",
                params![slot],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(json)
    }

    /// Returns true if a save was removed.
    pub fn delete_save(&self, slot: &str) -> SimResult<bool> {
        let removed = self.conn.execute("DELETE FROM save_slot WHERE slot = ?1", params![slot])?;
        Ok(removed > 0)
    }

    pub fn list_slots(&self) -> SimResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT slot FROM save_slot ORDER BY slot ASC")?;
        let slots = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, tick, event_type, payload) VALUES (?1, ?2, ?3, ?4)",
            params![entry.run_id, entry.tick as i64, entry.event_type, entry.payload],
        )?;
        Ok(())
    }

    pub fn events_for_tick(&self, run_id: &str, tick: Tick) -> SimResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, tick, event_type, payload
             FROM event_log WHERE run_id = ?1 AND tick = ?2
             ORDER BY id ASC"
        )?;
        let entries = stmt.query_map(params![run_id, tick as i64], |row| {
            Ok(EventLogEntry {
                id:         Some(row.get(0)?),
                run_id:     row.get(1)?,
                tick:       row.get::<_, i64>(2)? as u64,
                event_type: row.get(3)?,
                payload:    row.get(4)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str) -> SimResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
