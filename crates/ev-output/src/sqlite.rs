//! SQLite trajectory writer.

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use ev_engine::AgentSample;

use crate::writer::TrajectoryWriter;
use crate::{OutputError, OutputResult};

/// Writes one run's frames to an SQLite file.
pub struct SqliteTrajectoryWriter {
    conn:     Connection,
    frames:   u64,
    finished: bool,
}

impl SqliteTrajectoryWriter {
    /// Open (or create) the database at `path` and initialise the schema.
    pub fn create(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS geometry (
                 wkt TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS frames (
                 frame INTEGER PRIMARY KEY,
                 time  REAL    NOT NULL
             );
             CREATE TABLE IF NOT EXISTS trajectory_data (
                 frame INTEGER NOT NULL,
                 id    INTEGER NOT NULL,
                 pos_x REAL    NOT NULL,
                 pos_y REAL    NOT NULL,
                 ori_x REAL    NOT NULL,
                 ori_y REAL    NOT NULL
             );
             CREATE INDEX IF NOT EXISTS trajectory_frame_id
                 ON trajectory_data (frame, id);",
        )?;

        Ok(Self { conn, frames: 0, finished: false })
    }

    /// Finish and close the connection, surfacing close errors.
    pub fn close(mut self) -> OutputResult<()> {
        self.finish()?;
        self.conn.close().map_err(|(_, e)| OutputError::Sqlite(e))
    }
}

impl TrajectoryWriter for SqliteTrajectoryWriter {
    fn write_geometry(&mut self, wkt: &str) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        self.conn.execute("DELETE FROM geometry", [])?;
        self.conn.execute("INSERT INTO geometry (wkt) VALUES (?1)", [wkt])?;
        Ok(())
    }

    fn write_frame(&mut self, time: f64, samples: &[AgentSample]) -> OutputResult<u64> {
        if self.finished {
            return Err(OutputError::Finished);
        }
        let frame = self.frames;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO frames (frame, time) VALUES (?1, ?2)",
            rusqlite::params![frame as i64, time],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO trajectory_data \
                 (frame, id, pos_x, pos_y, ori_x, ori_y) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for s in samples {
                stmt.execute(rusqlite::params![
                    frame as i64,
                    s.id.0 as i64,
                    s.position.x,
                    s.position.y,
                    s.orientation.x,
                    s.orientation.y,
                ])?;
            }
        }
        tx.commit()?;
        self.frames += 1;
        Ok(frame)
    }

    #[inline]
    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        // Leave a single self-contained file behind for readers.
        self.conn.execute_batch(
            "PRAGMA wal_checkpoint(TRUNCATE);
             PRAGMA journal_mode = DELETE;",
        )?;
        debug!(frames = self.frames, "trajectory writer finished");
        Ok(())
    }
}
