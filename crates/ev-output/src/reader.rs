//! Read-only, paginated access to a finished trajectory file.

use std::ops::Range;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use crate::row::{AgentPosition, Frame};
use crate::{OutputError, OutputResult};

/// Frames per page when the caller does not say.
pub const DEFAULT_CHUNK_SIZE: u64 = 100;

/// Counts available without reading any rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrajectoryInfo {
    pub total_frames: u64,
    /// Distinct agent ids over the whole run.
    pub agent_count:  u64,
    pub total_rows:   u64,
}

/// A request for `[start_frame, end_frame)`, at most `chunk_size` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub start_frame: u64,
    /// `None` reads to the last frame.
    pub end_frame:   Option<u64>,
    pub chunk_size:  u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { start_frame: 0, end_frame: None, chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl PageQuery {
    /// Page starting at `start_frame` with the default chunk size.
    pub fn starting_at(start_frame: u64) -> Self {
        Self { start_frame, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPage {
    pub frames:           Vec<Frame>,
    pub start_frame:      u64,
    /// Exclusive end of the frames returned.
    pub end_frame:        u64,
    pub total_frames:     u64,
    pub has_more:         bool,
    pub next_start_frame: Option<u64>,
}

pub struct TrajectoryReader {
    conn: Connection,
}

impl TrajectoryReader {
    pub fn open(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn total_frames(&self) -> OutputResult<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM frames", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    pub fn info(&self) -> OutputResult<TrajectoryInfo> {
        let (agents, rows): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(DISTINCT id), COUNT(*) FROM trajectory_data",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(TrajectoryInfo {
            total_frames: self.total_frames()?,
            agent_count:  agents as u64,
            total_rows:   rows as u64,
        })
    }

    /// The walkable area as WKT, if one was written.
    pub fn geometry_wkt(&self) -> OutputResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT wkt FROM geometry LIMIT 1", [], |r| r.get(0))
            .optional()?)
    }

    /// Every frame in `range` that exists, in order.  Frames without agents
    /// are returned with an empty agent list.
    pub fn frames(&self, range: Range<u64>) -> OutputResult<Vec<Frame>> {
        let mut frames: Vec<Frame> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT frame, time FROM frames WHERE frame >= ?1 AND frame < ?2 ORDER BY frame",
            )?;
            let rows = stmt.query_map([range.start as i64, range.end as i64], |r| {
                Ok(Frame { frame: r.get::<_, i64>(0)? as u64, time: r.get(1)?, agents: Vec::new() })
            })?;
            let frames = rows.collect::<Result<Vec<_>, _>>()?;
            frames
        };
        let Some(first) = frames.first().map(|f| f.frame) else {
            return Ok(frames);
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT frame, id, pos_x, pos_y, ori_x, ori_y FROM trajectory_data \
             WHERE frame >= ?1 AND frame < ?2 ORDER BY frame, id",
        )?;
        let mut rows = stmt.query([range.start as i64, range.end as i64])?;
        while let Some(row) = rows.next()? {
            let frame = row.get::<_, i64>(0)? as u64;
            let position = AgentPosition {
                agent_id: row.get::<_, i64>(1)? as u64,
                x:        row.get(2)?,
                y:        row.get(3)?,
                ori_x:    row.get(4)?,
                ori_y:    row.get(5)?,
            };
            // Frames are contiguous, so the slot is the offset from the first.
            if let Some(slot) = frames.get_mut((frame - first) as usize) {
                slot.agents.push(position);
            }
        }
        Ok(frames)
    }

    /// One page of frames.
    ///
    /// The page ends at `min(start + chunk, end or total, total)`, never
    /// before `start`.  An empty window (`end <= start`, or `start` past the
    /// last frame) is a final page: no frames and no `next_start_frame`.
    pub fn page(&self, query: &PageQuery) -> OutputResult<TrajectoryPage> {
        if query.chunk_size == 0 {
            return Err(OutputError::EmptyChunk);
        }
        let total = self.total_frames()?;
        let start = query.start_frame;
        let end = start
            .saturating_add(query.chunk_size)
            .min(query.end_frame.unwrap_or(total))
            .min(total)
            .max(start);

        let frames = if start < end { self.frames(start..end)? } else { Vec::new() };
        let has_more = start < end && end < total;
        Ok(TrajectoryPage {
            frames,
            start_frame: start,
            end_frame: end,
            total_frames: total,
            has_more,
            next_start_frame: has_more.then_some(end),
        })
    }
}
