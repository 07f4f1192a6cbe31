// Comment ID Generator - Snowflake-like ids, time-ordered and collision-free
// 64-bit id format: [timestamp:41][node:10][sequence:12] (sign bit always 0)

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{AppError, AppResult};
use crate::models::CommentId;

/// Milliseconds between the Unix epoch and 2024-01-01T00:00:00Z.
const EPOCH_OFFSET_MILLIS: u64 = 1_704_067_200_000;

const SEQUENCE_BITS: u64 = 12;
const NODE_BITS: u64 = 10;
const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MAX_NODE: u16 = (1 << NODE_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << 41) - 1;

/// Generates comment ids. The timestamp and sequence live in a single atomic
/// word updated with compare-and-swap, so concurrent callers never observe
/// the same pair. When a millisecond's sequence space runs out the generator
/// borrows the next millisecond instead of sleeping, and a clock that moves
/// backwards never rewinds the stored timestamp.
#[derive(Debug)]
pub struct CommentIdGenerator {
    node_id: u16,
    // [timestamp:52][sequence:12]
    state: AtomicU64,
}

impl CommentIdGenerator {
    pub fn new(node_id: u16) -> AppResult<Self> {
        if node_id > MAX_NODE {
            return Err(AppError::ConfigurationError(format!(
                "ID node must be less than {}, got {}",
                MAX_NODE as u32 + 1,
                node_id
            )));
        }

        Ok(Self {
            node_id,
            state: AtomicU64::new(0),
        })
    }

    pub fn next_id(&self) -> CommentId {
        let now = current_millis();
        let mut current = self.state.load(Ordering::Relaxed);

        loop {
            let last_ts = current >> SEQUENCE_BITS;
            let last_seq = current & MAX_SEQUENCE;

            let (ts, seq) = if now > last_ts {
                (now, 0)
            } else if last_seq < MAX_SEQUENCE {
                (last_ts, last_seq + 1)
            } else {
                (last_ts + 1, 0)
            };

            let next = (ts << SEQUENCE_BITS) | seq;
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return CommentId::new(self.compose(ts, seq)),
                Err(observed) => current = observed,
            }
        }
    }

    fn compose(&self, ts: u64, seq: u64) -> i64 {
        let id = ((ts & TIMESTAMP_MASK) << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | seq;
        id as i64
    }

    /// Continue strictly after `id`. Used at startup with the highest stored
    /// id, so ids minted before a restart (possibly stamped ahead of the
    /// clock) are never handed out again.
    pub fn resume_after(&self, id: CommentId) {
        let floor = (raw_timestamp(id) << SEQUENCE_BITS) | MAX_SEQUENCE;
        self.state.fetch_max(floor, Ordering::AcqRel);
    }

    pub fn extract_node_id(id: CommentId) -> u16 {
        ((id.value() as u64 >> SEQUENCE_BITS) & MAX_NODE as u64) as u16
    }

    /// Milliseconds since the Unix epoch at which the id was minted.
    pub fn extract_timestamp_millis(id: CommentId) -> u64 {
        raw_timestamp(id) + EPOCH_OFFSET_MILLIS
    }
}

fn raw_timestamp(id: CommentId) -> u64 {
    id.value() as u64 >> (NODE_BITS + SEQUENCE_BITS)
}

fn current_millis() -> u64 {
    let unix_millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    unix_millis.saturating_sub(EPOCH_OFFSET_MILLIS)
}
