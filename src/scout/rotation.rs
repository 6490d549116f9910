//! Budget-bounded rotation over a pool of entities.
//!
//! Each cycle visits `quota` consecutive members starting at the cursor and
//! moves the cursor past them, so every member is visited within
//! `ceil(len / quota)` cycles whatever the pool size.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Rotate { quota: usize },
    /// Visit the whole pool; the cursor is neither read nor advanced.
    ForceAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<T> {
    pub selected: Vec<T>,
    pub next_cursor: usize,
}

/// Bring a persisted cursor back into `[0, len)`. Pools shrink between runs.
pub fn normalize_cursor(cursor: usize, len: usize) -> usize {
    if len == 0 { cursor } else { cursor % len }
}

/// Select up to `quota` members starting at `cursor`. A quota larger than the
/// pool visits each member once rather than repeating members in one cycle.
pub fn select<T: Clone>(pool: &[T], cursor: usize, quota: usize) -> Selection<T> {
    let len = pool.len();
    if len == 0 {
        return Selection {
            selected: Vec::new(),
            next_cursor: cursor,
        };
    }
    let start = normalize_cursor(cursor, len);
    let take = quota.min(len);
    let selected = (0..take).map(|i| pool[(start + i) % len].clone()).collect();
    Selection {
        selected,
        next_cursor: (start + take) % len,
    }
}

pub fn select_with_mode<T: Clone>(pool: &[T], cursor: usize, mode: RotationMode) -> Selection<T> {
    match mode {
        RotationMode::Rotate { quota } => select(pool, cursor, quota),
        RotationMode::ForceAll => Selection {
            selected: pool.to_vec(),
            next_cursor: cursor,
        },
    }
}
