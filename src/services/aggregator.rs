//! Interaction aggregation.
//!
//! Collapses per-event interactions into per-(author, reviewer) counters.
//! Pairs live in a flat arena indexed by the integer pair, so lookups are
//! O(1) and iteration order is first-seen order.

use crate::models::{Interaction, InteractionKind, PairCounters, RawInteraction};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Inclusive time window `[start, end]` interactions must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    /// Window covering the `days` days before `now`.
    pub fn ending_at(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - Duration::days(days.max(0)),
            end: now,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Counters for one pair, stored in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct PairEntry {
    pub author_id: i64,
    pub reviewer_id: i64,
    pub counters: PairCounters,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    entries: Vec<PairEntry>,
    index: HashMap<(i64, i64), usize>,
    /// Rows rejected as malformed (missing columns, invalid IDs).
    pub skipped_rows: usize,
    /// Rows where the author interacted with their own MR.
    pub self_interactions: usize,
    /// Rows outside the lookback window.
    pub outside_window: usize,
}

impl Aggregation {
    /// Counters for a pair, if any interaction was recorded.
    pub fn get(&self, author_id: i64, reviewer_id: i64) -> Option<&PairCounters> {
        self.index
            .get(&(author_id, reviewer_id))
            .map(|&slot| &self.entries[slot].counters)
    }

    pub fn entries(&self) -> &[PairEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, interaction: &Interaction) {
        let key = (interaction.author_id, interaction.reviewer_id);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.entries.push(PairEntry {
                    author_id: interaction.author_id,
                    reviewer_id: interaction.reviewer_id,
                    counters: PairCounters::starting_at(interaction.occurred_at),
                });
                let slot = self.entries.len() - 1;
                self.index.insert(key, slot);
                slot
            }
        };

        let counters = &mut self.entries[slot].counters;
        counters.interaction_count += 1;
        match interaction.kind {
            InteractionKind::Approval => counters.approval_count += 1,
            InteractionKind::Review => counters.review_count += 1,
            InteractionKind::Comment => counters.comment_count += 1,
            InteractionKind::Other => {}
        }
        counters.first_interaction_at = counters.first_interaction_at.min(interaction.occurred_at);
        counters.last_interaction_at = counters.last_interaction_at.max(interaction.occurred_at);
    }

    fn accept(&mut self, interaction: &Interaction, window: &LookbackWindow) {
        if !window.contains(interaction.occurred_at) {
            self.outside_window += 1;
        } else if interaction.is_self_interaction() {
            self.self_interactions += 1;
        } else {
            self.record(interaction);
        }
    }
}

/// Aggregate validated interactions that fall inside `window`.
pub fn aggregate<'a, I>(interactions: I, window: &LookbackWindow) -> Aggregation
where
    I: IntoIterator<Item = &'a Interaction>,
{
    let mut aggregation = Aggregation::default();
    for interaction in interactions {
        aggregation.accept(interaction, window);
    }
    aggregation
}

/// Aggregate raw table rows, skipping and counting malformed ones.
pub fn aggregate_rows<I>(rows: I, window: &LookbackWindow) -> Aggregation
where
    I: IntoIterator<Item = RawInteraction>,
{
    let mut aggregation = Aggregation::default();
    for row in rows {
        match row.into_interaction() {
            Some(interaction) => aggregation.accept(&interaction, window),
            None => aggregation.skipped_rows += 1,
        }
    }

    if aggregation.skipped_rows > 0 {
        log::warn!(
            "[graph] Skipped {} malformed interaction rows",
            aggregation.skipped_rows
        );
    }

    aggregation
}
