use crate::models::{PlaylistMode, TrackId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsertPosition {
    At(usize),
    /// Append at the end; logically position `len(current)`.
    Append,
}

/// One trim target. `position` is the item's index in the playlist as it
/// stands after the insert, so repeated ids are removed precisely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub track_id: TrackId,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenancePlan {
    pub insert_position: InsertPosition,
    pub removals: Vec<Removal>,
}

impl MaintenancePlan {
    pub fn trims(&self) -> bool {
        !self.removals.is_empty()
    }
}

/// Compute the insert and trim operations for one new track.
///
/// Duplicates are not filtered here: the same song aired at different
/// times is a distinct entry.
pub fn plan(current: &[TrackId], _new_id: &TrackId, max_size: usize, mode: PlaylistMode) -> MaintenancePlan {
    let max_size = max_size.max(1);
    let new_len = current.len() + 1;
    let excess = new_len.saturating_sub(max_size);

    match mode {
        PlaylistMode::InsertAtFront => {
            // Inserting at 0 shifts old index i to i + 1; the tail of the old
            // list lands at max_size.. after the insert.
            let first_dropped = current.len() - excess;
            let removals = (0..excess)
                .map(|i| Removal {
                    track_id: current[first_dropped + i].clone(),
                    position: first_dropped + i + 1,
                })
                .collect();

            MaintenancePlan {
                insert_position: InsertPosition::At(0),
                removals,
            }
        }
        PlaylistMode::InsertAtBack => {
            let removals = current
                .iter()
                .take(excess)
                .enumerate()
                .map(|(position, id)| Removal {
                    track_id: id.clone(),
                    position,
                })
                .collect();

            MaintenancePlan {
                insert_position: InsertPosition::Append,
                removals,
            }
        }
    }
}

/// The playlist as it should look once `plan` has been applied.
#[cfg(test)]
pub fn apply(current: &[TrackId], new_id: &TrackId, plan: &MaintenancePlan) -> Vec<TrackId> {
    let mut items = current.to_vec();
    match plan.insert_position {
        InsertPosition::At(index) => items.insert(index.min(items.len()), new_id.clone()),
        InsertPosition::Append => items.push(new_id.clone()),
    }

    let mut positions: Vec<usize> = plan.removals.iter().map(|r| r.position).collect();
    positions.sort_unstable_by(|a, b| b.cmp(a));
    for position in positions {
        if position < items.len() {
            items.remove(position);
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<TrackId> {
        names.iter().map(|n| TrackId::from(*n)).collect()
    }

    #[test]
    fn test_front_insert_trims_tail_at_post_insert_positions() {
        let current = ids(&["a", "b", "c", "d", "e"]);
        let new = TrackId::from("new");
        let plan = plan(&current, &new, 3, PlaylistMode::InsertAtFront);

        assert_eq!(plan.insert_position, InsertPosition::At(0));
        assert_eq!(
            plan.removals,
            vec![
                Removal { track_id: "c".into(), position: 3 },
                Removal { track_id: "d".into(), position: 4 },
                Removal { track_id: "e".into(), position: 5 },
            ]
        );
        assert_eq!(apply(&current, &new, &plan), ids(&["new", "a", "b"]));
    }

    #[test]
    fn test_back_insert_trims_head_at_original_positions() {
        let current = ids(&["a", "b", "c", "d", "e"]);
        let new = TrackId::from("new");
        let plan = plan(&current, &new, 3, PlaylistMode::InsertAtBack);

        assert_eq!(plan.insert_position, InsertPosition::Append);
        assert_eq!(
            plan.removals,
            vec![
                Removal { track_id: "a".into(), position: 0 },
                Removal { track_id: "b".into(), position: 1 },
                Removal { track_id: "c".into(), position: 2 },
            ]
        );
        assert_eq!(apply(&current, &new, &plan), ids(&["d", "e", "new"]));
    }

    #[test]
    fn test_single_excess_item() {
        let current = ids(&["a", "b", "c", "d", "e"]);
        let new = TrackId::from("new");

        let front = plan(&current, &new, 5, PlaylistMode::InsertAtFront);
        assert_eq!(front.removals, vec![Removal { track_id: "e".into(), position: 5 }]);

        let back = plan(&current, &new, 5, PlaylistMode::InsertAtBack);
        assert_eq!(back.removals, vec![Removal { track_id: "a".into(), position: 0 }]);
        assert_eq!(apply(&current, &new, &back), ids(&["b", "c", "d", "e", "new"]));
    }

    #[test]
    fn test_no_trim_below_max() {
        let current = ids(&["a", "b"]);
        let new = TrackId::from("c");
        for mode in [PlaylistMode::InsertAtFront, PlaylistMode::InsertAtBack] {
            let plan = plan(&current, &new, 3, mode);
            assert!(!plan.trims());
            assert_eq!(apply(&current, &new, &plan).len(), 3);
        }
    }

    #[test]
    fn test_empty_playlist() {
        let new = TrackId::from("x");
        let plan = plan(&[], &new, 1, PlaylistMode::InsertAtFront);
        assert_eq!(plan.insert_position, InsertPosition::At(0));
        assert!(plan.removals.is_empty());
    }

    #[test]
    fn test_duplicate_ids_removed_by_position() {
        let current = ids(&["x", "a", "x"]);
        let new = TrackId::from("x");
        let plan = plan(&current, &new, 2, PlaylistMode::InsertAtFront);

        assert_eq!(
            plan.removals,
            vec![
                Removal { track_id: "a".into(), position: 2 },
                Removal { track_id: "x".into(), position: 3 },
            ]
        );
        assert_eq!(apply(&current, &new, &plan), ids(&["x", "x"]));
    }

    #[test]
    fn test_new_track_may_repeat_existing_entry() {
        let current = ids(&["a", "b"]);
        let new = TrackId::from("a");
        let plan = plan(&current, &new, 10, PlaylistMode::InsertAtBack);
        assert_eq!(apply(&current, &new, &plan), ids(&["a", "b", "a"]));
    }

    #[test]
    fn test_length_cap_and_newest_end_hold() {
        let current = ids(&["1", "2", "3", "4", "5", "6", "7"]);
        let new = TrackId::from("n");
        for max in 1..=9 {
            let front = apply(&current, &new, &plan(&current, &new, max, PlaylistMode::InsertAtFront));
            assert!(front.len() <= max);
            assert_eq!(front.first(), Some(&new));

            let back = apply(&current, &new, &plan(&current, &new, max, PlaylistMode::InsertAtBack));
            assert!(back.len() <= max);
            assert_eq!(back.last(), Some(&new));
        }
    }
}
