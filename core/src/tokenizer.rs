//! Comma tokenization of the post-timestamp portion of a line.
//!
//! Standard events never contain unescaped commas inside a column, so a
//! flat split is enough. COMBATANT_INFO embeds nested bracket/paren
//! literals whose interior commas must not split, so it gets a depth-aware
//! scan instead.

/// Flat split on commas, trimming each field. Used for every event except
/// the combatant snapshot.
pub fn split_flat(text: &str) -> Vec<&str> {
    text.split(',').map(str::trim).collect()
}

/// Depth-aware split: commas inside `[...]` or `(...)` stay within their
/// field. Unbalanced closers clamp at depth zero rather than going
/// negative, so a stray `]` cannot flip the meaning of later commas.
pub fn split_nested(text: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut square = 0u32;
    let mut paren = 0u32;
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        match ch {
            '[' => square += 1,
            ']' => square = square.saturating_sub(1),
            '(' => paren += 1,
            ')' => paren = paren.saturating_sub(1),
            ',' if square == 0 && paren == 0 => {
                fields.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }
    fields.push(text[start..].trim());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_split_trims() {
        assert_eq!(
            split_flat("SWING_DAMAGE, Player-1 ,\"Name\""),
            vec!["SWING_DAMAGE", "Player-1", "\"Name\""]
        );
    }

    #[test]
    fn nested_commas_do_not_split() {
        // 6 interior commas, exactly one top-level field.
        assert_eq!(split_nested("[(1,2,(3,4),()),(5,6,(),())]").len(), 1);
        assert_eq!(
            split_nested("a,[(1,2),(3,4)],b"),
            vec!["a", "[(1,2),(3,4)]", "b"]
        );
    }

    #[test]
    fn mixed_brackets_track_independently() {
        assert_eq!(
            split_nested("[1,(2,3)],(4,[5,6]),7"),
            vec!["[1,(2,3)]", "(4,[5,6])", "7"]
        );
    }

    #[test]
    fn unbalanced_closer_is_clamped() {
        assert_eq!(split_nested("a],b"), vec!["a]", "b"]);
    }

    #[test]
    fn empty_fields_survive() {
        assert_eq!(split_nested("a,,b"), vec!["a", "", "b"]);
    }
}
