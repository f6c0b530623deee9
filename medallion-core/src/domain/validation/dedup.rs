// medallion-core/src/domain/validation/dedup.rs

use std::collections::HashMap;

use super::rejection::Rejection;
use crate::domain::record::Entity;

/// Keeps the latest arrival per natural key. Rows are walked newest-first; a
/// row is superseded as soon as any of its keys was already claimed by a
/// later survivor. Both outputs come back in arrival order.
pub fn resolve_duplicates<E: Entity>(
    candidates: Vec<(u64, E)>,
) -> (Vec<(u64, E)>, Vec<(u64, Rejection)>) {
    let mut ordered = candidates;
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    let mut claimed: HashMap<String, u64> = HashMap::new();
    let mut survivors = Vec::with_capacity(ordered.len());
    let mut superseded = Vec::new();

    for (seq, record) in ordered {
        let keys = record.natural_keys();
        if let Some((key, winner)) = keys
            .iter()
            .find_map(|k| claimed.get(k).map(|w| (k, *w)))
        {
            superseded.push((
                seq,
                Rejection::new(
                    "superseded",
                    None,
                    format!("{} superseded by row {}", key, winner),
                ),
            ));
            continue;
        }
        for key in keys {
            claimed.insert(key, seq);
        }
        survivors.push((seq, record));
    }

    survivors.reverse();
    superseded.reverse();
    (survivors, superseded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::entities::Supplier;

    fn supplier(id: i64, email: &str) -> Supplier {
        Supplier {
            supplier_id: id,
            supplier_name: None,
            contact_email: email.to_string(),
            phone_number: None,
        }
    }

    #[test]
    fn test_latest_arrival_wins_on_shared_email() {
        let (kept, dropped) =
            resolve_duplicates(vec![(0, supplier(1, "a@x.io")), (1, supplier(2, "a@x.io"))]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].1.supplier_id, 2);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, 0);
        assert_eq!(dropped[0].1.code, "superseded");
    }

    #[test]
    fn test_any_shared_key_supersedes() {
        // Row 0 shares its id with row 2 and nothing with row 1.
        let (kept, dropped) = resolve_duplicates(vec![
            (0, supplier(1, "a@x.io")),
            (1, supplier(2, "b@x.io")),
            (2, supplier(1, "c@x.io")),
        ]);
        let kept_seqs: Vec<u64> = kept.iter().map(|(s, _)| *s).collect();
        assert_eq!(kept_seqs, vec![1, 2]);
        assert_eq!(dropped.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_superseded_rows_do_not_claim_keys() {
        // Row 1 loses to row 2 on email; its id must not knock out row 0.
        let (kept, _) = resolve_duplicates(vec![
            (0, supplier(7, "first@x.io")),
            (1, supplier(7, "dup@x.io")),
            (2, supplier(8, "dup@x.io")),
        ]);
        let kept_seqs: Vec<u64> = kept.iter().map(|(s, _)| *s).collect();
        assert_eq!(kept_seqs, vec![0, 2]);
    }
}
