use std::collections::HashSet;

use crate::domain::subpost::{NewSubPost, SubPostFragment};
use crate::domain::DomainError;

/// One write against a post's child collection, produced by [`plan_nested_writes`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubPostWrite {
    Create(NewSubPost),
    Update {
        id: i64,
        title: Option<String>,
        body: Option<String>,
    },
}

/// The full set of operations that makes a post's persisted children match a
/// submitted list. Applied inside a single transaction or not at all.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcilePlan {
    pub writes: Vec<SubPostWrite>,
    pub deletes: Vec<i64>,
}

/// Classifies each submitted fragment against the ids currently owned by the
/// post:
///
/// - a fragment whose id is among `existing` becomes an in-place update of the
///   fields it carries (a carried field must not be blank);
/// - a fragment without an id becomes a new child (title and body required);
/// - a fragment with an id that is NOT among `existing` aborts the whole
///   operation with a not-found error, whether the id belongs to another post
///   or to nothing at all;
/// - every existing id missing from the submission is deleted.
pub fn plan_nested_writes(
    existing: &[i64],
    submitted: &[SubPostFragment],
) -> Result<ReconcilePlan, DomainError> {
    let existing_set: HashSet<i64> = existing.iter().copied().collect();
    let mut submitted_ids: HashSet<i64> = HashSet::new();
    let mut writes = Vec::with_capacity(submitted.len());

    for fragment in submitted {
        match fragment.id {
            Some(id) if existing_set.contains(&id) => {
                validate_update(fragment)?;
                submitted_ids.insert(id);
                writes.push(SubPostWrite::Update {
                    id,
                    title: fragment.title.clone(),
                    body: fragment.body.clone(),
                });
            }
            Some(id) => return Err(DomainError::SubPostNotFound(id)),
            None => writes.push(SubPostWrite::Create(validate_new(fragment)?)),
        }
    }

    let deletes = existing
        .iter()
        .copied()
        .filter(|id| !submitted_ids.contains(id))
        .collect();

    Ok(ReconcilePlan { writes, deletes })
}

/// Creation path: a fresh post has no children yet, so every fragment becomes
/// a new child and any id it carries has no meaning and is ignored.
pub fn plan_initial_subposts(
    submitted: &[SubPostFragment],
) -> Result<Vec<NewSubPost>, DomainError> {
    submitted.iter().map(validate_new).collect()
}

// An update may omit a field, but a field it does carry gets the same
// non-blank check as the creation path.
fn validate_update(fragment: &SubPostFragment) -> Result<(), DomainError> {
    if let Some(title) = &fragment.title {
        if title.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Subpost title cannot be empty".to_string(),
            ));
        }
    }
    if let Some(body) = &fragment.body {
        if body.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Subpost body cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_new(fragment: &SubPostFragment) -> Result<NewSubPost, DomainError> {
    let title = match &fragment.title {
        Some(title) if !title.trim().is_empty() => title.clone(),
        _ => {
            return Err(DomainError::ValidationError(
                "Subpost title is required".to_string(),
            ))
        }
    };
    let body = match &fragment.body {
        Some(body) if !body.trim().is_empty() => body.clone(),
        _ => {
            return Err(DomainError::ValidationError(
                "Subpost body is required".to_string(),
            ))
        }
    };
    Ok(NewSubPost { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: Option<i64>, title: Option<&str>, body: Option<&str>) -> SubPostFragment {
        SubPostFragment {
            id,
            title: title.map(String::from),
            body: body.map(String::from),
        }
    }

    #[test]
    fn empty_submission_deletes_everything() {
        let plan = plan_nested_writes(&[1, 2, 3], &[]).unwrap();
        assert!(plan.writes.is_empty());
        assert_eq!(plan.deletes, vec![1, 2, 3]);
    }

    #[test]
    fn known_id_becomes_partial_update() {
        let plan = plan_nested_writes(&[7], &[fragment(Some(7), Some("new title"), None)]).unwrap();
        assert_eq!(
            plan.writes,
            vec![SubPostWrite::Update {
                id: 7,
                title: Some("new title".to_string()),
                body: None,
            }]
        );
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn missing_id_becomes_create() {
        let plan = plan_nested_writes(&[], &[fragment(None, Some("t"), Some("b"))]).unwrap();
        assert_eq!(
            plan.writes,
            vec![SubPostWrite::Create(NewSubPost {
                title: "t".to_string(),
                body: "b".to_string(),
            })]
        );
    }

    #[test]
    fn mixed_submission_updates_creates_and_deletes() {
        // Keep 1 (renamed), drop 2, add a fresh child.
        let plan = plan_nested_writes(
            &[1, 2],
            &[
                fragment(Some(1), Some("renamed"), None),
                fragment(None, Some("t3"), Some("b3")),
            ],
        )
        .unwrap();
        assert_eq!(plan.writes.len(), 2);
        assert_eq!(plan.deletes, vec![2]);
    }

    #[test]
    fn unowned_id_is_a_hard_error() {
        let err = plan_nested_writes(&[1], &[fragment(Some(99), Some("t"), Some("b"))]).unwrap_err();
        assert!(matches!(err, DomainError::SubPostNotFound(99)));
    }

    #[test]
    fn unowned_id_aborts_even_when_other_fragments_are_valid() {
        let err = plan_nested_writes(
            &[1],
            &[
                fragment(Some(1), Some("fine"), None),
                fragment(Some(2), None, None),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::SubPostNotFound(2)));
    }

    #[test]
    fn update_rejects_blank_fields() {
        let err = plan_nested_writes(&[1], &[fragment(Some(1), Some(" "), None)]).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));

        let err = plan_nested_writes(&[1], &[fragment(Some(1), None, Some(""))]).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[test]
    fn create_requires_title_and_body() {
        let err = plan_nested_writes(&[], &[fragment(None, Some("t"), None)]).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));

        let err = plan_nested_writes(&[], &[fragment(None, None, Some("b"))]).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    #[test]
    fn initial_subposts_ignore_client_supplied_ids() {
        let subposts = plan_initial_subposts(&[
            fragment(Some(42), Some("t1"), Some("b1")),
            fragment(None, Some("t2"), Some("b2")),
        ])
        .unwrap();
        assert_eq!(subposts.len(), 2);
        assert_eq!(subposts[0].title, "t1");
        assert_eq!(subposts[1].title, "t2");
    }

    #[test]
    fn initial_subposts_require_full_fields() {
        let err = plan_initial_subposts(&[fragment(None, Some(" "), Some("b"))]).unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }
}
