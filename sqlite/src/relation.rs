//! Relationship hydration: runs the follow-up query of every declared
//! relation, for every parent, and attaches the results.
//!
//! Resolution is a single hop. Children come back without their own
//! relations; callers wanting a deeper graph resolve the children again.
//! One query is issued per parent and relation.

use sqlentity_core::{Entity, Relation};
use tracing::debug;

use crate::error::Result;
use crate::executor::Executor;

/// Hydrates every relation declared by `P` on each of `parents`.
///
/// # Errors
///
/// Returns [`ModelError::RelationshipConfiguration`](sqlentity_core::ModelError::RelationshipConfiguration)
/// when a relation cannot be planned, or the first execution or mapping
/// failure.
pub fn resolve_relations<'p, P, X>(
    executor: &mut X,
    parents: impl IntoIterator<Item = &'p mut P>,
) -> Result<()>
where
    P: Entity,
    X: Executor + ?Sized,
{
    let relations = P::relations();
    if relations.is_empty() {
        return Ok(());
    }
    for parent in parents {
        for relation in &relations {
            resolve_relation(executor, relation, parent)?;
        }
    }
    Ok(())
}

/// Hydrates one relation on one parent.
///
/// # Errors
///
/// See [`resolve_relations`].
pub fn resolve_relation<P, X>(executor: &mut X, relation: &Relation<P>, parent: &mut P) -> Result<()>
where
    P: Entity,
    X: Executor + ?Sized,
{
    let statement = relation.plan(parent)?;
    debug!(
        relation = relation.property(),
        kind = ?relation.descriptor().kind,
        target = relation.descriptor().target.type_name(),
        "resolving relation"
    );
    let rows = executor.query(&statement.sql, &statement.params)?;
    relation.attach(parent, &rows)?;
    Ok(())
}
