//! Typed relationship declarations and the statements that hydrate them.
//!
//! A [`Relation<P>`] pairs a type-erased [`RelationshipDescriptor`] (what the
//! registry stores) with a typed setter that knows how to turn the fetched
//! rows into the property's collection. The kind of collection is fixed by
//! the constructor that built the relation, so no container inspection
//! happens at run time.
//!
//! [`Relation::plan`] produces the follow-up query for one parent. Executing
//! it and calling [`Relation::attach`] is left to the execution layer.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::entity::{Entity, KeyType, column_value};
use crate::error::{ModelError, Result};
use crate::mapper::{rows_to_entities, rows_to_keyed};
use crate::metadata::{EntityMetadata, EntityRef, RelationshipDescriptor, RelationshipKind};
use crate::query::{Statement, select_children, select_joined};
use crate::registry::{describe, key_column};
use crate::value::{Row, Value};

type Attach<P> = Box<dyn Fn(&mut P, &[Row]) -> Result<()> + Send + Sync>;

/// A relationship property on entity `P`.
///
/// # Examples
///
/// ```ignore
/// fn relations() -> Vec<Relation<Self>> {
///     vec![
///         Relation::one_to_many("books", |author: &mut Author, books| author.books = books),
///         Relation::many_to_many::<Tag, BookTag>("tags", |book: &mut Book, tags| book.tags = tags),
///     ]
/// }
/// ```
pub struct Relation<P> {
    descriptor: RelationshipDescriptor,
    attach: Attach<P>,
}

impl<P: Entity> Relation<P> {
    /// Children of type `T` found through `T`'s foreign key to `P`.
    pub fn one_to_many<T: Entity>(
        property: impl Into<String>,
        assign: impl Fn(&mut P, Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor: descriptor::<T>(property, RelationshipKind::OneToManyList, None),
            attach: Box::new(move |parent, rows| {
                assign(parent, rows_to_entities(rows)?);
                Ok(())
            }),
        }
    }

    /// Like [`one_to_many`](Self::one_to_many), keyed by `T`'s primary key.
    pub fn one_to_many_keyed<K: KeyType, T: Entity>(
        property: impl Into<String>,
        assign: impl Fn(&mut P, HashMap<K, T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor: descriptor::<T>(property, RelationshipKind::OneToManyKeyed, None),
            attach: keyed_attach(assign),
        }
    }

    /// Targets of type `T` linked to `P` through join entity `J`.
    pub fn many_to_many<T: Entity, J: Entity>(
        property: impl Into<String>,
        assign: impl Fn(&mut P, Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor: descriptor::<T>(
                property,
                RelationshipKind::ManyToMany,
                Some(EntityRef::of::<J>()),
            ),
            attach: Box::new(move |parent, rows| {
                assign(parent, rows_to_entities(rows)?);
                Ok(())
            }),
        }
    }

    /// Like [`many_to_many`](Self::many_to_many), keyed by `T`'s primary key.
    pub fn many_to_many_keyed<K: KeyType, T: Entity, J: Entity>(
        property: impl Into<String>,
        assign: impl Fn(&mut P, HashMap<K, T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            descriptor: descriptor::<T>(
                property,
                RelationshipKind::ManyToManyKeyed,
                Some(EntityRef::of::<J>()),
            ),
            attach: keyed_attach(assign),
        }
    }

    /// Single-reference form: children are the rows of `T` whose
    /// `foreign_key` equals the value of `P`'s `column`.
    ///
    /// Only meaningful for one-to-many relations; join relations ignore it.
    pub fn via(mut self, foreign_key: impl Into<String>, column: impl Into<String>) -> Self {
        self.descriptor.foreign_key = Some(foreign_key.into());
        self.descriptor.column = Some(column.into());
        self
    }

    /// Type-erased description stored in the registry.
    pub fn descriptor(&self) -> &RelationshipDescriptor {
        &self.descriptor
    }

    /// Property the collection is assigned to.
    pub fn property(&self) -> &str {
        &self.descriptor.property
    }

    /// Maps `rows` to the target type and assigns them to `parent`.
    ///
    /// # Errors
    ///
    /// Propagates mapping failures; the parent is left untouched.
    pub fn attach(&self, parent: &mut P, rows: &[Row]) -> Result<()> {
        (self.attach)(parent, rows)
    }

    /// The follow-up query that fetches this relation for `parent`.
    ///
    /// # Errors
    ///
    /// [`ModelError::RelationshipConfiguration`] when the expected foreign
    /// key, identity or owning column cannot be found.
    pub fn plan(&self, parent: &P) -> Result<Statement> {
        let parent_meta = describe::<P>()?;
        let target_meta = self.descriptor.target.metadata()?;

        match &self.descriptor.join {
            None => self.plan_direct(parent, &parent_meta, &target_meta),
            Some(join) => {
                let join_meta = join.metadata()?;
                self.plan_joined(parent, &parent_meta, &target_meta, &join_meta)
            }
        }
    }

    fn plan_direct(
        &self,
        parent: &P,
        parent_meta: &EntityMetadata,
        target_meta: &EntityMetadata,
    ) -> Result<Statement> {
        if let (Some(foreign_key), Some(column)) =
            (&self.descriptor.foreign_key, &self.descriptor.column)
        {
            if target_meta.column(foreign_key).is_none() {
                return Err(self.misconfigured(format!(
                    "{} has no column '{foreign_key}'",
                    target_meta.type_name
                )));
            }
            let owner = parent_meta.column(column).ok_or_else(|| {
                self.misconfigured(format!("{} has no column '{column}'", parent_meta.type_name))
            })?;
            let value = column_value(parent, parent_meta, owner)?;
            return Ok(select_children(target_meta, foreign_key, value));
        }

        let fk = target_meta
            .foreign_keys_to(TypeId::of::<P>())
            .next()
            .ok_or_else(|| {
                self.misconfigured(format!(
                    "{} has no foreign key referencing {}",
                    target_meta.type_name, parent_meta.type_name
                ))
            })?;
        let value = self.parent_identity(parent, parent_meta)?;
        Ok(select_children(target_meta, &fk.column, value))
    }

    fn plan_joined(
        &self,
        parent: &P,
        parent_meta: &EntityMetadata,
        target_meta: &EntityMetadata,
        join_meta: &EntityMetadata,
    ) -> Result<Statement> {
        let target_id = self.descriptor.target.type_id();
        let mut to_parent = join_meta.foreign_keys_to(TypeId::of::<P>());
        let fk_to_parent = to_parent.next();
        // A self-join references the parent type twice: first the owner, then the target.
        let fk_to_target = if target_id == TypeId::of::<P>() {
            to_parent.next()
        } else {
            join_meta.foreign_keys_to(target_id).next()
        };

        let (Some(fk_to_parent), Some(fk_to_target)) = (fk_to_parent, fk_to_target) else {
            return Err(self.misconfigured(format!(
                "{} must declare foreign keys to both {} and {}",
                join_meta.type_name, parent_meta.type_name, target_meta.type_name
            )));
        };
        let target_identity = target_meta.identity().ok_or_else(|| {
            self.misconfigured(format!("{} has no identity column", target_meta.type_name))
        })?;
        let value = self.parent_identity(parent, parent_meta)?;

        Ok(select_joined(
            target_meta,
            target_identity.name(),
            join_meta,
            &fk_to_target.column,
            &fk_to_parent.column,
            value,
        ))
    }

    fn parent_identity(&self, parent: &P, parent_meta: &EntityMetadata) -> Result<Value> {
        let identity = parent_meta.identity().ok_or_else(|| {
            self.misconfigured(format!("{} has no identity column", parent_meta.type_name))
        })?;
        column_value(parent, parent_meta, identity)
    }

    fn misconfigured(&self, detail: String) -> ModelError {
        ModelError::RelationshipConfiguration(format!("{}: {detail}", self.descriptor.property))
    }
}

impl<P> fmt::Debug for Relation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn descriptor<T: Entity>(
    property: impl Into<String>,
    kind: RelationshipKind,
    join: Option<EntityRef>,
) -> RelationshipDescriptor {
    RelationshipDescriptor {
        property: property.into(),
        kind,
        target: EntityRef::of::<T>(),
        join,
        foreign_key: None,
        column: None,
    }
}

fn keyed_attach<P, K: KeyType, T: Entity>(
    assign: impl Fn(&mut P, HashMap<K, T>) + Send + Sync + 'static,
) -> Attach<P> {
    Box::new(move |parent, rows| {
        let key = key_column::<K, T>()?;
        assign(parent, rows_to_keyed(rows, &key)?);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::IDENTITY_PARAM;
    use crate::test_support::{Author, Book, Orphan, Person};

    fn relation<P: Entity>(property: &str) -> Relation<P> {
        P::relations()
            .into_iter()
            .find(|r| r.property() == property)
            .unwrap()
    }

    #[test]
    fn test_plan_one_to_many() {
        let author = Author::new(7, "Ursula");
        let stmt = relation::<Author>("books").plan(&author).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM books WHERE author_id = @identity");
        assert_eq!(stmt.params.get(IDENTITY_PARAM), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_plan_many_to_many() {
        let book = Book::new(3, "Dune", 1);
        let stmt = relation::<Book>("tags").plan(&book).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT tags.* FROM tags INNER JOIN book_tags ON book_tags.tag_id = tags.id \
             WHERE book_tags.book_id = @identity"
        );
        assert_eq!(stmt.params.get(IDENTITY_PARAM), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_plan_single_reference() {
        let book = Book::new(3, "Dune", 11);
        let stmt = relation::<Book>("author").plan(&book).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM authors WHERE id = @identity");
        assert_eq!(stmt.params.get(IDENTITY_PARAM), Some(&Value::Integer(11)));
    }

    #[test]
    fn test_plan_self_join_uses_declaration_order() {
        let person = Person::new(4, "Ada");
        let stmt = relation::<Person>("friends").plan(&person).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT people.* FROM people INNER JOIN friendships ON friendships.friend_id = people.id \
             WHERE friendships.person_id = @identity"
        );
    }

    #[test]
    fn test_plan_without_foreign_key_is_configuration_error() {
        let orphan = Orphan::default();
        let err = relation::<Orphan>("tags").plan(&orphan).unwrap_err();
        assert!(matches!(err, ModelError::RelationshipConfiguration(msg) if msg.contains("tags")));
    }

    #[test]
    fn test_attach_assigns_mapped_rows() {
        let mut author = Author::new(7, "Ursula");
        let rows = vec![
            Row::new()
                .with("id", 1_i64)
                .with("title", "A")
                .with("author_id", 7_i64)
                .with("published", Value::Null),
            Row::new()
                .with("id", 2_i64)
                .with("title", "B")
                .with("author_id", 7_i64)
                .with("published", Value::Null),
        ];
        relation::<Author>("books").attach(&mut author, &rows).unwrap();
        let titles: Vec<_> = author.books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[test]
    fn test_attach_keyed() {
        let mut author = Author::new(7, "Ursula");
        let rows = vec![
            Row::new()
                .with("id", 5_i64)
                .with("title", "A")
                .with("author_id", 7_i64),
        ];
        relation::<Author>("books_by_id")
            .attach(&mut author, &rows)
            .unwrap();
        assert_eq!(author.books_by_id[&5].title, "A");
    }

    #[test]
    fn test_attach_failure_leaves_parent_untouched() {
        let mut book = Book::new(1, "Dune", 1);
        let rows = vec![Row::new().with("id", "x")];
        assert!(relation::<Book>("tags").attach(&mut book, &rows).is_err());
        assert!(book.tags.is_empty());
    }

    #[test]
    fn test_descriptor_kinds() {
        assert_eq!(
            relation::<Author>("books").descriptor().kind,
            RelationshipKind::OneToManyList
        );
        assert_eq!(
            relation::<Author>("books_by_id").descriptor().kind,
            RelationshipKind::OneToManyKeyed
        );
        assert!(relation::<Book>("tags").descriptor().kind.is_many_to_many());
    }
}
