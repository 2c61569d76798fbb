//! Entity fixtures shared by the unit tests.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::entity::Entity;
use crate::error::Result;
use crate::metadata::{Column, ConflictPolicy, ReferentialAction, TableSchema};
use crate::relation::Relation;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub books: Vec<Book>,
    pub books_by_id: HashMap<i64, Book>,
}

impl Author {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Author {
    fn schema() -> TableSchema {
        TableSchema::new("authors")
            .column(Column::id("id"))
            .column(Column::text("name"))
            .column(Column::text("email").nullable().unique())
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "email" => Some(self.email.clone().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "name" => self.name = value.decode()?,
            "email" => self.email = value.decode()?,
            _ => {}
        }
        Ok(())
    }

    fn relations() -> Vec<Relation<Self>> {
        vec![
            Relation::one_to_many::<Book>("books", |author: &mut Author, books| author.books = books),
            Relation::one_to_many_keyed::<i64, Book>("books_by_id", |author: &mut Author, books| {
                author.books_by_id = books
            }),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub published: Option<NaiveDateTime>,
    pub tags: Vec<Tag>,
    pub author: Option<Author>,
}

impl Book {
    pub fn new(id: i64, title: &str, author_id: i64) -> Self {
        Self {
            id,
            title: title.to_string(),
            author_id,
            ..Self::default()
        }
    }
}

impl Entity for Book {
    fn schema() -> TableSchema {
        TableSchema::new("books")
            .column(Column::id("id"))
            .column(Column::text("title"))
            .column(
                Column::integer("author_id")
                    .references::<Author>("id")
                    .on_delete(ReferentialAction::Cascade),
            )
            .column(Column::timestamp("published").nullable())
            .unique(&["author_id", "title"], ConflictPolicy::Abort)
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "title" => Some(self.title.as_str().into()),
            "author_id" => Some(self.author_id.into()),
            "published" => Some(self.published.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "title" => self.title = value.decode()?,
            "author_id" => self.author_id = value.decode()?,
            "published" => self.published = value.decode()?,
            _ => {}
        }
        Ok(())
    }

    fn relations() -> Vec<Relation<Self>> {
        vec![
            Relation::many_to_many::<Tag, BookTag>("tags", |book: &mut Book, tags| book.tags = tags),
            Relation::one_to_many::<Author>("author", |book: &mut Book, authors: Vec<Author>| {
                book.author = authors.into_iter().next()
            })
            .via("id", "author_id"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

impl Entity for Tag {
    fn schema() -> TableSchema {
        TableSchema::new("tags")
            .column(Column::id("id"))
            .column(Column::text("label").unique())
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "label" => Some(self.label.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "label" => self.label = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookTag {
    pub book_id: i64,
    pub tag_id: i64,
}

impl BookTag {
    pub fn new(book_id: i64, tag_id: i64) -> Self {
        Self { book_id, tag_id }
    }
}

impl Entity for BookTag {
    fn schema() -> TableSchema {
        TableSchema::new("book_tags")
            .column(
                Column::integer("book_id")
                    .primary_key()
                    .references::<Book>("id")
                    .on_delete(ReferentialAction::Cascade),
            )
            .column(
                Column::integer("tag_id")
                    .primary_key()
                    .references::<Tag>("id")
                    .on_delete(ReferentialAction::Cascade),
            )
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "book_id" => Some(self.book_id.into()),
            "tag_id" => Some(self.tag_id.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "book_id" => self.book_id = value.decode()?,
            "tag_id" => self.tag_id = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// Identity without a primary key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyless {
    pub id: i64,
    pub label: String,
}

impl Keyless {
    pub fn new(label: &str) -> Self {
        Self {
            id: 0,
            label: label.to_string(),
        }
    }
}

impl Entity for Keyless {
    fn schema() -> TableSchema {
        TableSchema::new("keyless")
            .column(Column::integer("id").identity())
            .column(Column::text("label"))
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "label" => Some(self.label.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "label" => self.label = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// Nothing but an identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub id: i64,
}

impl Entity for Counter {
    fn schema() -> TableSchema {
        TableSchema::new("counters").column(Column::integer("id").identity())
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        (property == "id").then(|| self.id.into())
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        if property == "id" {
            self.id = value.decode()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flagged {
    pub id: i64,
    pub flag: bool,
    pub checked: NaiveDateTime,
}

impl Entity for Flagged {
    fn schema() -> TableSchema {
        TableSchema::new("flagged")
            .column(Column::id("id"))
            .column(Column::boolean("flag"))
            .column(Column::timestamp("checked"))
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "flag" => Some(self.flag.into()),
            "checked" => Some(self.checked.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "flag" => self.flag = value.decode()?,
            "checked" => self.checked = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// Cannot be built from a row.
#[derive(Debug)]
pub struct Opaque;

impl Entity for Opaque {
    fn schema() -> TableSchema {
        TableSchema::new("opaque").column(Column::id("id"))
    }

    fn blank() -> Option<Self> {
        None
    }

    fn get(&self, _property: &str) -> Option<Value> {
        None
    }

    fn set(&mut self, _property: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub friends: Vec<Person>,
}

impl Person {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            friends: Vec::new(),
        }
    }
}

impl Entity for Person {
    fn schema() -> TableSchema {
        TableSchema::new("people")
            .column(Column::id("id"))
            .column(Column::text("name"))
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "id" => self.id = value.decode()?,
            "name" => self.name = value.decode()?,
            _ => {}
        }
        Ok(())
    }

    fn relations() -> Vec<Relation<Self>> {
        vec![Relation::many_to_many::<Person, Friendship>(
            "friends",
            |person: &mut Person, friends| person.friends = friends,
        )]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Friendship {
    pub person_id: i64,
    pub friend_id: i64,
}

impl Entity for Friendship {
    fn schema() -> TableSchema {
        TableSchema::new("friendships")
            .column(
                Column::integer("person_id")
                    .primary_key()
                    .references::<Person>("id"),
            )
            .column(
                Column::integer("friend_id")
                    .primary_key()
                    .references::<Person>("id"),
            )
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "person_id" => Some(self.person_id.into()),
            "friend_id" => Some(self.friend_id.into()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        match property {
            "person_id" => self.person_id = value.decode()?,
            "friend_id" => self.friend_id = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// Declares a join relation through a join type that does not reference it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Orphan {
    pub id: i64,
    pub tags: Vec<Tag>,
}

impl Entity for Orphan {
    fn schema() -> TableSchema {
        TableSchema::new("orphans").column(Column::id("id"))
    }

    fn blank() -> Option<Self> {
        Some(Self::default())
    }

    fn get(&self, property: &str) -> Option<Value> {
        (property == "id").then(|| self.id.into())
    }

    fn set(&mut self, property: &str, value: Value) -> Result<()> {
        if property == "id" {
            self.id = value.decode()?;
        }
        Ok(())
    }

    fn relations() -> Vec<Relation<Self>> {
        vec![Relation::many_to_many::<Tag, BookTag>(
            "tags",
            |orphan: &mut Orphan, tags| orphan.tags = tags,
        )]
    }
}
