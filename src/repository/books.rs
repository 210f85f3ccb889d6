//! Books repository backed by MongoDB

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{
    database::Connector,
    error::AppResult,
    models::book::{Book, BookQuery, UpdateBook},
};

use super::BookRepository;

pub const COLLECTION: &str = "books";

#[derive(Clone)]
pub struct MongoBookRepository {
    connector: Connector,
}

impl MongoBookRepository {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    async fn collection(&self) -> AppResult<Collection<Book>> {
        Ok(self.connector.database().await?.collection(COLLECTION))
    }

    /// Create the unique ISBN index
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let collection = self.collection().await?;
        let index = IndexModel::builder()
            .keys(doc! { "isbn": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.connector
            .with_deadline(collection.create_index(index, None))
            .await?;
        Ok(())
    }
}

/// `$set` document for a partial update
fn update_document(changes: &UpdateBook) -> Document {
    let mut set = doc! { "updatedAt": bson::DateTime::now() };

    if let Some(title) = &changes.title {
        set.insert("title", title.as_str());
    }
    if let Some(author) = &changes.author {
        set.insert("author", author.as_str());
    }
    if let Some(genre) = changes.genre {
        set.insert("genre", genre.as_str());
    }
    if let Some(isbn) = &changes.isbn {
        set.insert("isbn", isbn.as_str());
    }
    if let Some(description) = &changes.description {
        set.insert("description", description.as_str());
    }
    if let Some(copies) = changes.copies {
        set.insert("copies", i64::from(copies));
    }
    if let Some(available) = changes.available {
        set.insert("available", available);
    }

    set
}

#[async_trait]
impl BookRepository for MongoBookRepository {
    async fn insert(&self, book: Book) -> AppResult<Book> {
        let collection = self.collection().await?;
        self.connector
            .with_deadline(collection.insert_one(&book, None))
            .await?;
        Ok(book)
    }

    async fn find(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let collection = self.collection().await?;

        let filter = match query.filter {
            Some(genre) => doc! { "genre": genre.as_str() },
            None => Document::new(),
        };
        let sort_by = query.sort_by.unwrap_or_default();
        let sort = query.sort.unwrap_or_default();
        let mut order = Document::new();
        order.insert(sort_by.as_field(), sort.as_direction());
        let options = FindOptions::builder()
            .sort(order)
            .limit(i64::from(query.limit()))
            .build();

        self.connector
            .with_deadline(async {
                collection
                    .find(filter, options)
                    .await?
                    .try_collect::<Vec<Book>>()
                    .await
            })
            .await
    }

    async fn get(&self, id: ObjectId) -> AppResult<Option<Book>> {
        let collection = self.collection().await?;
        self.connector
            .with_deadline(collection.find_one(doc! { "_id": id }, None))
            .await
    }

    async fn update(&self, id: ObjectId, changes: UpdateBook) -> AppResult<Option<Book>> {
        let collection = self.collection().await?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.connector
            .with_deadline(collection.find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": update_document(&changes) },
                options,
            ))
            .await
    }

    async fn delete(&self, id: ObjectId) -> AppResult<bool> {
        let collection = self.collection().await?;
        let result = self
            .connector
            .with_deadline(collection.delete_one(doc! { "_id": id }, None))
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn take_copies(&self, id: ObjectId, quantity: u32) -> AppResult<Option<Book>> {
        let collection = self.collection().await?;
        let quantity = i64::from(quantity);
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        // pipeline update so availability follows the decremented count
        let pipeline = vec![
            doc! { "$set": {
                "copies": { "$subtract": ["$copies", quantity] },
                "updatedAt": bson::DateTime::now(),
            } },
            doc! { "$set": { "available": { "$gt": ["$copies", 0] } } },
        ];

        self.connector
            .with_deadline(collection.find_one_and_update(
                doc! { "_id": id, "copies": { "$gte": quantity } },
                pipeline,
                options,
            ))
            .await
    }
}
