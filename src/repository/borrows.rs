//! Borrow records repository backed by MongoDB

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    Collection,
};

use crate::{
    database::Connector,
    error::{AppError, AppResult},
    models::borrow::{Borrow, BorrowSummary},
};

use super::{books, BorrowRepository};

pub const COLLECTION: &str = "borrows";

#[derive(Clone)]
pub struct MongoBorrowRepository {
    connector: Connector,
}

impl MongoBorrowRepository {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    async fn collection(&self) -> AppResult<Collection<Borrow>> {
        Ok(self.connector.database().await?.collection(COLLECTION))
    }
}

fn summary_pipeline() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$book", "totalQuantity": { "$sum": "$quantity" } } },
        doc! { "$lookup": {
            "from": books::COLLECTION,
            "localField": "_id",
            "foreignField": "_id",
            "as": "book",
        } },
        doc! { "$unwind": "$book" },
        doc! { "$project": {
            "_id": 0,
            "book": { "title": "$book.title", "isbn": "$book.isbn" },
            "totalQuantity": 1,
        } },
    ]
}

#[async_trait]
impl BorrowRepository for MongoBorrowRepository {
    async fn insert(&self, borrow: Borrow) -> AppResult<Borrow> {
        let collection = self.collection().await?;
        self.connector
            .with_deadline(collection.insert_one(&borrow, None))
            .await?;
        Ok(borrow)
    }

    async fn summary(&self) -> AppResult<Vec<BorrowSummary>> {
        let collection = self.collection().await?;
        let rows = self
            .connector
            .with_deadline(async {
                collection
                    .aggregate(summary_pipeline(), None)
                    .await?
                    .try_collect::<Vec<Document>>()
                    .await
            })
            .await?;

        rows.into_iter()
            .map(|row| {
                bson::from_document::<BorrowSummary>(row)
                    .map_err(|e| AppError::Internal(format!("Malformed borrow summary: {}", e)))
            })
            .collect()
    }
}
