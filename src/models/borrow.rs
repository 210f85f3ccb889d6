//! Borrow record model and related types

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use utoipa::ToSchema;
use validator::Validate;

use super::to_utc;

/// Borrow document as stored in the `borrows` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Borrow {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub book: ObjectId,
    pub quantity: u32,
    pub due_date: bson::DateTime,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

/// Borrow record as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowView {
    #[serde(rename = "_id")]
    pub id: String,
    /// Borrowed book ID
    pub book: String,
    pub quantity: u32,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Borrow> for BorrowView {
    fn from(borrow: Borrow) -> Self {
        Self {
            id: borrow.id.to_hex(),
            book: borrow.book.to_hex(),
            quantity: borrow.quantity,
            due_date: to_utc(borrow.due_date),
            created_at: to_utc(borrow.created_at),
            updated_at: to_utc(borrow.updated_at),
        }
    }
}

/// Borrow request
#[serde_as]
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBorrow {
    /// Book ID
    #[validate(length(min = 1, message = "Book ID is required"))]
    pub book: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    pub due_date: DateTime<Utc>,
}

/// Title and ISBN of a borrowed book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookRef {
    pub title: String,
    pub isbn: String,
}

/// Total borrowed quantity per book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowSummary {
    pub book: BookRef,
    pub total_quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_quantity_is_rejected() {
        let request: CreateBorrow = serde_json::from_value(json!({
            "book": ObjectId::new().to_hex(),
            "quantity": 0,
            "dueDate": "2026-11-01T00:00:00Z"
        }))
        .unwrap();

        assert!(request.validate().is_err());
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = BorrowSummary {
            book: BookRef {
                title: "Dune".into(),
                isbn: "9780441172719".into(),
            },
            total_quantity: 3,
        };

        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            json!({ "book": { "title": "Dune", "isbn": "9780441172719" }, "totalQuantity": 3 })
        );
    }
}
