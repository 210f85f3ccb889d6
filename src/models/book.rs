//! Book model and related types

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::to_utc;

/// Book genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Fiction,
    NonFiction,
    Science,
    History,
    Biography,
    Fantasy,
}

impl Genre {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Fiction => "FICTION",
            Genre::NonFiction => "NON_FICTION",
            Genre::Science => "SCIENCE",
            Genre::History => "HISTORY",
            Genre::Biography => "BIOGRAPHY",
            Genre::Fantasy => "FANTASY",
        }
    }
}

/// Book document as stored in the `books` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub copies: u32,
    pub available: bool,
    pub created_at: bson::DateTime,
    pub updated_at: bson::DateTime,
}

/// Book as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub copies: u32,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.to_hex(),
            title: book.title,
            author: book.author,
            genre: book.genre,
            isbn: book.isbn,
            description: book.description,
            copies: book.copies,
            available: book.available,
            created_at: to_utc(book.created_at),
            updated_at: to_utc(book.updated_at),
        }
    }
}

/// Create book request
#[serde_as]
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    pub genre: Genre,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    pub description: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub copies: u32,
    /// Defaults to `copies > 0`
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub available: Option<bool>,
}

impl CreateBook {
    /// Trim surrounding whitespace from text fields
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            isbn: self.isbn.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            ..self
        }
    }
}

/// Partial book update; absent fields are left unchanged
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    pub genre: Option<Genre>,
    #[validate(length(min = 1, message = "ISBN cannot be empty"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub copies: Option<u32>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub available: Option<bool>,
}

impl UpdateBook {
    pub fn normalized(self) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            title: trim(self.title),
            author: trim(self.author),
            isbn: trim(self.isbn),
            description: trim(self.description),
            // copies drive availability
            available: match self.copies {
                Some(copies) => Some(copies > 0),
                None => self.available,
            },
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == UpdateBook::default()
    }
}

/// Sortable book fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum BookSortField {
    Title,
    Author,
    Genre,
    Isbn,
    Copies,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl BookSortField {
    pub fn as_field(&self) -> &'static str {
        match self {
            BookSortField::Title => "title",
            BookSortField::Author => "author",
            BookSortField::Genre => "genre",
            BookSortField::Isbn => "isbn",
            BookSortField::Copies => "copies",
            BookSortField::CreatedAt => "createdAt",
            BookSortField::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_direction(&self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

/// Book listing query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Only books of this genre
    pub filter: Option<Genre>,
    /// Field to sort by (default: createdAt)
    pub sort_by: Option<BookSortField>,
    /// asc or desc (default: asc)
    pub sort: Option<SortOrder>,
    /// Maximum number of books (default: 10)
    pub limit: Option<u32>,
}

impl BookQuery {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}
