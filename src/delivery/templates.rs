//! HTML bodies for the two purchaser emails, rendered from `templates/email/`.

use askama::Template;

use crate::book::BookMetadata;

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
pub struct OrderConfirmationEmail<'a> {
    pub book: &'a BookMetadata,
}

#[derive(Template)]
#[template(path = "email/book_ready.html")]
pub struct BookReadyEmail<'a> {
    pub book: &'a BookMetadata,
}

pub fn order_confirmation(book: &BookMetadata) -> askama::Result<String> {
    OrderConfirmationEmail { book }.render()
}

pub fn book_ready(book: &BookMetadata) -> askama::Result<String> {
    BookReadyEmail { book }.render()
}
