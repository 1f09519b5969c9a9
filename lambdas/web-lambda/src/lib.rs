//! Server-rendered pages of the brand dashboard, served from Lambda.

mod auth_pages;
mod brand_page;
mod dashboard;
mod diagnostics;
pub mod flash;
pub mod gate;
mod http_handler;
mod templates;

pub use http_handler::router;
