//! External collaborators: the index source and the mail transport.

pub mod index;
pub mod mailer;

pub use index::{HttpIndexFetcher, IndexFetcher, IndexPage, parse_index_rows};
pub use mailer::{Mailer, OutboxMailer, SmtpMailer};
