//! Gopher protocol implementation.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  <selector>\r\n
//! Response: <type><display>\t<selector>\t<host>\t<port>\r\n ... .\r\n   (directory)
//!           <raw file bytes>                                           (file)
//!           3<message>\t\t\t\r\n.\r\n                                   (error)
//! ```
//!
//! One selector per connection; the server closes after responding.

pub mod error;
pub mod item_type;
pub mod lister;
pub mod menu;
pub mod resolver;

pub use error::RequestError;
pub use item_type::{ItemType, TypeMap};
pub use lister::Lister;
pub use menu::Listing;
pub use resolver::{read_selector, resolve, ResourceKind};
