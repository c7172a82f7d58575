pub mod person;
pub mod photo;
pub mod replies;

pub use person::*;
pub use photo::*;
pub use replies::*;
