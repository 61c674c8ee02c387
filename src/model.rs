pub mod error;
pub mod object;
pub mod raw;
pub mod request;
