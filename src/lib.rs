pub mod domain;
pub mod outbound;
