pub mod health;
pub mod migrate;
pub mod newsletter;
pub mod pages;
