#[macro_use]
extern crate serde_derive;

pub mod auth;
pub mod batch;
pub mod capabilities;
pub mod cli;
pub mod datatypes;
pub mod devices;
pub mod error;
pub mod protocol;
