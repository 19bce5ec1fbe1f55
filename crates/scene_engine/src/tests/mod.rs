//! Scenario tests spanning the database, render list and transform cache

mod fixtures;
mod layers;
mod library;
