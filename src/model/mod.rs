//! Data types shared by the store, the workflow and the web layer.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
