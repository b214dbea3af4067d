//! Askama views and the view models they render.

pub mod views;
