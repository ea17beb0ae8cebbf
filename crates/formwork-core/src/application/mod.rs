//! Application services - dialog workflows, handler registry, controllers

/// Form controllers and layered composition
pub mod controller;

/// The dialog workflow service
pub mod dialog_service;

/// Form event handler registry
pub mod registry;
