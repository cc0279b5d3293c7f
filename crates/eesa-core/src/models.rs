//! Domain models for the EESA portal.

pub mod academics;
pub mod alumni;
pub mod approval;
pub mod audit;
pub mod events;
pub mod gallery;
pub mod group;
pub mod permission;
pub mod placements;
pub mod principal;
pub mod projects;
pub mod record;
pub mod reviewer;
pub mod student;
pub mod user;
