pub mod body;
pub mod body_properties;
pub mod bounding_box_helpers;
pub mod collidables;
pub mod collision_detection;
pub mod collision_filter;
pub mod collision_world;
pub mod settings;
pub mod trees;
