pub mod capability;
pub mod codec;
pub mod entities;
pub mod errors;
pub mod events;
pub mod root_version;
pub mod value_objects;
