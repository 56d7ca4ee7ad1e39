//! Entities: identity, lifecycle state and field-level dirty tracking.

mod handle;
mod key;
mod record;
mod state;

pub use handle::Entity;
pub use key::EntityKey;
pub use record::Record;
pub use state::EntityState;
