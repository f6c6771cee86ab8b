pub mod ingredients;
pub mod recipes;
pub mod relations;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;
