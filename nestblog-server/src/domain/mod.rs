pub mod error;
pub mod post;
pub mod reconcile;
pub mod subpost;
pub mod user;

pub use error::DomainError;
pub use post::Post;
pub use subpost::SubPost;
pub use user::User;
