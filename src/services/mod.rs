//! Services layer - Business logic
//!
//! Services sit on top of the repositories and are responsible for:
//! - Implementing business rules (ownership, existence of referenced rows)
//! - Mapping storage failures to typed errors
//! - Applying the delete-or-deactivate policy

pub mod deletion;
pub mod delivery;
pub mod favorite;
pub mod message;
pub mod organization;
pub mod post;
pub mod user;
pub mod watchlist;

pub use deletion::{delete_or_deactivate, DeleteOutcome, DeletionError, USER_DEPENDENTS};
pub use delivery::{DeliveryService, DeliveryServiceError};
pub use favorite::{FavoriteService, FavoriteServiceError};
pub use message::{MessageService, MessageServiceError, NewMessage};
pub use organization::{OrganizationService, OrganizationServiceError, ORGANIZATION_DEPENDENTS};
pub use post::{PostService, PostServiceError, POST_DEPENDENTS, SORTABLE_COLUMNS};
pub use user::{UserService, UserServiceError};
pub use watchlist::{WatchlistService, WatchlistServiceError};
