//! Data models
//!
//! Database entities of the marketplace (organizations, users, posts and the
//! rows that hang off them), their typed column enums and the input types
//! that create or change them.

mod calendar;
mod category;
mod delivery;
mod entity;
mod event;
mod favorite;
mod message;
mod organization;
mod pagination;
mod post;
mod user;
mod watchlist;

pub use calendar::{Calendar, CalendarColumn, CreateCalendarInput};
pub use category::{Category, CategoryColumn, CreateCategoryInput};
pub use delivery::{CreateDeliveryInput, Delivery, DeliveryColumn, DELIVERY_COMPLETE};
pub use entity::{Changes, Changeset, Column, Entity, EntityKind, Insertable};
pub use event::{CreateEventInput, Event, EventColumn};
pub use favorite::{CreateFavoriteInput, Favorite, FavoriteColumn};
pub use message::{
    CreateMessageInput, CreateMessageThreadInput, Message, MessageColumn, MessageThread,
    MessageThreadColumn,
};
pub use organization::{CreateOrganizationInput, Organization, OrganizationColumn};
pub use pagination::{Page, PagedResult};
pub use post::{CreatePostInput, Post, PostColumn, UpdatePostInput, POST_STATUS_ACTIVE};
pub use user::{CreateUserInput, UpdateUserInput, User, UserColumn};
pub use watchlist::{CreateWatchlistInput, Watchlist, WatchlistColumn};
