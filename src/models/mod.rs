pub mod cart;
pub mod comment;
pub mod event;
pub mod purchase;
pub mod rating;
pub mod user;

pub use cart::{CartItem, ShoppingCart};
pub use comment::EventComment;
pub use event::{Event, EventSummary, EVENT_CATEGORIES};
pub use purchase::TicketPurchase;
pub use rating::EventRating;
pub use user::{Role, User};
