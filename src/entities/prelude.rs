//! `SeaORM` Entity prelude

pub use super::apartments::Entity as Apartments;
pub use super::beds::Entity as Beds;
pub use super::booking_orders::Entity as BookingOrders;
pub use super::bookings::Entity as Bookings;
pub use super::manual_payments::Entity as ManualPayments;
pub use super::messages::Entity as Messages;
pub use super::payments::Entity as Payments;
pub use super::rooms::Entity as Rooms;
pub use super::seller_verifications::Entity as SellerVerifications;
pub use super::users::Entity as Users;
pub use super::webhook_events::Entity as WebhookEvents;
