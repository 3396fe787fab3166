//! Per-booking conversation between renter and owner
//!
//! Closed until the booking's commission is paid. Outgoing text that looks
//! like contact details (phone numbers, emails, links) is refused.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

use crate::entities::bookings;
use crate::entities::messages;
use crate::entities::prelude::*;
use crate::error::ServiceError;
use crate::models::chat::{ChatListItem, MessageView};
use crate::services::inventory;

lazy_static! {
    // long digit runs read as phone numbers
    static ref DIGIT_RUN: Regex = Regex::new(r"\d{10,}").unwrap();
    static ref EMAIL: Regex = Regex::new(r"\b[\w\.-]+@[\w\.-]+\.\w+\b").unwrap();
    static ref LINK: Regex = Regex::new(r"(https?://|www\.)\S+").unwrap();
}

pub const CONTACT_BLOCKED_NOTICE: &str = "Sharing contact details or links is not allowed";

pub fn contains_contact_info(text: &str) -> bool {
    DIGIT_RUN.is_match(text) || EMAIL.is_match(text) || LINK.is_match(text)
}

#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent(messages::Model),
    /// Refused by the contact filter; nothing stored
    Blocked,
    /// Blank text; nothing stored
    Empty,
}

/// A booking the caller is allowed to talk on, with both parties resolved
struct Channel {
    booking: bookings::Model,
    owner_id: i32,
}

impl Channel {
    fn other_party(&self, user_id: i32) -> i32 {
        if user_id == self.booking.user_id {
            self.owner_id
        } else {
            self.booking.user_id
        }
    }
}

async fn open_channel(
    db: &DatabaseConnection,
    user_id: i32,
    booking_id: i32,
) -> Result<Channel, ServiceError> {
    let booking = Bookings::find_by_id(booking_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

    let owner_id = inventory::owner_of_bed(db, booking.bed_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Listing for booking {} not found", booking_id)))?;

    if user_id != booking.user_id && user_id != owner_id {
        return Err(ServiceError::Forbidden(
            "You are not a participant in this conversation".to_string(),
        ));
    }

    if !booking.is_paid() {
        return Err(ServiceError::PaymentRequired(
            "The commission must be paid before the chat opens".to_string(),
        ));
    }

    Ok(Channel { booking, owner_id })
}

pub async fn send_message(
    db: &DatabaseConnection,
    sender_id: i32,
    booking_id: i32,
    text: &str,
) -> Result<SendOutcome, ServiceError> {
    let channel = open_channel(db, sender_id, booking_id).await?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(SendOutcome::Empty);
    }
    if contains_contact_info(text) {
        tracing::info!(booking_id, sender_id, "Message blocked by contact filter");
        return Ok(SendOutcome::Blocked);
    }

    let message = messages::ActiveModel {
        booking_id: Set(channel.booking.id),
        sender_id: Set(sender_id),
        receiver_id: Set(channel.other_party(sender_id)),
        text: Set(text.to_string()),
        sent_at: Set(Utc::now()),
        is_read: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::debug!(booking_id, message_id = message.id, "Message sent");
    Ok(SendOutcome::Sent(message))
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub booking_id: i32,
    pub messages: Vec<messages::Model>,
    /// Unread messages addressed to the viewer before this open
    pub unread_count: u64,
}

/// Oldest-first history; marks what was addressed to the viewer as read
pub async fn open_conversation(
    db: &DatabaseConnection,
    viewer_id: i32,
    booking_id: i32,
) -> Result<Conversation, ServiceError> {
    let channel = open_channel(db, viewer_id, booking_id).await?;

    let unread_count = Messages::find()
        .filter(messages::Column::BookingId.eq(channel.booking.id))
        .filter(messages::Column::ReceiverId.eq(viewer_id))
        .filter(messages::Column::IsRead.eq(false))
        .count(db)
        .await?;

    if unread_count > 0 {
        Messages::update_many()
            .set(messages::ActiveModel {
                is_read: Set(true),
                ..Default::default()
            })
            .filter(messages::Column::BookingId.eq(channel.booking.id))
            .filter(messages::Column::ReceiverId.eq(viewer_id))
            .filter(messages::Column::IsRead.eq(false))
            .exec(db)
            .await?;
    }

    let messages = Messages::find()
        .filter(messages::Column::BookingId.eq(channel.booking.id))
        .order_by_asc(messages::Column::SentAt)
        .order_by_asc(messages::Column::Id)
        .all(db)
        .await?;

    Ok(Conversation {
        booking_id: channel.booking.id,
        messages,
        unread_count,
    })
}

/// Every booking the user has exchanged messages on, most recent first
pub async fn chat_list(db: &DatabaseConnection, user_id: i32) -> Result<Vec<ChatListItem>, ServiceError> {
    let involved = Messages::find()
        .filter(
            Condition::any()
                .add(messages::Column::SenderId.eq(user_id))
                .add(messages::Column::ReceiverId.eq(user_id)),
        )
        .order_by_desc(messages::Column::SentAt)
        .order_by_desc(messages::Column::Id)
        .all(db)
        .await?;

    let mut order: Vec<i32> = Vec::new();
    let mut chats: HashMap<i32, ChatListItem> = HashMap::new();

    for message in involved {
        let unread = message.receiver_id == user_id && !message.is_read;
        let chat = chats.entry(message.booking_id).or_insert_with(|| {
            order.push(message.booking_id);
            let other = if message.sender_id == user_id {
                message.receiver_id
            } else {
                message.sender_id
            };
            ChatListItem {
                booking_id: message.booking_id,
                other_user_id: Some(other),
                last_message: Some(MessageView::from(message.clone())),
                unread_count: 0,
            }
        });
        if unread {
            chat.unread_count += 1;
        }
    }

    Ok(order.into_iter().filter_map(|id| chats.remove(&id)).collect())
}
