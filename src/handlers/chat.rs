use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::ApiError;
use crate::handlers::auth::CurrentUser;
use crate::models::chat::{
    ChatListResponse, ConversationResponse, MessageView, SendMessageRequest, SendMessageResponse,
};
use crate::services::messaging::{self, SendOutcome, CONTACT_BLOCKED_NOTICE};
use crate::AppState;

/// GET /bookings/{id}/chat
pub async fn open_conversation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let conversation = messaging::open_conversation(&state.db, user.id(), booking_id).await?;

    Ok(Json(ConversationResponse {
        booking_id: conversation.booking_id,
        messages: conversation.messages.into_iter().map(MessageView::from).collect(),
        unread_count: conversation.unread_count,
    }))
}

/// POST /bookings/{id}/chat
///
/// A filtered or empty message is a warning, not an error: 200 with `sent: false`.
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(booking_id): Path<i32>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let outcome = messaging::send_message(&state.db, user.id(), booking_id, &payload.text).await?;

    let response = match outcome {
        SendOutcome::Sent(message) => SendMessageResponse {
            sent: true,
            notice: "Message sent".to_string(),
            message: Some(MessageView::from(message)),
        },
        SendOutcome::Blocked => SendMessageResponse {
            sent: false,
            notice: CONTACT_BLOCKED_NOTICE.to_string(),
            message: None,
        },
        SendOutcome::Empty => SendMessageResponse {
            sent: false,
            notice: "Message is empty".to_string(),
            message: None,
        },
    };

    Ok(Json(response))
}

/// GET /chats
pub async fn chat_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ChatListResponse>, ApiError> {
    let chats = messaging::chat_list(&state.db, user.id()).await?;
    Ok(Json(ChatListResponse { chats }))
}
