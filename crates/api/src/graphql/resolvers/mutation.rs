use async_graphql::{Context, ID, Object};
use axum::http::header::SET_COOKIE;
use chrono::Utc;

use trackytronics_core::{CartItemId, ItemId, UserId};

use crate::error::{ApiError, clear_sentry_user, set_sentry_user};
use crate::graphql::types::{CartItem, Item, Order, Review, SuccessMessage, User};
use crate::graphql::{GraphqlResultExt, identity, parse_id, state};
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::contact::{CONTACT_CONFIRMATION, send_contact_request};
use crate::services::items::{ItemDraft, ItemService};
use crate::services::reset::ResetService;
use crate::state::AppState;

/// Root mutation object.
pub struct Mutation;

/// Set the session cookie for a freshly authenticated user.
fn start_session(ctx: &Context<'_>, state: &AppState, user_id: UserId) -> async_graphql::Result<()> {
    let cookie = state
        .sessions()
        .session_cookie(user_id)
        .map_err(ApiError::from)
        .graphql()?;
    ctx.append_http_header(SET_COOKIE, cookie);
    set_sentry_user(&user_id);
    Ok(())
}

#[Object]
impl Mutation {
    /// List a new item, sold by the caller.
    async fn create_item(
        &self,
        ctx: &Context<'_>,
        title: String,
        description: String,
        price: i64,
        image: Option<String>,
        large_image: Option<String>,
    ) -> async_graphql::Result<Item> {
        let state = state(ctx)?;
        let draft = ItemDraft {
            title,
            description,
            price,
            image,
            large_image,
        };
        let item = ItemService::new(state.store())
            .create(identity(ctx), draft)
            .await
            .graphql()?;
        Ok(item.into())
    }

    /// Delete an item, returning it. Owner, `ADMIN` or `ITEMDELETE` only.
    async fn delete_item(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Item> {
        let state = state(ctx)?;
        let id: ItemId = parse_id(&id).graphql()?;
        let item = ItemService::new(state.store())
            .delete(identity(ctx), id)
            .await
            .graphql()?;
        Ok(item.into())
    }

    /// Change the supplied fields of an item. Owner, `ADMIN` or `ITEMUPDATE` only.
    async fn edit_item(
        &self,
        ctx: &Context<'_>,
        id: ID,
        title: Option<String>,
        description: Option<String>,
        price: Option<i64>,
    ) -> async_graphql::Result<Item> {
        let state = state(ctx)?;
        let id: ItemId = parse_id(&id).graphql()?;
        let item = ItemService::new(state.store())
            .edit(identity(ctx), id, title, description, price)
            .await
            .graphql()?;
        Ok(item.into())
    }

    async fn signup(
        &self,
        ctx: &Context<'_>,
        email: String,
        name: String,
        password: String,
    ) -> async_graphql::Result<User> {
        let state = state(ctx)?;
        let user = AuthService::new(state.store())
            .signup(&email, &name, &password)
            .await
            .map_err(ApiError::from)
            .graphql()?;
        start_session(ctx, state, user.id)?;
        Ok(user.into())
    }

    async fn signin(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<User> {
        let state = state(ctx)?;
        let user = AuthService::new(state.store())
            .signin(&email, &password)
            .await
            .map_err(ApiError::from)
            .graphql()?;
        start_session(ctx, state, user.id)?;
        Ok(user.into())
    }

    async fn signout(&self, ctx: &Context<'_>) -> async_graphql::Result<SuccessMessage> {
        let state = state(ctx)?;
        let cookie = state.sessions().clear().map_err(ApiError::from).graphql()?;
        ctx.append_http_header(SET_COOKIE, cookie);
        clear_sentry_user();
        Ok(SuccessMessage::new("See you next time!"))
    }

    /// Add one of an item to the caller's cart.
    async fn add_to_cart(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<CartItem> {
        let state = state(ctx)?;
        let id: ItemId = parse_id(&id).graphql()?;
        let line = CartService::new(state.store())
            .add(identity(ctx), id)
            .await
            .graphql()?;
        Ok(line.into())
    }

    /// Remove a line from the caller's cart, returning it.
    async fn remove_from_cart(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<CartItem> {
        let state = state(ctx)?;
        let id: CartItemId = parse_id(&id).graphql()?;
        let line = CartService::new(state.store())
            .remove(identity(ctx), id)
            .await
            .graphql()?;
        Ok(line.into())
    }

    /// Charge the caller's cart with a card token and record the order.
    ///
    /// `total` is accepted for older clients but never trusted.
    async fn create_order(
        &self,
        ctx: &Context<'_>,
        token: String,
        total: Option<i64>,
    ) -> async_graphql::Result<Order> {
        let state = state(ctx)?;
        let order = CheckoutService::new(
            state.store(),
            state.payments(),
            state.config().checkout_currency,
        )
        .create_order(identity(ctx), &token, total)
        .await
        .graphql()?;
        Ok(order.into())
    }

    /// Decrement a cart line by one, stopping at zero.
    async fn update_quantity(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<CartItem> {
        let state = state(ctx)?;
        let id: CartItemId = parse_id(&id).graphql()?;
        let line = CartService::new(state.store())
            .update_quantity(identity(ctx), id)
            .await
            .graphql()?;
        Ok(line.into())
    }

    async fn request_reset(
        &self,
        ctx: &Context<'_>,
        email: String,
    ) -> async_graphql::Result<SuccessMessage> {
        let state = state(ctx)?;
        let config = state.config();
        ResetService::new(
            state.store(),
            state.mailer(),
            &config.email.from_address,
            &config.frontend_url,
        )
        .request_reset(&email, Utc::now())
        .await
        .graphql()?;
        Ok(SuccessMessage::new("Thanks!"))
    }

    /// Redeem a reset token. Signs the user in on success.
    async fn reset_password(
        &self,
        ctx: &Context<'_>,
        reset_token: String,
        password: String,
        confirm_password: String,
    ) -> async_graphql::Result<User> {
        let state = state(ctx)?;
        let config = state.config();
        let user = ResetService::new(
            state.store(),
            state.mailer(),
            &config.email.from_address,
            &config.frontend_url,
        )
        .reset_password(&reset_token, &password, &confirm_password, Utc::now())
        .await
        .graphql()?;
        start_session(ctx, state, user.id)?;
        Ok(user.into())
    }

    async fn contact_us_request(
        &self,
        ctx: &Context<'_>,
        email: String,
        message: String,
        phone: Option<String>,
    ) -> async_graphql::Result<SuccessMessage> {
        let state = state(ctx)?;
        send_contact_request(
            state.mailer(),
            &state.config().email,
            &email,
            &message,
            phone.as_deref(),
        )
        .await
        .graphql()?;
        Ok(SuccessMessage::new(CONTACT_CONFIRMATION))
    }

    async fn add_review(
        &self,
        ctx: &Context<'_>,
        item_id: ID,
        text: String,
        rating: i32,
    ) -> async_graphql::Result<Review> {
        let state = state(ctx)?;
        let item_id: ItemId = parse_id(&item_id).graphql()?;
        let review = ItemService::new(state.store())
            .add_review(identity(ctx), item_id, text, rating)
            .await
            .graphql()?;
        Ok(review.into())
    }
}
