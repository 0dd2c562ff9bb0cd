use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;

use crate::database::entities::bookings::{self, BookingStatus};
use crate::database::entities::items::{self, ItemType};
use crate::errors::{CoreError, CoreResult};

/// Body of `POST /bookings/`
#[derive(Debug, Clone, Deserialize)]
pub struct BookingInput {
    pub item_id: i32,
    pub date: NaiveDate,
    pub time_slot: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub contact_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingRole {
    /// Bookings the caller made
    #[default]
    Renter,
    /// Bookings on the caller's items
    Owner,
}

#[derive(Clone)]
pub struct BookingService {
    db: DatabaseConnection,
}

impl BookingService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self, user_id: i32, role: BookingRole) -> CoreResult<Vec<bookings::Model>> {
        let query = match role {
            BookingRole::Renter => {
                bookings::Entity::find().filter(bookings::Column::UserId.eq(user_id))
            }
            BookingRole::Owner => {
                let item_ids: Vec<i32> = items::Entity::find()
                    .filter(items::Column::OwnerId.eq(user_id))
                    .all(&self.db)
                    .await
                    .map_err(|e| CoreError::internal("Failed to load items").with_source(e))?
                    .into_iter()
                    .map(|item| item.id)
                    .collect();
                bookings::Entity::find().filter(bookings::Column::ItemId.is_in(item_ids))
            }
        };

        query
            .order_by_desc(bookings::Column::CreatedAt)
            .order_by_desc(bookings::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to list bookings").with_source(e))
    }

    pub async fn create(&self, user_id: i32, input: BookingInput) -> CoreResult<bookings::Model> {
        let time_slot = input.time_slot.trim().to_string();
        if time_slot.is_empty() {
            return Err(CoreError::validation("time_slot is required").with_field("field", "time_slot"));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to start transaction").with_source(e))?;

        let item = items::Entity::find_by_id(input.item_id)
            .one(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to load item").with_source(e))?
            .ok_or_else(|| CoreError::not_found("Item", input.item_id.to_string()))?;

        if item.kind() != Some(ItemType::Rental) {
            return Err(CoreError::validation("Only rental items can be booked"));
        }
        if item.owner_id == user_id {
            return Err(CoreError::validation("You cannot book your own item"));
        }
        if let Some(start) = item.availability_start {
            if input.date < start {
                return Err(CoreError::validation("Date is outside the item's availability window"));
            }
        }
        if let Some(end) = item.availability_end {
            if input.date > end {
                return Err(CoreError::validation("Date is outside the item's availability window"));
            }
        }
        let slots = item.time_slots();
        if !slots.is_empty() && !slots.contains(&time_slot) {
            return Err(CoreError::validation(format!(
                "Time slot '{}' is not offered for this item",
                time_slot
            ))
            .with_field("field", "time_slot"));
        }

        let taken = bookings::Entity::find()
            .filter(bookings::Column::ItemId.eq(item.id))
            .filter(bookings::Column::Date.eq(input.date))
            .filter(bookings::Column::TimeSlot.eq(time_slot.as_str()))
            .filter(bookings::Column::Status.is_in([
                BookingStatus::Pending.as_str(),
                BookingStatus::Accepted.as_str(),
            ]))
            .one(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to check slot").with_source(e))?;
        if taken.is_some() {
            return Err(CoreError::conflict("Time slot already booked"));
        }

        let now = Utc::now();
        let booking = bookings::ActiveModel {
            item_id: Set(item.id),
            user_id: Set(user_id),
            date: Set(input.date),
            time_slot: Set(time_slot),
            status: Set(BookingStatus::Pending.as_str().to_string()),
            contact_phone: Set(input.contact_phone.trim().to_string()),
            contact_name: Set(input.contact_name.trim().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| CoreError::internal("Failed to create booking").with_source(e))?;

        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit booking").with_source(e))?;

        tracing::info!(
            booking_id = booking.id,
            item_id = booking.item_id,
            date = %booking.date,
            slot = %booking.time_slot,
            "Booking requested"
        );
        Ok(booking)
    }

    /// Owner accepts or declines a pending booking. Accepting declines every
    /// other pending request for the same slot.
    pub async fn respond(
        &self,
        user_id: i32,
        booking_id: i32,
        action: BookingAction,
    ) -> CoreResult<bookings::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to start transaction").with_source(e))?;

        let booking = bookings::Entity::find_by_id(booking_id)
            .one(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to load booking").with_source(e))?
            .ok_or_else(|| CoreError::not_found("Booking", booking_id.to_string()))?;
        let item = items::Entity::find_by_id(booking.item_id)
            .one(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to load item").with_source(e))?
            .ok_or_else(|| CoreError::not_found("Item", booking.item_id.to_string()))?;

        if item.owner_id != user_id {
            return Err(CoreError::forbidden(
                "Only the item owner can respond to this booking",
            ));
        }
        if booking.status.parse::<BookingStatus>().ok() != Some(BookingStatus::Pending) {
            return Err(CoreError::validation(format!(
                "Booking is already {}",
                booking.status
            )));
        }

        let status = match action {
            BookingAction::Accept => BookingStatus::Accepted,
            BookingAction::Decline => BookingStatus::Declined,
        };
        let now = Utc::now();

        if status == BookingStatus::Accepted {
            let declined = bookings::Entity::update_many()
                .col_expr(
                    bookings::Column::Status,
                    sea_orm::sea_query::Expr::value(BookingStatus::Declined.as_str()),
                )
                .col_expr(bookings::Column::UpdatedAt, sea_orm::sea_query::Expr::value(now))
                .filter(bookings::Column::ItemId.eq(booking.item_id))
                .filter(bookings::Column::Date.eq(booking.date))
                .filter(bookings::Column::TimeSlot.eq(booking.time_slot.as_str()))
                .filter(bookings::Column::Status.eq(BookingStatus::Pending.as_str()))
                .filter(bookings::Column::Id.ne(booking.id))
                .exec(&txn)
                .await
                .map_err(|e| CoreError::internal("Failed to decline competing bookings").with_source(e))?;
            if declined.rows_affected > 0 {
                tracing::debug!(
                    booking_id,
                    declined = declined.rows_affected,
                    "Declined competing bookings"
                );
            }
        }

        let mut active: bookings::ActiveModel = booking.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(now);
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to update booking").with_source(e))?;

        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit booking").with_source(e))?;

        tracing::info!(booking_id, status = %status, "Booking answered");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::item_service::tests::rental_input;
    use crate::services::{AuthService, ItemService};

    struct Fixture {
        bookings: BookingService,
        owner: i32,
        renter: i32,
        second_renter: i32,
        item: i32,
    }

    async fn fixture() -> Fixture {
        let db = setup_test_db().await.unwrap();
        let auth = AuthService::new(db.clone());
        let mut ids = Vec::new();
        for name in ["owner", "renter", "renter2"] {
            let (user, _) = auth
                .register(name, &format!("{}@example.com", name), "password123")
                .await
                .unwrap();
            ids.push(user.id);
        }
        let item = ItemService::new(db.clone())
            .create(ids[0], rental_input())
            .await
            .unwrap();
        Fixture {
            bookings: BookingService::new(db),
            owner: ids[0],
            renter: ids[1],
            second_renter: ids[2],
            item: item.id,
        }
    }

    fn request(item_id: i32, day: u32, slot: &str) -> BookingInput {
        BookingInput {
            item_id,
            date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            time_slot: slot.into(),
            contact_phone: "9876543210".into(),
            contact_name: "Renter".into(),
        }
    }

    #[tokio::test]
    async fn test_double_booking_is_rejected() {
        let f = fixture().await;
        let first = f
            .bookings
            .create(f.renter, request(f.item, 10, "09:00-12:00"))
            .await
            .unwrap();
        assert_eq!(first.status, "pending");

        let err = f
            .bookings
            .create(f.second_renter, request(f.item, 10, "09:00-12:00"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.message(), "Time slot already booked");

        // other slot and other day stay free
        f.bookings
            .create(f.second_renter, request(f.item, 10, "13:00-17:00"))
            .await
            .unwrap();
        f.bookings
            .create(f.second_renter, request(f.item, 11, "09:00-12:00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_declined_booking_frees_slot() {
        let f = fixture().await;
        let first = f
            .bookings
            .create(f.renter, request(f.item, 10, "09:00-12:00"))
            .await
            .unwrap();
        f.bookings
            .respond(f.owner, first.id, BookingAction::Decline)
            .await
            .unwrap();

        f.bookings
            .create(f.second_renter, request(f.item, 10, "09:00-12:00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_booking_rules() {
        let f = fixture().await;
        let cases = [
            (f.owner, request(f.item, 10, "09:00-12:00"), 400),
            (f.renter, request(f.item, 10, "06:00-07:00"), 400),
            (f.renter, request(9999, 10, "09:00-12:00"), 404),
        ];
        for (user, input, status) in cases {
            let err = f.bookings.create(user, input).await.unwrap_err();
            assert_eq!(err.http_status_code(), status);
        }

        let mut outside = request(f.item, 1, "09:00-12:00");
        outside.date = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        let err = f.bookings.create(f.renter, outside).await.unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_only_owner_responds_once() {
        let f = fixture().await;
        let booking = f
            .bookings
            .create(f.renter, request(f.item, 10, "09:00-12:00"))
            .await
            .unwrap();

        let err = f
            .bookings
            .respond(f.renter, booking.id, BookingAction::Accept)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        let accepted = f
            .bookings
            .respond(f.owner, booking.id, BookingAction::Accept)
            .await
            .unwrap();
        assert_eq!(accepted.status, "accepted");

        let err = f
            .bookings
            .respond(f.owner, booking.id, BookingAction::Decline)
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);

        let owner_view = f.bookings.list(f.owner, BookingRole::Owner).await.unwrap();
        assert_eq!(owner_view.len(), 1);
        let renter_view = f.bookings.list(f.renter, BookingRole::Renter).await.unwrap();
        assert_eq!(renter_view.len(), 1);
        assert!(f
            .bookings
            .list(f.second_renter, BookingRole::Renter)
            .await
            .unwrap()
            .is_empty());
    }
}
