use chrono::{NaiveDate, Utc};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::database::entities::bookings::{self, BookingStatus};
use crate::database::entities::items::{self, ItemType, PerUnit};
use crate::errors::{CoreError, CoreResult};

/// Body of `POST /items/` and `PUT /items/{id}/`
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub item_type: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub per_unit: Option<String>,
    #[serde(default)]
    pub operator_available: bool,
    #[serde(default)]
    pub availability_start: Option<NaiveDate>,
    #[serde(default)]
    pub availability_end: Option<NaiveDate>,
    #[serde(default)]
    pub time_slots: Option<Vec<String>>,
}

/// Listing as returned to clients, with slots decoded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub id: i32,
    pub owner_id: i32,
    pub item_type: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub per_unit: Option<String>,
    pub operator_available: bool,
    pub availability_start: Option<NaiveDate>,
    pub availability_end: Option<NaiveDate>,
    pub time_slots: Vec<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<items::Model> for ItemView {
    fn from(model: items::Model) -> Self {
        let time_slots = model.time_slots();
        Self {
            id: model.id,
            owner_id: model.owner_id,
            item_type: model.item_type,
            name: model.name,
            description: model.description,
            price: model.price,
            per_unit: model.per_unit,
            operator_available: model.operator_available,
            availability_start: model.availability_start,
            availability_end: model.availability_end,
            time_slots,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotAvailability {
    pub time_slot: String,
    pub available: bool,
}

/// Minutes since midnight for both ends of an `HH:MM-HH:MM` slot.
pub fn parse_time_slot(slot: &str) -> CoreResult<(u32, u32)> {
    let regex = Regex::new(r"^(\d{2}):(\d{2})-(\d{2}):(\d{2})$").map_err(|e| {
        CoreError::internal(format!("Failed to compile time slot regex: {}", e))
    })?;
    let invalid = || {
        CoreError::validation(format!(
            "Invalid time slot '{}': expected HH:MM-HH:MM",
            slot
        ))
        .with_field("field", "time_slots")
    };

    let captures = regex.captures(slot.trim()).ok_or_else(invalid)?;
    let number = |index: usize| -> CoreResult<u32> {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(invalid)
    };
    let (start_h, start_m, end_h, end_m) = (number(1)?, number(2)?, number(3)?, number(4)?);
    if start_h > 23 || end_h > 23 || start_m > 59 || end_m > 59 {
        return Err(invalid());
    }

    let (start, end) = (start_h * 60 + start_m, end_h * 60 + end_m);
    if start >= end {
        return Err(CoreError::validation(format!(
            "Time slot '{}' must end after it starts",
            slot
        ))
        .with_field("field", "time_slots"));
    }
    Ok((start, end))
}

pub fn validate_time_slots(slots: &[String]) -> CoreResult<Vec<String>> {
    let mut cleaned: Vec<String> = Vec::with_capacity(slots.len());
    for slot in slots {
        parse_time_slot(slot)?;
        let slot = slot.trim().to_string();
        if cleaned.contains(&slot) {
            return Err(
                CoreError::validation(format!("Duplicate time slot '{}'", slot))
                    .with_field("field", "time_slots"),
            );
        }
        cleaned.push(slot);
    }
    Ok(cleaned)
}

struct ValidatedItem {
    item_type: ItemType,
    name: String,
    description: Option<String>,
    price: f64,
    per_unit: Option<PerUnit>,
    operator_available: bool,
    availability_start: Option<NaiveDate>,
    availability_end: Option<NaiveDate>,
    time_slots: Option<Vec<String>>,
}

fn validate(input: ItemInput) -> CoreResult<ValidatedItem> {
    let item_type: ItemType = input
        .item_type
        .parse()
        .map_err(|e: String| CoreError::validation(e).with_field("field", "item_type"))?;

    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::validation("Name is required").with_field("field", "name"));
    }

    if !input.price.is_finite() || input.price < 0.0 {
        return Err(
            CoreError::validation("Price must be a non-negative number").with_field("field", "price"),
        );
    }

    let per_unit = input
        .per_unit
        .as_deref()
        .filter(|unit| !unit.trim().is_empty())
        .map(|unit| unit.trim().parse::<PerUnit>())
        .transpose()
        .map_err(|e| CoreError::validation(e).with_field("field", "per_unit"))?;

    if let (Some(start), Some(end)) = (input.availability_start, input.availability_end) {
        if start > end {
            return Err(CoreError::validation(
                "availability_start must not be after availability_end",
            )
            .with_field("field", "availability_start"));
        }
    }

    let time_slots = input
        .time_slots
        .as_deref()
        .map(validate_time_slots)
        .transpose()?
        .filter(|slots| !slots.is_empty());

    Ok(ValidatedItem {
        item_type,
        name,
        description: input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        price: input.price,
        per_unit,
        operator_available: input.operator_available,
        availability_start: input.availability_start,
        availability_end: input.availability_end,
        time_slots,
    })
}

fn apply(active: &mut items::ActiveModel, item: ValidatedItem) -> CoreResult<()> {
    let time_slots_json = item
        .time_slots
        .map(|slots| serde_json::to_string(&slots))
        .transpose()
        .map_err(|e| CoreError::internal("Failed to encode time slots").with_source(e))?;

    active.item_type = Set(item.item_type.as_str().to_string());
    active.name = Set(item.name);
    active.description = Set(item.description);
    active.price = Set(item.price);
    active.per_unit = Set(item.per_unit.map(|unit| unit.as_str().to_string()));
    active.operator_available = Set(item.operator_available);
    active.availability_start = Set(item.availability_start);
    active.availability_end = Set(item.availability_end);
    active.time_slots_json = Set(time_slots_json);
    active.updated_at = Set(Utc::now());
    Ok(())
}

#[derive(Clone)]
pub struct ItemService {
    db: DatabaseConnection,
}

impl ItemService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self, item_type: Option<&str>) -> CoreResult<Vec<items::Model>> {
        let mut query = items::Entity::find();
        if let Some(item_type) = item_type.filter(|t| !t.is_empty()) {
            let item_type: ItemType = item_type
                .parse()
                .map_err(|e: String| CoreError::validation(e).with_field("field", "item_type"))?;
            query = query.filter(items::Column::ItemType.eq(item_type.as_str()));
        }
        query
            .order_by_desc(items::Column::CreatedAt)
            .order_by_desc(items::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to list items").with_source(e))
    }

    pub async fn get(&self, id: i32) -> CoreResult<items::Model> {
        items::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load item").with_source(e))?
            .ok_or_else(|| CoreError::not_found("Item", id.to_string()))
    }

    pub async fn create(&self, owner_id: i32, input: ItemInput) -> CoreResult<items::Model> {
        let item = validate(input)?;
        let mut active = items::ActiveModel {
            owner_id: Set(owner_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        apply(&mut active, item)?;

        let created = active
            .insert(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to create item").with_source(e))?;
        tracing::info!(item_id = created.id, owner_id, item_type = %created.item_type, "Item listed");
        Ok(created)
    }

    async fn owned(&self, user_id: i32, id: i32) -> CoreResult<items::Model> {
        let item = self.get(id).await?;
        if item.owner_id != user_id {
            return Err(CoreError::forbidden(
                "You do not have permission to modify this item",
            ));
        }
        Ok(item)
    }

    pub async fn update(&self, user_id: i32, id: i32, input: ItemInput) -> CoreResult<items::Model> {
        let existing = self.owned(user_id, id).await?;
        let item = validate(input)?;
        let mut active: items::ActiveModel = existing.into();
        apply(&mut active, item)?;
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to update item").with_source(e))
    }

    pub async fn delete(&self, user_id: i32, id: i32) -> CoreResult<()> {
        let item = self.owned(user_id, id).await?;
        item.delete(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to delete item").with_source(e))?;
        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }

    /// Configured slots of an item on `date`; taken slots have a pending or accepted booking
    pub async fn slots(&self, id: i32, date: NaiveDate) -> CoreResult<Vec<SlotAvailability>> {
        let item = self.get(id).await?;
        let taken: Vec<String> = bookings::Entity::find()
            .filter(bookings::Column::ItemId.eq(item.id))
            .filter(bookings::Column::Date.eq(date))
            .filter(bookings::Column::Status.is_in([
                BookingStatus::Pending.as_str(),
                BookingStatus::Accepted.as_str(),
            ]))
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load bookings").with_source(e))?
            .into_iter()
            .map(|booking| booking.time_slot)
            .collect();

        Ok(item
            .time_slots()
            .into_iter()
            .map(|slot| SlotAvailability {
                available: !taken.contains(&slot),
                time_slot: slot,
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::AuthService;
    use tokio_test::{assert_err, assert_ok};

    pub(crate) fn rental_input() -> ItemInput {
        ItemInput {
            item_type: "rental".into(),
            name: "Tractor".into(),
            description: Some("45 HP with rotavator".into()),
            price: 800.0,
            per_unit: Some("hour".into()),
            operator_available: true,
            availability_start: NaiveDate::from_ymd_opt(2025, 6, 1),
            availability_end: NaiveDate::from_ymd_opt(2025, 6, 30),
            time_slots: Some(vec!["09:00-12:00".into(), "13:00-17:00".into()]),
        }
    }

    #[test]
    fn test_time_slot_parsing() {
        assert_eq!(assert_ok!(parse_time_slot("09:00-10:30")), (540, 630));
        assert_err!(parse_time_slot("9:00-10:00"));
        assert_err!(parse_time_slot("10:00-09:00"));
        assert_err!(parse_time_slot("10:00-10:00"));
        assert_err!(parse_time_slot("24:00-25:00"));
        assert_err!(validate_time_slots(&["09:00-10:00".into(), "09:00-10:00".into()]));
    }

    #[test]
    fn test_validation_rules() {
        let mut input = rental_input();
        input.price = -1.0;
        assert!(validate(input).is_err());

        let mut input = rental_input();
        input.availability_start = NaiveDate::from_ymd_opt(2025, 7, 1);
        assert!(validate(input).is_err());

        let mut input = rental_input();
        input.item_type = "lease".into();
        assert!(validate(input).is_err());

        let mut input = rental_input();
        input.per_unit = Some("week".into());
        assert!(validate(input).is_err());
    }

    #[tokio::test]
    async fn test_owner_only_changes() {
        let db = setup_test_db().await.unwrap();
        let auth = AuthService::new(db.clone());
        let (owner, _) = auth
            .register("owner", "owner@example.com", "password123")
            .await
            .unwrap();
        let (other, _) = auth
            .register("other", "other@example.com", "password123")
            .await
            .unwrap();
        let service = ItemService::new(db);

        let item = service.create(owner.id, rental_input()).await.unwrap();
        assert_eq!(ItemView::from(item.clone()).time_slots.len(), 2);

        let err = service
            .update(other.id, item.id, rental_input())
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 403);
        let err = service.delete(other.id, item.id).await.unwrap_err();
        assert_eq!(err.http_status_code(), 403);

        let mut input = rental_input();
        input.name = "Tractor with trolley".into();
        let updated = service.update(owner.id, item.id, input).await.unwrap();
        assert_eq!(updated.name, "Tractor with trolley");

        service.delete(owner.id, item.id).await.unwrap();
        assert_eq!(
            service.get(item.id).await.unwrap_err().http_status_code(),
            404
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_type() {
        let db = setup_test_db().await.unwrap();
        let (owner, _) = AuthService::new(db.clone())
            .register("owner", "owner@example.com", "password123")
            .await
            .unwrap();
        let service = ItemService::new(db);
        service.create(owner.id, rental_input()).await.unwrap();
        let mut seeds = rental_input();
        seeds.item_type = "marketplace".into();
        seeds.name = "Onion seeds".into();
        seeds.time_slots = None;
        service.create(owner.id, seeds).await.unwrap();

        assert_eq!(service.list(None).await.unwrap().len(), 2);
        let rentals = service.list(Some("rental")).await.unwrap();
        assert_eq!(rentals.len(), 1);
        assert_eq!(rentals[0].name, "Tractor");
        assert!(service.list(Some("lease")).await.is_err());
    }
}
