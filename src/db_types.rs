use sqlx::types::time::{Date, Time};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(FromRow, Debug)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub hours: String,
}

#[derive(FromRow, Debug)]
pub struct MenuItem {
    pub name: String,
    pub description: String,
    pub price_cents: i32,
}

#[derive(FromRow, Debug)]
pub struct DiningTable {
    pub label: String,
    pub seats: i32,
}

#[derive(FromRow, Debug)]
pub struct Reservation {
    pub id: Uuid,
    pub business_id: String,
    pub name: String,
    pub party_size: i32,
    pub date: Date,
    pub time: Time,
    pub phone: String,
    pub notes: String,
}
