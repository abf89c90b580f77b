//! Postgres-backed business data and reservations.

use crate::db_types;
use crate::error::{AppError, ReservationError};
use crate::gateways::{BusinessData, ReservationBackend};
use crate::types::{BusinessContext, DiningTable, MenuItem, ReservationAction, ReservationRecord};

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use time::{Date, Month, OffsetDateTime, Time};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct PgBackend {
    db_pool: Pool<Postgres>,
}

impl PgBackend {
    pub fn new(db_pool: Pool<Postgres>) -> Self {
        Self { db_pool }
    }

    async fn menu(&self, business_id: &str) -> Result<Vec<MenuItem>, sqlx::Error> {
        let rows = sqlx::query_as::<_, db_types::MenuItem>(
            "
            select name, description, price_cents
            from menu_items
            where business_id = $1
            order by id
            ",
        )
        .bind(business_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MenuItem {
                name: r.name,
                description: r.description,
                price_cents: r.price_cents,
            })
            .collect())
    }

    async fn tables(&self, business_id: &str) -> Result<Vec<DiningTable>, sqlx::Error> {
        let rows = sqlx::query_as::<_, db_types::DiningTable>(
            "
            select label, seats
            from dining_tables
            where business_id = $1
            order by label
            ",
        )
        .bind(business_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| DiningTable {
                label: r.label,
                seats: r.seats,
            })
            .collect())
    }

    /// Slot start times on `date` whose booked party sizes are still below
    /// `capacity`. A business without tables has no capacity limit.
    async fn open_slots(
        &self,
        business_id: &str,
        date: Date,
        capacity: i64,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "
            select to_char(s.start_time, 'HH24:MI')
            from time_slots s
            where s.business_id = $1
              and (
                $3 = 0
                or coalesce((
                  select sum(r.party_size)
                  from reservations r
                  where r.business_id = s.business_id
                    and r.date = $2
                    and r.time = s.start_time
                ), 0) < $3
              )
            order by s.start_time
            ",
        )
        .bind(business_id)
        .bind(date)
        .bind(capacity)
        .fetch_all(&self.db_pool)
        .await
    }
}

/// Name and hours from the business row; blank hours keep the default.
fn apply_business(context: &mut BusinessContext, business: db_types::Business) {
    debug!(business_id=%business.id, name=%business.name, "loaded business");
    context.name = business.name;
    if !business.hours.trim().is_empty() {
        context.hours = business.hours;
    }
}

/// Seats across all tables.
fn capacity_of(seats: impl IntoIterator<Item = i32>) -> i64 {
    seats.into_iter().map(|s| i64::from(s.max(0))).sum()
}

/// Resolves the extractor's date vocabulary against `today`. `DD-MM` is the
/// next occurrence of that day, today included.
pub fn resolve_date(date: &str, today: Date) -> Option<Date> {
    match date {
        "today" => Some(today),
        "tomorrow" => today.next_day(),
        "day_after_tomorrow" => today.next_day()?.next_day(),
        other => {
            let (day, month) = other.split_once(|c: char| c == '-' || c == '/')?;
            let day: u8 = day.trim().parse().ok()?;
            let month = Month::try_from(month.trim().parse::<u8>().ok()?).ok()?;
            // 29-02 may only exist a few years out
            (today.year()..=today.year() + 4)
                .filter_map(|year| Date::from_calendar_date(year, month, day).ok())
                .find(|candidate| *candidate >= today)
        }
    }
}

/// `HH:MM` in 24-hour form.
pub fn parse_clock(clock: &str) -> Option<Time> {
    let (hour, minute) = clock.trim().split_once(':')?;
    Time::from_hms(hour.parse().ok()?, minute.parse().ok()?, 0).ok()
}

#[async_trait]
impl BusinessData for PgBackend {
    async fn fetch_context(&self, business_id: &str) -> Result<BusinessContext, AppError> {
        let business = sqlx::query_as::<_, db_types::Business>(
            "
            select id, name, hours
            from businesses
            where id = $1
            ",
        )
        .bind(business_id)
        .fetch_optional(&self.db_pool)
        .await;

        let mut context = BusinessContext::default();
        match business {
            Ok(Some(b)) => apply_business(&mut context, b),
            Ok(None) => warn!(business_id=%business_id, "unknown business; using defaults"),
            Err(e) => warn!(error=%e, business_id=%business_id, "failed to load business"),
        }

        match self.menu(business_id).await {
            Ok(menu) => context.menu = menu,
            Err(e) => warn!(error=%e, business_id=%business_id, "failed to load menu"),
        }
        match self.tables(business_id).await {
            Ok(tables) => context.tables = tables,
            Err(e) => warn!(error=%e, business_id=%business_id, "failed to load tables"),
        }
        let today = OffsetDateTime::now_utc().date();
        match self
            .open_slots(business_id, today, capacity_of(context.tables.iter().map(|t| t.seats)))
            .await
        {
            Ok(slots) => context.available_slots = slots,
            Err(e) => warn!(error=%e, business_id=%business_id, "failed to load slots"),
        }
        Ok(context)
    }
}

#[async_trait]
impl ReservationBackend for PgBackend {
    async fn create_reservation(
        &self,
        business_id: &str,
        action: &ReservationAction,
    ) -> Result<ReservationRecord, ReservationError> {
        let today = OffsetDateTime::now_utc().date();
        let date = resolve_date(&action.date, today).ok_or_else(|| {
            ReservationError::BackendError(format!("unrecognised date '{}'", action.date))
        })?;
        let time = parse_clock(&action.time).ok_or_else(|| {
            ReservationError::BackendError(format!("unrecognised time '{}'", action.time))
        })?;
        let party_size = i32::try_from(action.party_size)
            .map_err(|_| ReservationError::BackendError("party size out of range".to_string()))?;

        let mut tx = self.db_pool.begin().await?;
        // serializes capacity checks for one business
        sqlx::query("select pg_advisory_xact_lock(hashtext($1))")
            .bind(business_id)
            .execute(&mut tx)
            .await?;

        let tables = sqlx::query_as::<_, db_types::DiningTable>(
            "select label, seats from dining_tables where business_id = $1",
        )
        .bind(business_id)
        .fetch_all(&mut tx)
        .await?;
        let capacity = capacity_of(tables.iter().map(|t| t.seats));

        let defined_slots: i64 = sqlx::query_scalar(
            "select count(*) from time_slots where business_id = $1",
        )
        .bind(business_id)
        .fetch_one(&mut tx)
        .await?;
        if defined_slots > 0 {
            let slot_exists: bool = sqlx::query_scalar(
                "select exists (select 1 from time_slots where business_id = $1 and start_time = $2)",
            )
            .bind(business_id)
            .bind(time)
            .fetch_one(&mut tx)
            .await?;
            if !slot_exists {
                return Err(ReservationError::NoAvailability);
            }
        }

        if capacity > 0 {
            let booked: i64 = sqlx::query_scalar(
                "
                select coalesce(sum(party_size), 0)::bigint
                from reservations
                where business_id = $1 and date = $2 and time = $3
                ",
            )
            .bind(business_id)
            .bind(date)
            .bind(time)
            .fetch_one(&mut tx)
            .await?;
            if booked + i64::from(party_size) > capacity {
                debug!(booked, capacity, party_size, "slot is full");
                return Err(ReservationError::NoAvailability);
            }
        }

        let row = sqlx::query_as::<_, db_types::Reservation>(
            "
            insert into reservations (
              id,
              business_id,
              name,
              party_size,
              date,
              time,
              phone,
              notes
            ) values (
              $1,
              $2,
              $3,
              $4,
              $5,
              $6,
              $7,
              $8
            )
            returning id, business_id, name, party_size, date, time, phone, notes
            ",
        )
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(&action.name)
        .bind(party_size)
        .bind(date)
        .bind(time)
        .bind(&action.phone)
        .bind(&action.notes)
        .fetch_one(&mut tx)
        .await?;
        tx.commit().await?;

        info!(reservation_id=%row.id, business_id=%row.business_id, "created reservation");
        Ok(ReservationRecord {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            party_size: u32::try_from(row.party_size).unwrap_or_default(),
            date: row.date,
            time: row.time,
            phone: row.phone,
            notes: row.notes,
        })
    }
}
