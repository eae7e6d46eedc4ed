//! Fake events for local runs and demos.

use crate::errors::DbError;
use crate::geo::GeoPoint;
use crate::model::{Address, Event};
use crate::repository::EventRepository;
use chrono::{TimeDelta, Utc};
use fake::Fake;
use fake::faker::address::en::{BuildingNumber, StreetName};
use rand::Rng;
use rand::distr::Alphanumeric;

pub const CITIES: [&str; 3] = ["Minsk", "NY", "Chicago"];
/// Generated points fall within this many degrees of the centre on each axis.
pub const SPREAD_DEG: f64 = 2.0;
pub const CENTRE: (f64, f64) = (27.0, 53.0);

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

/// `count` events with fresh ids, starting some time in the next day.
#[must_use]
pub fn generate_events(count: usize) -> Vec<Event> {
    let mut rng = rand::rng();
    let now = Utc::now();
    (0..count)
        .map(|_| {
            let lon = CENTRE.0 + rng.random_range(-SPREAD_DEG..SPREAD_DEG);
            let lat = CENTRE.1 + rng.random_range(-SPREAD_DEG..SPREAD_DEG);
            let city = CITIES[rng.random_range(0..CITIES.len())];
            Event {
                id: uuid::Uuid::new_v4().to_string(),
                name: random_string(&mut rng, 5),
                description: random_string(&mut rng, 20),
                location: GeoPoint::new(lon, lat),
                time: now + TimeDelta::seconds(rng.random_range(0..86_400)),
                address: Address {
                    city: city.to_string(),
                    street_name: StreetName().fake(),
                    street_number: BuildingNumber().fake(),
                },
                visitors: None,
            }
        })
        .collect()
}

/// Generates and stores `count` events.
pub async fn seed_repository(repo: &EventRepository, count: usize) -> Result<Vec<Event>, DbError> {
    let mut stored = Vec::with_capacity(count);
    for event in generate_events(count) {
        stored.push(repo.create_event(event).await?);
    }
    log::info!("{}: seeded {count} events", repo.link());
    Ok(stored)
}
