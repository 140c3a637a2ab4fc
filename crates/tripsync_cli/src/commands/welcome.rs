//! Welcome command implementation.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tripsync_store::{
    open_demo_collections, CollectionId, DemoCollections, DocumentStore, MemoryDocumentStore,
    WelcomeFeed,
};

/// Seeds a store from `{collection: {id: document}}`.
///
/// Bare collection names resolve to the demo collections; anything else
/// must be `scope.name` and is created on demand.
pub fn seed(
    store: &MemoryDocumentStore,
    demo: &DemoCollections,
    seed: &Value,
) -> Result<usize, Box<dyn std::error::Error>> {
    let Value::Object(collections) = seed else {
        return Err("Seed file must be a JSON object of collections".into());
    };

    let mut written = 0;
    for (name, documents) in collections {
        let collection = match name.as_str() {
            "users" => demo.users.clone(),
            "shared" => demo.shared.clone(),
            "local" => demo.local.clone(),
            other => {
                let id: CollectionId = other.parse()?;
                store.create_collection(id.scope(), id.name())?
            }
        };
        let Value::Object(documents) = documents else {
            return Err(format!("Collection {:?} must map IDs to documents", name).into());
        };
        for (id, document) in documents {
            store.put_value(&collection, id, document.clone())?;
            written += 1;
        }
    }
    Ok(written)
}

/// Renders the welcome screen from the feed's current records.
pub fn render<S: DocumentStore>(username: &str, feed: &WelcomeFeed<S>) -> String {
    let membership = feed.membership();
    let message = feed.shared_message();

    let mut lines = vec![
        format!("Hi {}!", username),
        format!(
            "Membership: {} ({})",
            membership.membership_number, membership.tier_status
        ),
        format!(
            "Miles: {}  Tier miles: {}",
            membership.miles, membership.tier_miles
        ),
    ];
    match feed.trip() {
        Some(trip) => lines.push(format!(
            "Trip: {} -> {}  {} ({})  {} - {} ({})",
            trip.departure_city,
            trip.destination_city,
            trip.flight_number,
            trip.airline,
            trip.departure_time,
            trip.arrival_time,
            trip.duration
        )),
        None => lines.push("Trip: none booked".to_string()),
    }
    let color = message
        .named_color()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "default".to_string());
    lines.push(format!(
        "Message [{}, {}pt]: {}",
        color, message.size, message.message
    ));
    lines.join("\n")
}

/// Runs the welcome command.
pub fn run(username: &str, documents: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryDocumentStore::new());
    let demo = open_demo_collections(store.as_ref())?;

    if let Some(path) = documents {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read seed file {:?}: {}", path, e))?;
        let written = seed(&store, &demo, &serde_json::from_str(&text)?)?;
        info!("Seeded {} documents from {:?}", written, path);
    }

    let feed = WelcomeFeed::new(Arc::clone(&store), demo.users.clone(), demo.shared.clone());
    feed.watch_member(username)?;
    feed.watch_shared_message()?;

    println!("{}", render(username, &feed));
    Ok(())
}
