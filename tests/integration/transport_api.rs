//! Integration tests for the transport adapter
//!
//! Tests cover:
//! - list / get / put / added request mapping
//! - Authorization (fail-closed listing, per-band checks)
//! - The ostate timestamp guard
//! - The Kitchen "Light On" round trip

use super::test_utils::shared_registry;
use iotdb_recipes::transport::{Access, AuthorizeRequest, FnAuthorizer};
use iotdb_recipes::{
    Envelope, ListItem, RecipeDefinition, RecipeTransport, Timestamp, TransportError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::ops::ControlFlow;
use std::sync::Arc;

fn collect_list(items: &Arc<Mutex<Vec<ListItem>>>) -> impl FnMut(ListItem) -> ControlFlow<()> {
    let items = items.clone();
    move |item| {
        items.lock().push(item);
        ControlFlow::Continue(())
    }
}

#[tokio::test]
async fn test_light_on_round_trip() {
    let registry = shared_registry();
    let clicks = Arc::new(Mutex::new(Vec::new()));
    let seen = clicks.clone();
    let recipe = registry
        .write()
        .register(
            RecipeDefinition::new("Light On")
                .group("Kitchen")
                .onclick(move |context, value| {
                    seen.lock().push(value);
                    context.set_message("Turning on the kitchen light");
                }),
        )
        .unwrap();
    let id = recipe.id().as_str().to_string();
    let transport = RecipeTransport::new(registry.clone());

    let model = transport
        .get(Envelope::new().with_id(&id).with_band("model"))
        .await
        .unwrap();
    let model = model.value.unwrap();
    assert!(model.get("@id").is_none());
    let roles = &model["iot:attribute"][0]["iot:role"];
    assert!(roles
        .as_array()
        .unwrap()
        .contains(&json!("iot-purpose:role-control")));

    let accepted = Timestamp::make();
    let put = transport
        .put(
            Envelope::new()
                .with_id(&id)
                .with_band("ostate")
                .with_value(json!({ "value": 1, "@timestamp": accepted.to_string() })),
        )
        .await
        .unwrap();
    assert_eq!(put.id.as_deref(), Some(id.as_str()));
    assert_eq!(*clicks.lock(), vec![json!(1)]);

    let status = transport
        .get(Envelope::new().with_id(&id).with_band("status"))
        .await
        .unwrap()
        .value
        .unwrap();
    assert_eq!(status["running"], json!(true));
    assert_eq!(status["message"], json!("Turning on the kitchen light"));
    assert!(status.get("@id").is_none());
}

#[tokio::test]
async fn test_stale_timestamp_is_rejected_without_click() {
    let registry = shared_registry();
    let clicks = Arc::new(Mutex::new(0));
    let counter = clicks.clone();
    let recipe = registry
        .write()
        .register(
            RecipeDefinition::new("Fan")
                .group("Bedroom")
                .onclick(move |_, _| *counter.lock() += 1),
        )
        .unwrap();
    let id = recipe.id().as_str().to_string();
    let transport = RecipeTransport::new(registry);

    let stale = Envelope::new()
        .with_id(&id)
        .with_band("ostate")
        .with_value(json!({ "value": true, "@timestamp": "2000-01-01T00:00:00.000Z" }));
    let rejection = transport.put(stale).await.unwrap_err();
    assert_eq!(rejection.error, TransportError::TimestampConflict);
    assert_eq!(rejection.echo.id.as_deref(), Some(id.as_str()));

    let missing = Envelope::new()
        .with_id(&id)
        .with_band("ostate")
        .with_value(json!({ "value": true }));
    let rejection = transport.put(missing).await.unwrap_err();
    assert_eq!(rejection.error, TransportError::TimestampConflict);

    assert_eq!(*clicks.lock(), 0);

    let fresh = Timestamp::make().to_string();
    let write = Envelope::new()
        .with_id(&id)
        .with_band("ostate")
        .with_value(json!({ "value": true, "@timestamp": fresh }));
    transport.put(write.clone()).await.unwrap();
    assert_eq!(*clicks.lock(), 1);

    // replaying the same write is a conflict
    let rejection = transport.put(write).await.unwrap_err();
    assert_eq!(rejection.error, TransportError::TimestampConflict);
    assert_eq!(*clicks.lock(), 1);
}

#[tokio::test]
async fn test_future_write_does_not_leak_into_other_recipes() {
    let registry = shared_registry();
    let ahead = registry
        .write()
        .register(RecipeDefinition::new("Ahead").group("Clock"))
        .unwrap();
    let local = registry
        .write()
        .register(RecipeDefinition::new("Local").group("Clock"))
        .unwrap();
    let transport = RecipeTransport::new(registry);
    let future = "2999-01-01T00:00:00.000Z";

    transport
        .put(
            Envelope::new()
                .with_id(ahead.id().as_str())
                .with_band("ostate")
                .with_value(json!({ "value": 1, "@timestamp": future })),
        )
        .await
        .unwrap();
    let future = Timestamp::parse(future).unwrap();
    assert!(ahead.context().execute_timestamp() > future);

    local.context().set_message("busy");
    local.context().clear_message();
    assert!(local.context().execute_timestamp() < future);
    assert!(Timestamp::make() < future);

    let wall_clock = Timestamp::make().to_string();
    transport
        .put(
            Envelope::new()
                .with_id(local.id().as_str())
                .with_band("ostate")
                .with_value(json!({ "value": 1, "@timestamp": wall_clock })),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_put_error_mapping() {
    let registry = shared_registry();
    let recipe = registry
        .write()
        .register(RecipeDefinition::new("Door").group("Garage"))
        .unwrap();
    let id = recipe.id().as_str().to_string();
    let transport = RecipeTransport::new(registry);

    let foreign = transport
        .put(Envelope::new().with_id("urn:iotdb:thing:lamp").with_band("ostate"))
        .await
        .unwrap_err();
    assert_eq!(foreign.error, TransportError::NotAppropriate);

    let unknown = transport
        .put(Envelope::new().with_id("urn:iotdb:recipe:nope").with_band("ostate"))
        .await
        .unwrap_err();
    assert_eq!(unknown.error, TransportError::NotFound);

    let meta = transport
        .put(Envelope::new().with_id(&id).with_band("meta").with_value(json!({})))
        .await
        .unwrap_err();
    assert_eq!(meta.error, TransportError::NotImplemented);

    for band in ["istate", "model", "status", "bogus"] {
        let rejection = transport
            .put(Envelope::new().with_id(&id).with_band(band))
            .await
            .unwrap_err();
        assert_eq!(rejection.error, TransportError::MethodNotAllowed, "band {}", band);
    }
}

#[tokio::test]
async fn test_get_error_mapping() {
    let registry = shared_registry();
    let recipe = registry
        .write()
        .register(RecipeDefinition::new("Door").group("Garage"))
        .unwrap();
    let id = recipe.id().as_str().to_string();
    let transport = RecipeTransport::new(registry).with_authorizer(FnAuthorizer::new(
        |request: &AuthorizeRequest| request.band.map(|b| b.as_str()) != Some("meta"),
    ));

    let unknown = transport
        .get(Envelope::new().with_id("urn:iotdb:recipe:nope").with_band("istate"))
        .await
        .unwrap_err();
    assert_eq!(unknown.error, TransportError::NotFound);

    let bad_band = transport
        .get(Envelope::new().with_id(&id).with_band("colour"))
        .await
        .unwrap_err();
    assert_eq!(bad_band.error, TransportError::NotFound);
    assert_eq!(bad_band.echo.band.as_deref(), Some("colour"));

    let denied = transport
        .get(Envelope::new().with_id(&id).with_band("meta"))
        .await
        .unwrap_err();
    assert_eq!(denied.error, TransportError::NotAuthorized);
    assert_eq!(denied.echo.id.as_deref(), Some(id.as_str()));
    assert!(denied.echo.value.is_none());
}

#[tokio::test]
async fn test_get_istate_and_ostate() {
    let registry = shared_registry();
    let recipe = registry
        .write()
        .register(
            RecipeDefinition::new("Thermostat")
                .group("Hall")
                .state("value", 21)
                .state("setpoint", 20),
        )
        .unwrap();
    recipe.context().set_state("Heating");
    let id = recipe.id().as_str().to_string();
    let transport = RecipeTransport::new(registry).with_user("alice");

    let istate = transport
        .get(Envelope::new().with_id(&id).with_band("istate"))
        .await
        .unwrap();
    assert_eq!(istate.user.as_deref(), Some("alice"));
    let value = istate.value.unwrap();
    assert_eq!(value["value"], Value::Null);
    assert_eq!(value["setpoint"], json!(20));
    assert_eq!(value["text"], json!("Heating"));
    assert!(value.get("@id").is_none());

    let ostate = transport
        .get(Envelope::new().with_id(&id).with_band("ostate"))
        .await
        .unwrap()
        .value
        .unwrap();
    assert!(ostate.get("running").is_none());
    assert_eq!(
        ostate["@timestamp"],
        json!(recipe.context().execute_timestamp().to_string())
    );
}

#[tokio::test]
async fn test_meta_round_trip() {
    let registry = shared_registry();
    let recipe = registry
        .write()
        .register(
            RecipeDefinition::new("Porch Light")
                .group("Outside")
                .cookbook_id("feedface"),
        )
        .unwrap();
    let transport = RecipeTransport::new(registry);

    let meta = transport
        .get(
            Envelope::new()
                .with_id(recipe.id().as_str())
                .with_band("meta"),
        )
        .await
        .unwrap()
        .value
        .unwrap();

    assert_eq!(meta["schema:name"], json!("Porch Light"));
    assert_eq!(meta["iot:cookbook"], json!("Outside"));
    assert_eq!(meta["iot:device-id"], json!("urn:iotdb:cookbook:feedface"));
}

#[tokio::test]
async fn test_list_emits_sorted_entries_then_end() {
    let registry = shared_registry();
    registry.write().load(vec![
        RecipeDefinition::new("B").group("Two"),
        RecipeDefinition::new("A").group("One"),
        RecipeDefinition::new("Hidden").group("One").enabled(false),
    ]);
    let transport = RecipeTransport::new(registry.clone());

    let items = Arc::new(Mutex::new(Vec::new()));
    transport
        .list(
            Envelope::new()
                .with_band("istate")
                .with_value(json!(1))
                .with_user("bob"),
            collect_list(&items),
        )
        .await
        .unwrap();

    let items = items.lock().clone();
    let expected: Vec<String> = registry
        .read()
        .recipes()
        .iter()
        .map(|r| r.id().as_str().to_string())
        .collect();
    assert_eq!(expected.len(), 2);
    assert_eq!(items.len(), 3);
    for (item, id) in items.iter().zip(&expected) {
        match item {
            ListItem::Entry(entry) => {
                assert_eq!(entry.id.as_ref(), Some(id));
                assert!(entry.band.is_none());
                assert!(entry.value.is_none());
                assert_eq!(entry.user.as_deref(), Some("bob"));
            }
            ListItem::End => panic!("end marker before entries"),
        }
    }
    assert_eq!(items[2], ListItem::End);
}

#[tokio::test]
async fn test_list_stops_early_but_still_ends() {
    let registry = shared_registry();
    registry.write().load(vec![
        RecipeDefinition::new("A").group("G"),
        RecipeDefinition::new("B").group("G"),
        RecipeDefinition::new("C").group("G"),
    ]);
    let transport = RecipeTransport::new(registry);

    let mut items = Vec::new();
    transport
        .list(Envelope::new(), |item| {
            let stop = matches!(item, ListItem::Entry(_));
            items.push(item);
            if stop {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[1], ListItem::End);
}

#[tokio::test]
async fn test_list_fails_closed() {
    let registry = shared_registry();
    let secret = registry
        .write()
        .register(RecipeDefinition::new("Safe").group("Office"))
        .unwrap();
    registry
        .write()
        .register(RecipeDefinition::new("Lamp").group("Office"))
        .unwrap();
    let secret_id = secret.id().as_str().to_string();
    let transport = RecipeTransport::new(registry).with_authorizer(FnAuthorizer::new(
        move |request: &AuthorizeRequest| {
            request.authorize == Access::Read && request.id != secret_id
        },
    ));

    let mut items = Vec::new();
    let rejection = transport
        .list(Envelope::new(), |item| {
            items.push(item);
            ControlFlow::Continue(())
        })
        .await
        .unwrap_err();

    assert_eq!(rejection.error, TransportError::NotAuthorized);
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_list_empty_registry_only_ends() {
    let transport = RecipeTransport::new(shared_registry());
    let mut items = Vec::new();
    transport
        .list(Envelope::new(), |item| {
            items.push(item);
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(items, vec![ListItem::End]);
}

#[tokio::test]
async fn test_added_is_never_implemented() {
    let transport = RecipeTransport::new(shared_registry());
    let request = Envelope::new().with_id("urn:iotdb:recipe:x");
    let rejection = transport.added(request.clone()).await.unwrap_err();
    assert_eq!(rejection.error, TransportError::NeverImplemented);
    assert_eq!(rejection.echo, request);
}
