//! Integration tests for the recipe runtime context
//!
//! Tests cover:
//! - Watched things driving the default validator
//! - Custom validators and init hooks
//! - done() resetting a running recipe
//! - Notifications per mutation

use super::test_utils::FakeThings;
use iotdb_recipes::context::StateUpdate;
use iotdb_recipes::recipe::normalize::UNREACHABLE_TEXT;
use iotdb_recipes::{RecipeDefinition, Registry};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_default_validator_follows_watched_things() {
    let lamps = FakeThings::new(0);
    let mut registry = Registry::new();
    let recipe = registry
        .register(
            RecipeDefinition::new("Night Light")
                .group("Hall")
                .watch(lamps.clone()),
        )
        .unwrap();
    let context = recipe.context();

    assert_eq!(context.status().text.as_deref(), Some(UNREACHABLE_TEXT));

    lamps.set_reachable(1);
    assert_eq!(context.status().text, None);

    lamps.set_reachable(0);
    assert_eq!(context.status().text.as_deref(), Some(UNREACHABLE_TEXT));
}

#[test]
fn test_any_unreachable_watch_marks_recipe() {
    let lamps = FakeThings::new(2);
    let sensors = FakeThings::new(0);
    let mut registry = Registry::new();
    let recipe = registry
        .register(
            RecipeDefinition::new("Motion Light")
                .group("Hall")
                .watch(lamps.clone())
                .watch(sensors.clone()),
        )
        .unwrap();

    assert_eq!(
        recipe.context().status().text.as_deref(),
        Some(UNREACHABLE_TEXT)
    );

    sensors.set_reachable(1);
    assert_eq!(recipe.context().status().text, None);
}

#[test]
fn test_meta_change_revalidates_with_custom_validator() {
    let things = FakeThings::new(3);
    let watched = things.clone();
    let mut registry = Registry::new();
    let recipe = registry
        .register(
            RecipeDefinition::new("Counter")
                .group("Hall")
                .watch(things.clone())
                .onvalidate(move |context| {
                    context.set_state(format!("{} reachable", watched.reachable_count()))
                }),
        )
        .unwrap();

    assert_eq!(
        recipe.context().status().text.as_deref(),
        Some("3 reachable")
    );

    things.set_reachable(5);
    things.touch_meta();
    assert_eq!(
        recipe.context().status().text.as_deref(),
        Some("5 reachable")
    );
}

#[test]
fn test_oninit_can_seed_state() {
    let mut registry = Registry::new();
    let recipe = registry
        .register(
            RecipeDefinition::new("Seeded")
                .group("Hall")
                .oninit(|context| context.set_state(json!({ "html": "<em>ready</em>" }))),
        )
        .unwrap();

    assert_eq!(
        recipe.context().status().html.as_deref(),
        Some("<em>ready</em>")
    );
}

#[test]
fn test_each_mutation_notifies_at_most_once() {
    let mut registry = Registry::new();
    let recipe = registry
        .register(RecipeDefinition::new("Chatty").group("Hall"))
        .unwrap();
    let context = recipe.context();
    let mut changes = context.subscribe();

    context.set_message("busy");
    context.set_message("busy");
    context.set_state(StateUpdate::Text("a".to_string()));
    context.set_state("a");
    context.clear_message();

    let mut count = 0;
    while let Ok(changed) = changes.try_recv() {
        assert_eq!(&changed.id, recipe.id());
        count += 1;
    }
    assert_eq!(count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_done_after_click_returns_to_idle() {
    let mut registry = Registry::new();
    let recipe = registry
        .register(
            RecipeDefinition::new("Pulse")
                .group("Hall")
                .onclick(|context, _| {
                    context.set_message("pulsing");
                    context.done(Some(Duration::from_millis(200)));
                }),
        )
        .unwrap();
    let context = recipe.context();

    context.on_click(json!(null));
    assert!(context.status().running);
    let executed = context.execute_timestamp();

    tokio::time::sleep(Duration::from_millis(250)).await;

    let status = context.status();
    assert!(!status.running);
    assert_eq!(status.message, None);
    assert!(context.execute_timestamp() > executed);
}
