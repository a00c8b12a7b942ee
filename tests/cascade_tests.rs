use std::sync::Arc;

use flow_inspirations::{
    resolve::{
        cascade::{read_input, target_for},
        model::{FlowScreen, Recommendation, Resolution, ResolveResponse},
    },
    trace::logger::TraceLogger,
};

use crate::common::mocks::{MockCatalog, MockObjects, MockSearch, fixture_aliases, resolver};

mod common;

fn structured(app: &str, flow: &str) -> Recommendation {
    Recommendation {
        app: Some(app.into()),
        flow: Some(flow.into()),
        text: None,
    }
}

fn free_text(text: &str) -> Recommendation {
    Recommendation {
        app: None,
        flow: None,
        text: Some(text.into()),
    }
}

const STORED: &str = "https://x.supabase.co/storage/v1/object/public/flows/Duolingo%20iOS/Onboarding";

// =========================================================================
// Input and alias stages
// =========================================================================

#[test]
fn read_input_prefers_structured_fields() {
    let rec = Recommendation {
        app: Some("  Duolingo ".into()),
        flow: Some(" Onboarding".into()),
        text: Some("uber home".into()),
    };
    assert_eq!(read_input(&rec), Some(("Duolingo".into(), "Onboarding".into())));
}

#[test]
fn read_input_falls_back_to_text_when_a_field_is_missing() {
    let rec = Recommendation {
        app: Some("Duolingo".into()),
        flow: None,
        text: Some("Uber Home".into()),
    };
    assert_eq!(read_input(&rec), Some(("uber".into(), "home".into())));
}

#[test]
fn read_input_keeps_partial_fields_when_text_does_not_split() {
    let rec = Recommendation {
        app: Some("Duolingo".into()),
        flow: None,
        text: Some("onboarding".into()),
    };
    assert_eq!(read_input(&rec), Some(("Duolingo".into(), "".into())));
}

#[test]
fn read_input_without_app_is_none() {
    assert_eq!(read_input(&Recommendation::default()), None);
    assert_eq!(read_input(&structured("   ", "Onboarding")), None);
    assert_eq!(read_input(&free_text("duolingo")), None);
}

#[test]
fn target_folder_joins_exact_names() {
    let aliases = fixture_aliases();

    let target = target_for(&aliases, "duolingo", "onboarding");
    assert_eq!(target.app, "Duolingo iOS");
    assert_eq!(target.flow, "Onboarding");
    assert_eq!(target.folder, "Duolingo iOS Onboarding");

    let target = target_for(&aliases, "Figma", "");
    assert_eq!(target.folder, "Figma", "No flow: folder is the app alone");
}

// =========================================================================
// Catalog tier
// =========================================================================

#[tokio::test]
async fn catalog_hit_short_circuits_later_tiers() {
    let catalog = Arc::new(
        MockCatalog::empty()
            .with_flow("f1", "Duolingo iOS", "Onboarding")
            .with_screen("f1", 1, &format!("{}/01.png", STORED)),
    );
    let objects = Arc::new(MockObjects::with_names(&["01.png"]));
    let search = Arc::new(MockSearch::with_sources(&["https://a.com"]));

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("Duolingo", "Onboarding"))
        .await;

    assert!(matches!(resolution, Resolution::Screens { .. }));
    assert_eq!(objects.list_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn catalog_screens_are_returned_in_order_index_order() {
    let catalog = Arc::new(
        MockCatalog::empty()
            .with_flow("f1", "Duolingo iOS", "Onboarding")
            .with_screen("f1", 3, "https://cdn.example.com/c.png")
            .with_screen("f1", 1, "https://cdn.example.com/a.png")
            .with_screen("f1", 2, "https://cdn.example.com/b.png"),
    );
    let objects = Arc::new(MockObjects::empty());
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    let Resolution::Screens { app, flow, screens } = resolution else {
        panic!("expected screens");
    };
    assert_eq!(app, "Duolingo iOS");
    assert_eq!(flow, "Onboarding");
    let orders: Vec<i64> = screens.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(screens[0].image_url, "https://cdn.example.com/a.png");
    // External URLs are not signed
    assert_eq!(objects.sign_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn catalog_storage_urls_are_decoded_then_signed() {
    let catalog = Arc::new(
        MockCatalog::empty()
            .with_flow("f1", "Duolingo iOS", "Onboarding")
            .with_screen("f1", 1, &format!("{}/01.png", STORED)),
    );
    let objects = Arc::new(MockObjects::empty());
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    assert_eq!(
        objects.signed_paths.lock().unwrap().clone(),
        vec!["Duolingo iOS/Onboarding/01.png".to_string()]
    );
    let Resolution::Screens { screens, .. } = resolution else {
        panic!("expected screens");
    };
    assert_eq!(
        screens[0].image_url,
        "https://signed.test/Duolingo iOS/Onboarding/01.png?token=abc"
    );
}

#[tokio::test]
async fn catalog_keeps_stored_url_when_signing_fails() {
    let stored = format!("{}/01.png", STORED);
    let catalog = Arc::new(
        MockCatalog::empty()
            .with_flow("f1", "Duolingo iOS", "Onboarding")
            .with_screen("f1", 1, &stored),
    );
    let objects = Arc::new(MockObjects::empty().failing_signatures());
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    let Resolution::Screens { screens, .. } = resolution else {
        panic!("expected screens");
    };
    assert_eq!(screens[0].image_url, stored);
}

#[tokio::test]
async fn catalog_only_uses_the_first_matching_flow() {
    let mut catalog = MockCatalog::empty()
        .with_flow("f1", "Duolingo iOS", "Onboarding")
        .with_flow("f2", "Duolingo iOS", "Onboarding v2")
        .with_screen("f1", 1, "https://cdn.example.com/f1.png")
        .with_screen("f2", 1, "https://cdn.example.com/f2.png");
    // A screen reported under the wrong flow must not leak in
    catalog.screens.push(FlowScreen {
        flow_id: "f2".into(),
        order_index: 2,
        image_url: Some("https://cdn.example.com/f2b.png".into()),
        caption: Some("other".into()),
    });
    let catalog = Arc::new(catalog);
    let objects = Arc::new(MockObjects::empty());
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    let Resolution::Screens { screens, .. } = resolution else {
        panic!("expected screens");
    };
    assert_eq!(screens.len(), 1);
    assert_eq!(screens[0].image_url, "https://cdn.example.com/f1.png");
}

#[tokio::test]
async fn catalog_flow_without_screens_falls_through_to_storage() {
    let catalog = Arc::new(MockCatalog::empty().with_flow("f1", "Duolingo iOS", "Onboarding"));
    let objects = Arc::new(MockObjects::with_names(&["1.png"]));
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    assert!(matches!(resolution, Resolution::Screens { .. }));
    assert_eq!(objects.list_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(search.calls(), 0);
}

// =========================================================================
// Storage tier
// =========================================================================

#[tokio::test]
async fn storage_listing_is_filtered_sorted_and_numbered() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["10.png", "notes.txt", "2.png", "1.JPG"]));
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    assert_eq!(
        objects.listed_prefixes.lock().unwrap().clone(),
        vec!["Duolingo iOS Onboarding".to_string()]
    );
    let Resolution::Screens { screens, .. } = resolution else {
        panic!("expected screens");
    };
    let orders: Vec<i64> = screens.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(
        screens[0].image_url,
        "https://signed.test/Duolingo iOS Onboarding/1.JPG?token=abc"
    );
    assert!(screens[2].image_url.contains("10.png"));
    assert!(screens.iter().all(|s| s.caption.is_none()));
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn storage_signing_failures_fall_back_to_public_urls() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["2.png", "1.png"]).failing_signatures());
    let search = Arc::new(MockSearch::empty());

    let response: ResolveResponse = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await
        .into();

    assert!(response.ok);
    let screens = &response.data[0].screens;
    assert_eq!(screens.len(), 2);
    assert_eq!(screens[0].image_url, "https://public.test/flows/Duolingo iOS Onboarding/1.png");
    assert_eq!(screens[1].image_url, "https://public.test/flows/Duolingo iOS Onboarding/2.png");
    assert_eq!(objects.sign_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn storage_uses_unaliased_names_on_miss() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["01.png"]));
    let search = Arc::new(MockSearch::empty());

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&structured("Figma", "Prototyping"))
        .await;

    assert_eq!(
        objects.listed_prefixes.lock().unwrap().clone(),
        vec!["Figma Prototyping".to_string()]
    );
    let Resolution::Screens { app, flow, .. } = resolution else {
        panic!("expected screens");
    };
    assert_eq!((app.as_str(), flow.as_str()), ("Figma", "Prototyping"));
}

// =========================================================================
// Search tier and terminal stage
// =========================================================================

#[tokio::test]
async fn search_runs_once_when_nothing_is_stored() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::empty());
    let search = Arc::new(MockSearch::with_sources(&["https://dribbble.com/1", "https://behance.net/2"]));

    let response: ResolveResponse = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await
        .into();

    assert_eq!(search.calls(), 1);
    assert_eq!(
        search.queries.lock().unwrap().clone(),
        vec![("Duolingo iOS".to_string(), "Onboarding".to_string())]
    );
    assert!(response.ok);
    assert!(response.data.is_empty());
    assert_eq!(response.sources.as_ref().map(Vec::len), Some(2));
    assert_eq!(response.is_perplexity_fallback, Some(true));
}

#[tokio::test]
async fn full_fallthrough_ends_in_empty_success() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["readme.md"]));
    let search = Arc::new(MockSearch::empty());

    let response: ResolveResponse = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await
        .into();

    assert_eq!(search.calls(), 1);
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"ok": true, "data": []})
    );
}

#[tokio::test]
async fn empty_request_touches_no_collaborator() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["1.png"]));
    let search = Arc::new(MockSearch::with_sources(&["https://a.com"]));

    let resolution = resolver(&catalog, &objects, &search)
        .resolve(&Recommendation::default())
        .await;

    assert_eq!(resolution, Resolution::Empty);
    assert_eq!(catalog.calls(), 0);
    assert_eq!(objects.calls(), 0);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn free_text_is_split_and_aliased() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["1.png"]));
    let search = Arc::new(MockSearch::empty());

    resolver(&catalog, &objects, &search)
        .resolve(&free_text("Duolingo Onboarding"))
        .await;

    assert_eq!(
        objects.listed_prefixes.lock().unwrap().clone(),
        vec!["Duolingo iOS Onboarding".to_string()]
    );
}

// =========================================================================
// Response shape and trace
// =========================================================================

#[tokio::test]
async fn screens_response_has_slug_and_null_description() {
    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::with_names(&["1.png"]));
    let search = Arc::new(MockSearch::empty());

    let response: ResolveResponse = resolver(&catalog, &objects, &search)
        .resolve(&structured("duolingo", "onboarding"))
        .await
        .into();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["ok"], true);
    assert_eq!(json["data"][0]["appName"], "Duolingo iOS");
    assert_eq!(json["data"][0]["flowName"], "Onboarding");
    assert_eq!(json["data"][0]["slug"], "Duolingo%20iOS/Onboarding");
    assert!(json["data"][0]["description"].is_null());
    assert!(json["data"][0]["id"].as_str().is_some_and(|id| id.len() == 36));
    assert_eq!(json["data"][0]["screens"][0]["order"], 1);
    assert!(json["data"][0]["screens"][0]["imageUrl"].is_string());
    assert!(json.get("sources").is_none());
    assert!(json.get("isPerplexityFallback").is_none());
}

#[tokio::test]
async fn trace_records_each_tier_attempted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let tracer = Arc::new(TraceLogger::new(path.to_str().unwrap()));

    let catalog = Arc::new(MockCatalog::empty());
    let objects = Arc::new(MockObjects::empty());
    let search = Arc::new(MockSearch::empty());

    resolver(&catalog, &objects, &search)
        .with_tracer(tracer)
        .resolve(&structured("duolingo", "onboarding"))
        .await;

    let content = std::fs::read_to_string(&path).unwrap();
    let tiers: Vec<String> = content
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["tier"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(tiers, vec!["catalog", "storage", "search"]);
}
