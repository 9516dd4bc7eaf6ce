mod common;

use std::time::Duration;

use common::{Scripted, menu, two_dish_menu};
use menulayout_core::strategy::HeuristicStrategy;
use menulayout_core::wash::{Origin, WashItem, build_wash_payload};
use menulayout_core::{GroupingStrategy, Role, WashMode, wash_lines};

const TIMEOUT: Duration = Duration::from_secs(5);

fn contents(items: &[WashItem]) -> Vec<&str> {
    items.iter().map(|item| item.content.as_str()).collect()
}

async fn grouped_items() -> Vec<WashItem> {
    let output = HeuristicStrategy::default().group(&two_dish_menu()).await;
    WashItem::from_output(&output)
}

#[tokio::test]
async fn test_items_list_lines_before_paragraphs() {
    let items = grouped_items().await;

    assert_eq!(
        contents(&items),
        [
            "Margherita - 12",
            "Carbonara - 14",
            "Fresh basil, tomato sauce and mozzarella",
            "Guanciale, egg yolk and pecorino"
        ]
    );
    assert_eq!(items[0].origin, Origin::Individual);
    assert_eq!(items[2].origin, Origin::Paragraph);
    assert_eq!(items[2].role_hint, Some(Role::Description));
    assert_eq!(items[2].source_line_index, None);

    let payload = build_wash_payload(&items);
    assert_eq!(payload[3].index, 3);
    assert_eq!(payload[0].role_hint, Role::Unknown);
}

#[tokio::test]
async fn test_labels_partition_grouped_output() {
    let labeler = Scripted::answering(
        r#"{"segments":[
            {"index":0,"label":"dish_title"},
            {"index":1,"label":"non_dish"},
            {"index":2,"label":"description"},
            {"index":9,"label":"price"}
        ]}"#,
    );
    let outcome = wash_lines(&labeler, grouped_items().await, TIMEOUT).await;

    assert_eq!(outcome.mode, WashMode::WashSemantic);
    assert_eq!(outcome.labeled_count, 3);
    assert_eq!(contents(&outcome.partition.dish_candidates), ["Margherita - 12"]);
    assert_eq!(contents(&outcome.partition.discarded), ["Carbonara - 14"]);
    // Item 3 carries no label and keeps its description hint.
    assert_eq!(
        contents(&outcome.partition.descriptions),
        [
            "Fresh basil, tomato sauce and mozzarella",
            "Guanciale, egg yolk and pecorino"
        ]
    );
    assert!(outcome.partition.prices.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_labeler_keeps_role_hints() {
    let labeler = Scripted::hanging();
    let items = grouped_items().await;
    let started = tokio::time::Instant::now();
    let outcome = wash_lines(&labeler, items, TIMEOUT).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= TIMEOUT && elapsed <= TIMEOUT + Duration::from_millis(10));
    assert_eq!(outcome.mode, WashMode::WashTimeoutFallback);
    assert_eq!(outcome.labeled_count, 0);
    assert_eq!(outcome.partition.dish_candidates.len(), 2);
    assert_eq!(outcome.partition.descriptions.len(), 2);
}

#[tokio::test]
async fn test_failing_labeler_reports_error_mode() {
    let labeler = Scripted::failing();
    let outcome = wash_lines(&labeler, grouped_items().await, TIMEOUT).await;
    assert_eq!(outcome.mode, WashMode::WashErrorFallback);
}

#[tokio::test]
async fn test_garbage_answer_reports_parse_mode() {
    let labeler = Scripted::answering("I cannot label this menu.");
    let outcome = wash_lines(&labeler, grouped_items().await, TIMEOUT).await;
    assert_eq!(outcome.mode, WashMode::WashParseFallback);
}

#[tokio::test]
async fn test_nothing_to_wash_skips_the_labeler() {
    let labeler = Scripted::answering(r#"{"segments":[]}"#);
    let outcome = wash_lines(&labeler, Vec::new(), TIMEOUT).await;

    assert_eq!(labeler.calls(), 0);
    assert_eq!(outcome.mode, WashMode::WashEmpty);
}

#[tokio::test]
async fn test_line_items_have_no_role_hint() {
    let lines = menu(&[("Udon - 1,200円", (10.0, 50.0, 210.0, 80.0))]);
    let output = menulayout_core::strategy::LinesOnlyStrategy.group(&lines).await;
    let items = WashItem::from_output(&output);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].role_hint, None);
    assert_eq!(items[0].source_line_index, Some(0));
}
