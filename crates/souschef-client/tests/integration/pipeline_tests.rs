use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use souschef_core::{ExtractionFailure, ExtractionRequest, Ingredient};

use crate::common::{mock_generation, mock_page, service_for, tatin_page};

fn tatin_json(grouping_id: i64) -> String {
    json!({
        "groupingId": grouping_id,
        "name": "Cafe Tarte Tatin",
        "components": [{
            "name": "Tarte Tatin",
            "instructions": [
                {"step": 2, "text": "Caramelize sugar"},
                {"step": 1, "text": "Peel apples"}
            ],
            "ingredients": [
                {"name": "apples", "quantity": "4", "unit": ""},
                {"name": "sugar", "quantity": 100, "unit": "g"}
            ]
        }]
    })
    .to_string()
}

#[tokio::test]
async fn page_to_recipe_over_http() {
    let mut server = mockito::Server::new_async().await;
    let page = mock_page(&mut server, "/tatin", &tatin_page()).await;
    let generate = mock_generation(
        &mut server,
        Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "model": "qwen2.5:7b",
                "stream": false,
                "format": "json",
                "keep_alive": 0
            })),
            Matcher::Regex("Dish ID: 7".into()),
            Matcher::Regex("4 apples".into()),
        ]),
        &tatin_json(999),
    )
    .await;

    let recipe = service_for(&server)
        .extract_request(
            ExtractionRequest::from_url(format!("{}/tatin", server.url()), 7),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(recipe.grouping_id, 7);
    assert_eq!(recipe.name, "Cafe Tarte Tatin");
    let component = &recipe.components[0];
    assert_eq!(
        component.ingredients[1],
        Ingredient {
            name: "sugar".into(),
            quantity: "100".into(),
            unit: "g".into(),
        }
    );
    let ordered: Vec<&str> = component
        .ordered_instructions()
        .iter()
        .map(|i| i.text.as_str())
        .collect();
    assert_eq!(ordered, vec!["Peel apples", "Caramelize sugar"]);

    page.assert_async().await;
    generate.assert_async().await;
}

#[tokio::test]
async fn page_chrome_is_not_sent_to_the_model() {
    let mut server = mockito::Server::new_async().await;
    mock_page(&mut server, "/tatin", &tatin_page()).await;
    let leaked = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::Regex("newsletter|Desserts|track\\(\\)".into()))
        .expect(0)
        .create_async()
        .await;
    mock_generation(&mut server, Matcher::Any, &tatin_json(7)).await;

    service_for(&server)
        .extract_request(
            ExtractionRequest::from_url(format!("{}/tatin", server.url()), 7),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    leaked.assert_async().await;
}

#[tokio::test]
async fn short_page_never_calls_the_model() {
    let mut server = mockito::Server::new_async().await;
    mock_page(
        &mut server,
        "/blocked",
        "<html><body><h1>Access denied</h1><p>Please enable cookies.</p></body></html>",
    )
    .await;
    let generate = server
        .mock("POST", "/api/generate")
        .expect(0)
        .create_async()
        .await;

    let err = service_for(&server)
        .extract_request(
            ExtractionRequest::from_url(format!("{}/blocked", server.url()), 7),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractionFailure::SourceUnavailable(ref m) if m.contains("too short")));
    generate.assert_async().await;
}

#[tokio::test]
async fn generation_server_error_is_a_transport_failure() {
    let mut server = mockito::Server::new_async().await;
    mock_page(&mut server, "/tatin", &tatin_page()).await;
    server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_body("{\"error\": \"llama runner process has terminated\"}")
        .create_async()
        .await;

    let err = service_for(&server)
        .extract_request(
            ExtractionRequest::from_url(format!("{}/tatin", server.url()), 7),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ExtractionFailure::GenerationTransport {
            message: "llama runner process has terminated".into(),
            status_code: Some(500),
            retryable: true,
        }
    );
}

#[tokio::test]
async fn prose_answer_is_a_decode_failure() {
    let mut server = mockito::Server::new_async().await;
    mock_page(&mut server, "/tatin", &tatin_page()).await;
    mock_generation(&mut server, Matcher::Any, "Sure! Here is the recipe you asked for.").await;

    let err = service_for(&server)
        .extract_request(
            ExtractionRequest::from_url(format!("{}/tatin", server.url()), 7),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        ExtractionFailure::Decode { message, raw } => {
            assert!(message.starts_with("invalid JSON"));
            assert_eq!(raw, "Sure! Here is the recipe you asked for.");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn image_to_recipe_over_http() {
    let mut server = mockito::Server::new_async().await;
    let generate = mock_generation(
        &mut server,
        Matcher::PartialJson(json!({
            "model": "llama3.2-vision:11b",
            "prompt": "Extract recipe for Dish ID 5",
            "images": ["aGFuZHdyaXR0ZW4="]
        })),
        &json!({
            "groupingId": 5,
            "name": "Egg and flour",
            "components": [{
                "name": "Ingredients",
                "instructions": [],
                "ingredients": [
                    {"name": "eggs", "quantity": 2, "unit": ""},
                    {"name": "flour", "quantity": "1", "unit": "cup"}
                ]
            }]
        })
        .to_string(),
    )
    .await;

    let recipe = service_for(&server)
        .extract_request(
            ExtractionRequest::from_image(b"handwritten".to_vec(), 5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(recipe.components.len(), 1);
    assert_eq!(recipe.ingredient_count(), 2);
    assert_eq!(recipe.instruction_count(), 0);
    generate.assert_async().await;
}
