use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

use souschef_client::{OllamaClient, StaticRenderer};
use souschef_core::{ExtractionService, PromptBuilder};

/// A recipe page whose visible text is well above the minimum length.
pub fn tatin_page() -> String {
    let story = "This upside-down tart was made by accident at the Hotel Tatin in Lamotte-Beuvron. \
                 The apples caramelize in butter and sugar before the pastry goes on top. ";
    format!(
        "<html><head><script>track()</script></head><body>\
         <nav>Home | Desserts | About</nav>\
         <h1>Café Tarte Tatin</h1>\
         <p>{}</p>\
         <ul><li>4 apples</li><li>100g sugar</li></ul>\
         <ol><li>Peel apples</li><li>Caramelize sugar</li></ol>\
         <footer>Subscribe to our newsletter</footer>\
         </body></html>",
        story.repeat(3)
    )
}

pub fn generation_body(response: &str) -> String {
    json!({
        "model": "qwen2.5:7b",
        "response": response,
        "done": true
    })
    .to_string()
}

pub async fn mock_page(server: &mut ServerGuard, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}

pub async fn mock_generation(server: &mut ServerGuard, body_match: Matcher, response: &str) -> Mock {
    server
        .mock("POST", "/api/generate")
        .match_body(body_match)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(generation_body(response))
        .create_async()
        .await
}

/// Full pipeline wired to a mock server for both the page and the model.
pub fn service_for(server: &Server) -> ExtractionService<StaticRenderer, OllamaClient> {
    let renderer = StaticRenderer::new()
        .expect("renderer")
        .allow_private_urls();
    let client = OllamaClient::new(format!("{}/api/generate", server.url())).expect("client");
    ExtractionService::new(renderer, client, PromptBuilder::default()).expect("service")
}
