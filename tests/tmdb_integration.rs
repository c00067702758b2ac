use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kodilink::tmdb::TmdbClient;

#[tokio::test]
async fn test_search_movie_sends_language_and_parses_popularity() {
    let mock_server = MockServer::start().await;

    let response_body = r#"{
        "results": [
            {
                "id": 603,
                "title": "The Matrix",
                "release_date": "1999-03-30",
                "popularity": 91.5
            }
        ]
    }"#;

    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("query", "matrix"))
        .and(query_param("language", "fr-FR"))
        .respond_with(ResponseTemplate::new(200).set_body_string(response_body))
        .mount(&mock_server)
        .await;

    let client = TmdbClient::with_base_url("test-key", &mock_server.uri());

    let results = client.search_movie("matrix", None, "fr").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 603);
    assert_eq!(results[0].display_title(), "The Matrix");
    assert_eq!(results[0].year(), Some(1999));
    assert!((results[0].popularity - 91.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_search_movie_with_year() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/search/movie"))
        .and(query_param("year", "1999"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"results": [{"id": 550, "title": "Fight Club"}]}"#),
        )
        .mount(&mock_server)
        .await;

    let client = TmdbClient::with_base_url("test-key", &mock_server.uri());

    let results = client
        .search_movie("fight club", Some(1999), "en")
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].display_title(), "Fight Club");
}

#[tokio::test]
async fn test_search_tv_empty_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/search/tv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results": []}"#))
        .mount(&mock_server)
        .await;

    let client = TmdbClient::with_base_url("test-key", &mock_server.uri());

    let results = client.search_tv("nonexistent", "en").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_episode_exists() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/tv/1668/season/5/episode/10"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/3/tv/1668/season/99/episode/1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&mock_server)
        .await;

    let client = TmdbClient::with_base_url("test-key", &mock_server.uri());

    assert!(client.episode_exists(1668, 5, 10).await);
    assert!(!client.episode_exists(1668, 99, 1).await);
}

#[tokio::test]
async fn test_last_aired() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/tv/1396"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"last_episode_to_air": {"season_number": 5, "episode_number": 16}}"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/3/tv/999"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"last_episode_to_air": null}"#),
        )
        .mount(&mock_server)
        .await;

    let client = TmdbClient::with_base_url("test-key", &mock_server.uri());

    assert_eq!(client.last_aired(1396).await.unwrap(), Some((5, 16)));
    assert_eq!(client.last_aired(999).await.unwrap(), None);
}
