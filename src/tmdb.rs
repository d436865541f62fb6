// Blocking client for The Movie Database (TMDb) v3 API.
//
// - /discover/movie backs `search_page`, filtered by primary release date
// - /movie/{id} backs `fetch_record_details`
// - 429 responses are waited out here and never reach the retrier

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{DetailRecord, Query, Record, ResultPage};
use crate::error::ServiceError;
use crate::service::SearchService;

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_REGION: &str = "US";

const RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    page: u32,
    total_pages: u32,
    total_results: u64,
    results: Vec<MovieResult>,
}

#[derive(Debug, Deserialize)]
struct MovieResult {
    id: u64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    genre_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    id: u64,
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: u32,
}

pub struct TmdbClient {
    base_url: String,
    api_key: String,
    region: String,
    http_client: Client,
    /// Raw response bodies keyed by request URL. `None` disables caching.
    cache: Option<Mutex<HashMap<String, String>>>,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ServiceError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            http_client,
            cache: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    fn discover_url(&self, query: &Query) -> Result<Url, ServiceError> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("region", self.region.clone()),
            ("primary_release_date.gte", query.start_date.to_string()),
            ("primary_release_date.lte", query.end_date.to_string()),
            ("sort_by", "primary_release_date.asc".to_string()),
            ("page", query.page.to_string()),
        ];

        if let Some(min) = query.filters.min_duration {
            params.push(("with_runtime.gte", min.to_string()));
        }

        if let Some(ids) = &query.filters.one_of_category {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            params.push(("with_genres", ids.join("|")));
        }

        Ok(Url::parse_with_params(
            &format!("{}/discover/movie", self.base_url),
            &params,
        )?)
    }

    fn details_url(&self, id: u64) -> Result<Url, ServiceError> {
        Ok(Url::parse_with_params(
            &format!("{}/movie/{}", self.base_url, id),
            &[("api_key", self.api_key.as_str())],
        )?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let key = url.to_string();

        if let Some(cache) = &self.cache {
            let cached = cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(&key)
                .cloned();
            if let Some(body) = cached {
                return Ok(serde_json::from_str(&body)?);
            }
        }

        let body = self.get_body(url)?;
        let value = serde_json::from_str(&body)?;

        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(key, body);
        }
        Ok(value)
    }

    fn get_body(&self, url: Url) -> Result<String, ServiceError> {
        loop {
            let response = self.http_client.get(url.clone()).send()?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(RATE_LIMIT_WAIT);
                debug!(
                    action = "wait",
                    component = "tmdb_client",
                    wait_ms = wait.as_millis(),
                    "Rate limited, waiting"
                );
                thread::sleep(wait);
                continue;
            }

            let body = response.text()?;
            if !status.is_success() {
                return Err(ServiceError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(body);
        }
    }
}

impl SearchService for TmdbClient {
    fn search_page(&self, query: &Query) -> Result<ResultPage, ServiceError> {
        let response: DiscoverResponse = self.get_json(self.discover_url(query)?)?;

        let records = response
            .results
            .into_iter()
            .filter_map(|movie| {
                let parsed = movie
                    .release_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
                match parsed {
                    Some(release_date) => Some(Record {
                        id: movie.id,
                        release_date,
                        title: movie.title,
                        duration: None,
                        categories: movie.genre_ids,
                    }),
                    None => {
                        warn!(
                            action = "skip",
                            component = "tmdb_client",
                            record_id = movie.id,
                            release_date = ?movie.release_date,
                            "Result without a usable release date"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(ResultPage {
            page_number: response.page,
            total_pages: response.total_pages.max(1),
            total_results: response.total_results,
            records,
        })
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }
    }

    fn fetch_record_details(&self, id: u64) -> Result<DetailRecord, ServiceError> {
        let details: MovieDetails = self.get_json(self.details_url(id)?)?;
        Ok(DetailRecord {
            id: details.id,
            duration: details.runtime,
            categories: details.genres.into_iter().map(|g| g.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Filters;
    use crate::testing::date;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn client() -> TmdbClient {
        TmdbClient::new("secret").unwrap()
    }

    fn response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
    }

    /// Answers one connection per canned response, in order, then stops
    /// listening. Returns the base URL and the request lines it saw.
    fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut request_lines = Vec::new();
            for reply in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request_lines.push(line.trim_end().to_string());
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    if header == "\r\n" || header.is_empty() {
                        break;
                    }
                }
                stream.write_all(reply.as_bytes()).unwrap();
            }
            request_lines
        });
        (base_url, handle)
    }

    fn local_client(base_url: String) -> TmdbClient {
        TmdbClient {
            http_client: Client::builder().no_proxy().build().unwrap(),
            ..client()
        }
        .with_base_url(base_url)
    }

    const MATRIX_DETAILS: &str = r#"{"id": 603, "runtime": 136, "genres": [{"id": 28}, {"id": 878}]}"#;

    #[test]
    fn discover_url_carries_filters() {
        let query = Query {
            start_date: date("1999-01-01"),
            end_date: date("1999-03-31"),
            filters: Filters {
                min_duration: Some(40),
                one_of_category: Some([28, 12].into_iter().collect()),
            },
            page: 4,
        };

        let url = client().discover_url(&query).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.path(), "/3/discover/movie");
        assert_eq!(params["primary_release_date.gte"], "1999-01-01");
        assert_eq!(params["primary_release_date.lte"], "1999-03-31");
        assert_eq!(params["page"], "4");
        assert_eq!(params["region"], "US");
        assert_eq!(params["with_runtime.gte"], "40");
        assert_eq!(params["with_genres"], "12|28");
    }

    #[test]
    fn unfiltered_url_omits_optional_params() {
        let query = Query::first_page(date("1999-01-01"), date("1999-01-02"), &Filters::default());

        let url = client().with_region("GB").discover_url(&query).unwrap();
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert!(!params.contains_key("with_runtime.gte"));
        assert!(!params.contains_key("with_genres"));
        assert_eq!(params["region"], "GB");
    }

    #[test]
    fn discover_response_decodes() {
        let body = r#"{
            "page": 1,
            "total_pages": 0,
            "total_results": 0,
            "results": []
        }"#;
        let response: DiscoverResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.total_pages.max(1), 1);

        let body = r#"{"id": 603, "title": "The Matrix", "release_date": "1999-03-31", "genre_ids": [28, 878]}"#;
        let movie: MovieResult = serde_json::from_str(body).unwrap();
        assert_eq!(movie.genre_ids, vec![28, 878]);
        assert_eq!(movie.release_date.as_deref(), Some("1999-03-31"));
    }

    #[test]
    fn cached_responses_survive_until_invalidated() {
        let (base_url, server) = serve(vec![response("200 OK", "", MATRIX_DETAILS)]);
        let client = local_client(base_url).with_cache(true);

        let first = client.fetch_record_details(603).unwrap();
        assert_eq!(first.duration, Some(136));
        assert_eq!(first.categories, vec![28, 878]);

        // The server has stopped listening, so this can only come from the cache.
        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /movie/603?api_key=secret"));
        assert_eq!(client.fetch_record_details(603).unwrap(), first);

        client.invalidate_cache();
        assert!(client.fetch_record_details(603).is_err());
    }

    #[test]
    fn uncached_client_always_goes_to_the_server() {
        let (base_url, server) = serve(vec![
            response("200 OK", "", MATRIX_DETAILS),
            response("404 Not Found", "", r#"{"status_code": 34}"#),
        ]);
        let client = local_client(base_url);

        assert!(client.fetch_record_details(603).is_ok());
        match client.fetch_record_details(603) {
            Err(ServiceError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected a 404, got {other:?}"),
        }
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn rate_limited_requests_wait_and_repeat() {
        let body = r#"{
            "page": 1,
            "total_pages": 1,
            "total_results": 2,
            "results": [
                {"id": 1, "title": "Kept", "release_date": "1999-01-02", "genre_ids": [18]},
                {"id": 2, "title": "Undated", "release_date": ""}
            ]
        }"#;
        let (base_url, server) = serve(vec![
            response("429 Too Many Requests", "Retry-After: 0\r\n", "{}"),
            response("200 OK", "", body),
        ]);
        let client = local_client(base_url);
        let query = Query::first_page(date("1999-01-01"), date("1999-01-31"), &Filters::default());

        let page = client.search_page(&query).unwrap();

        assert_eq!(page.total_results, 2);
        let ids: Vec<u64> = page.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(page.records[0].release_date, date("1999-01-02"));
        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }
}
