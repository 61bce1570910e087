use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use livestats::{
    config::{ResolverConfig, SessionConfig},
    errors::{FetchError, SessionError, SessionResult},
    ingestor::FeedWatcher,
    metrics::SampleForwarder,
    models::{Credential, Sample, ThreadWatermark},
    session::{FrameStream, SessionOutcome, StreamConnector, StreamingSession},
    sources::{EndpointResolver, FeedScanner},
    storage::RecordStore,
    utils::HttpFetcher,
};

const FEED_URL: &str = "https://feed.example.com/r/live/new/.rss";
const STREAM_URL: &str = "wss://ws.example.com/live/evx?m=token";

// Fake HTTP server keyed by URL
#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl FakeWeb {
    fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl HttpFetcher for FakeWeb {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::status(404, url))
    }
}

#[derive(Default)]
struct FakeStream {
    connections: Mutex<VecDeque<Vec<String>>>,
    urls: Mutex<Vec<String>>,
}

#[async_trait]
impl StreamConnector for FakeStream {
    async fn connect(&self, url: &str) -> SessionResult<FrameStream> {
        self.urls.lock().unwrap().push(url.to_string());
        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(frames) => Ok(Box::pin(futures::stream::iter(
                frames.into_iter().map(Ok::<_, SessionError>),
            ))),
            None => Err(SessionError::connect(url, "no more scripted connections")),
        }
    }
}

#[derive(Default)]
struct CollectingForwarder {
    samples: Mutex<Vec<Sample>>,
}

#[async_trait]
impl SampleForwarder for CollectingForwarder {
    async fn forward(&self, sample: &Sample, _credential: &Credential) {
        self.samples.lock().unwrap().push(sample.clone());
    }
}

fn atom_feed(title: &str, link: &str, updated: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>newest submissions</title>
  <entry>
    <title>Daily discussion</title>
    <link href="https://www.reddit.com/r/live/comments/abc/" />
    <updated>2016-05-01T14:30:00+00:00</updated>
  </entry>
  <entry>
    <title>{title}</title>
    <link href="{link}" />
    <updated>{updated}</updated>
  </entry>
</feed>"#
    )
}

#[tokio::test]
async fn test_feed_to_record_log_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::with_dir(dir.path(), "csv");

    let web = Arc::new(
        FakeWeb::default()
            .with_page(
                FEED_URL,
                &atom_feed(
                    "[live] Event X",
                    "https://www.reddit.com/live/evx/",
                    "2016-05-01T14:03:22+00:00",
                ),
            )
            .with_page(
                "https://www.reddit.com/live/evx/about.json",
                &format!(r#"{{"kind":"LiveUpdateEvent","data":{{"title":"Event X","websocket_url":"{STREAM_URL}"}}}}"#),
            ),
    );

    // W0 sits one minute before T1
    let t1 = Utc.with_ymd_and_hms(2016, 5, 1, 14, 3, 22).unwrap();
    let w0 = ThreadWatermark::at(t1 - chrono::Duration::seconds(60));

    let scanner = FeedScanner::new(web.clone(), FEED_URL, "about.json");
    let mut watcher = FeedWatcher::with_watermark(scanner, Duration::from_secs(60), w0);

    let scan_started = t1 + chrono::Duration::seconds(30);
    let candidate = watcher.check_at(scan_started).await.unwrap().unwrap();
    assert_eq!(candidate.title, "[live] Event X");
    assert_eq!(watcher.watermark(), ThreadWatermark::at(scan_started));

    let thread_id = candidate.thread_id().unwrap();
    assert_eq!(thread_id, "evx");

    let resolver = EndpointResolver::new(web.clone(), store.clone(), ResolverConfig::default());
    let endpoint = resolver
        .resolve_at(&thread_id, &candidate.metadata_url)
        .await
        .unwrap();
    assert_eq!(endpoint.streaming_url.as_deref(), Some(STREAM_URL));

    let stream = Arc::new(FakeStream::default());
    stream.connections.lock().unwrap().push_back(vec![
        r#"{"type":"activity","payload":{"count":100}}"#.to_string(),
        r#"{"type":"complete","payload":null}"#.to_string(),
    ]);
    let forwarder = Arc::new(CollectingForwarder::default());

    let outcome = StreamingSession::new(
        endpoint,
        stream.clone(),
        store.clone(),
        forwarder.clone(),
        Credential::new("secret"),
        SessionConfig::default(),
    )
    .run()
    .await
    .unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(*stream.urls.lock().unwrap(), vec![STREAM_URL.to_string()]);

    let log = std::fs::read_to_string(store.log_path("evx")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Date,Series1");
    assert!(lines[1].ends_with(",100"), "row was {:?}", lines[1]);

    let forwarded = forwarder.samples.lock().unwrap();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].viewer_count, 100);
    assert_eq!(forwarded[0].thread_id, "evx");
    assert_eq!(forwarded[0].title, "Event X");
}

#[tokio::test]
async fn test_thread_already_over_never_connects() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::with_dir(dir.path(), "csv");
    let web = Arc::new(FakeWeb::default().with_page(
        "http://www.reddit.com/live/gone/about.json",
        r#"{"data":{"title":"Gone","websocket_url":null}}"#,
    ));

    let resolver = EndpointResolver::new(web, store.clone(), ResolverConfig::default());
    let endpoint = resolver.resolve("gone").await.unwrap();
    assert!(endpoint.is_over());

    let stream = Arc::new(FakeStream::default());
    let outcome = StreamingSession::new(
        endpoint,
        stream.clone(),
        store.clone(),
        Arc::new(CollectingForwarder::default()),
        Credential::new("secret"),
        SessionConfig::default(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(outcome, SessionOutcome::AlreadyOver);
    assert!(stream.urls.lock().unwrap().is_empty());
    assert!(!store.log_path("gone").exists());
}

#[tokio::test]
async fn test_appends_across_reconnects_keep_single_header() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::with_dir(dir.path(), "csv");
    let web = Arc::new(FakeWeb::default().with_page(
        "http://www.reddit.com/live/evx/about.json",
        &format!(r#"{{"data":{{"title":"Event X","websocket_url":"{STREAM_URL}"}}}}"#),
    ));

    let resolver = EndpointResolver::new(web, store.clone(), ResolverConfig::default());
    let endpoint = resolver.resolve("evx").await.unwrap();

    let stream = Arc::new(FakeStream::default());
    {
        let mut connections = stream.connections.lock().unwrap();
        connections.push_back(vec![
            r#"{"type":"activity","payload":{"count":1}}"#.to_string(),
            r#"{"type":"activity","payload":{"count":"2"}}"#.to_string(),
        ]);
        connections.push_back(vec![
            r#"{"type":"heartbeat"}"#.to_string(),
            r#"{"type":"activity","payload":{"count":3.0}}"#.to_string(),
            r#"{"type":"complete"}"#.to_string(),
        ]);
    }
    let forwarder = Arc::new(CollectingForwarder::default());

    StreamingSession::new(
        endpoint,
        stream.clone(),
        store.clone(),
        forwarder.clone(),
        Credential::new("secret"),
        SessionConfig::default(),
    )
    .run()
    .await
    .unwrap();

    let log = std::fs::read_to_string(store.log_path("evx")).unwrap();
    let counts: Vec<&str> = log
        .lines()
        .skip(1)
        .filter_map(|row| row.rsplit(',').next())
        .collect();
    assert_eq!(log.lines().next(), Some("Date,Series1"));
    assert_eq!(counts, vec!["1", "2", "3"]);
    assert_eq!(stream.urls.lock().unwrap().len(), 2);

    let forwarded: Vec<i64> = forwarder
        .samples
        .lock()
        .unwrap()
        .iter()
        .map(|sample| sample.viewer_count)
        .collect();
    assert_eq!(forwarded, vec![1, 2, 3]);
}
