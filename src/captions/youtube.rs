//! YouTube timed-text caption source.

use super::{CaptionLine, CaptionSource, CaptionTrack, TrackSelector};
use crate::error::{Result, SmartEdError};
use crate::video::VideoReference;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

/// Caption source backed by YouTube's public timed-text endpoint.
pub struct YoutubeCaptionSource {
    http: reqwest::Client,
    track_regex: Regex,
    attr_regex: Regex,
}

impl YoutubeCaptionSource {
    /// Create a source with a per-request timeout and optional HTTP proxy.
    pub fn with_config(timeout: Duration, proxy_url: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("smarted/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_url) = proxy_url.filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| SmartEdError::Config(format!("Invalid caption proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build()?;

        Ok(Self {
            http,
            track_regex: Regex::new(r"<track\s([^>]*?)/?>").expect("Invalid regex"),
            attr_regex: Regex::new(r#"(\w+)="([^"]*)""#).expect("Invalid regex"),
        })
    }

    /// Parse the `type=list` XML response.
    fn parse_track_list(&self, xml: &str) -> Vec<CaptionTrack> {
        self.track_regex
            .captures_iter(xml)
            .filter_map(|caps| {
                let attrs = caps.get(1)?.as_str();
                let mut language_code = None;
                let mut name = None;
                let mut kind = None;
                let mut is_default = false;

                for attr in self.attr_regex.captures_iter(attrs) {
                    let value = unescape_xml(&attr[2]);
                    match &attr[1] {
                        "lang_code" => language_code = Some(value),
                        "name" => name = Some(value).filter(|v| !v.is_empty()),
                        "kind" => kind = Some(value).filter(|v| !v.is_empty()),
                        "lang_default" => is_default = value == "true",
                        _ => {}
                    }
                }

                Some(CaptionTrack {
                    language_code: language_code?,
                    name,
                    kind,
                    is_default,
                })
            })
            .collect()
    }

    async fn fetch_json3(
        &self,
        reference: &VideoReference,
        track: &CaptionTrack,
    ) -> Result<Vec<CaptionLine>> {
        let mut query: Vec<(&str, &str)> = vec![
            ("v", reference.as_str()),
            ("lang", track.language_code.as_str()),
            ("fmt", "json3"),
        ];
        if let Some(name) = &track.name {
            query.push(("name", name.as_str()));
        }
        if let Some(kind) = &track.kind {
            query.push(("kind", kind.as_str()));
        }

        let body = self
            .http
            .get(TIMEDTEXT_URL)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        if body.trim().is_empty() {
            return Err(SmartEdError::Upstream(format!(
                "no '{}' captions for {}",
                track, reference
            )));
        }

        let lines = parse_json3(&body)?;
        if lines.is_empty() {
            return Err(SmartEdError::Upstream(format!(
                "'{}' captions for {} are empty",
                track, reference
            )));
        }

        debug!("Fetched {} caption lines ({})", lines.len(), track);
        Ok(lines)
    }
}

#[async_trait]
impl CaptionSource for YoutubeCaptionSource {
    #[instrument(skip(self), fields(video = %reference))]
    async fn list_tracks(&self, reference: &VideoReference) -> Result<Vec<CaptionTrack>> {
        let xml = self
            .http
            .get(TIMEDTEXT_URL)
            .query(&[("type", "list"), ("v", reference.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let tracks = self.parse_track_list(&xml);
        debug!("Upstream lists {} caption tracks", tracks.len());
        Ok(tracks)
    }

    #[instrument(skip(self), fields(video = %reference, selector = %selector))]
    async fn fetch_track(
        &self,
        reference: &VideoReference,
        selector: &TrackSelector,
    ) -> Result<Vec<CaptionLine>> {
        let track = match selector {
            TrackSelector::Track(track) => track.clone(),
            TrackSelector::Language(lang) => CaptionTrack {
                language_code: lang.clone(),
                name: None,
                kind: None,
                is_default: false,
            },
            TrackSelector::Default => {
                let tracks = self.list_tracks(reference).await?;
                let default = tracks
                    .iter()
                    .find(|t| t.is_default)
                    .or_else(|| tracks.first())
                    .cloned();
                default.ok_or_else(|| {
                    SmartEdError::Upstream(format!("no caption tracks for {}", reference))
                })?
            }
        };

        self.fetch_json3(reference, &track).await
    }
}

#[derive(Deserialize)]
struct Json3Body {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

fn parse_json3(body: &str) -> Result<Vec<CaptionLine>> {
    let parsed: Json3Body = serde_json::from_str(body)?;

    Ok(parsed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(CaptionLine {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect())
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
