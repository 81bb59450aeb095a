use tracing::{debug, info, instrument, warn};

use crate::{
    error::PlaylistError,
    m3u::{M3U_HEADER, render},
    resolver::{Resolution, ResolvedStream, StreamResolver, Unresolvable},
    source::{Item, SourceFetcher},
};

/// What happens to a single source item within one request
#[derive(Debug)]
enum ItemOutcome<'a> {
    Emit(ResolvedStream<'a>),
    SkipGroup,
    Skip(Unresolvable),
}

/// Builds the M3U playlist out of the source playlist and the stream resolver
pub struct PlaylistAssembler {
    source: SourceFetcher,
    resolver: StreamResolver,
}

impl PlaylistAssembler {
    #[must_use]
    pub const fn new(source: SourceFetcher, resolver: StreamResolver) -> Self {
        Self { source, resolver }
    }

    async fn process<'a>(&self, item: &'a Item, group: Option<&str>) -> ItemOutcome<'a> {
        if group.is_some_and(|g| item.filter_group() != g) {
            return ItemOutcome::SkipGroup;
        }

        match self.resolver.resolve(item).await {
            Resolution::Resolved(stream) => ItemOutcome::Emit(stream),
            Resolution::Unresolvable(reason) => ItemOutcome::Skip(reason),
        }
    }

    /// Renders the playlist, optionally keeping only items of one group
    ///
    /// Items that cannot be resolved are left out. Items are resolved one by one
    /// in source order.
    ///
    /// # Errors
    /// Only fails when the source playlist cannot be loaded
    #[instrument(skip(self))]
    pub async fn build_playlist(&self, group: Option<&str>) -> Result<String, PlaylistError> {
        let items = self.source.load_playlist().await?;
        let group = group.map(str::trim).filter(|g| !g.is_empty());

        let mut streams = Vec::with_capacity(items.len());
        for item in items.iter() {
            match self.process(item, group).await {
                ItemOutcome::Emit(stream) => streams.push(stream),
                ItemOutcome::SkipGroup => {}
                ItemOutcome::Skip(reason @ Unresolvable::Disabled) => {
                    debug!("Skipping {:?}: {reason}", item.title);
                }
                ItemOutcome::Skip(reason) => warn!("Skipping {:?}: {reason}", item.title),
            }
        }

        info!(
            "Serving {} of {} playlist items",
            streams.len(),
            items.len()
        );
        Ok(render(M3U_HEADER, &streams))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use indoc::indoc;
    use serde_json::{Value, json};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::resolver::{ResolverConfig, tests::FakeExtractor};

    async fn serve_source(body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn assembler(
        location: Option<String>,
        extractor: Arc<FakeExtractor>,
        config: ResolverConfig,
    ) -> PlaylistAssembler {
        PlaylistAssembler::new(
            SourceFetcher::new(reqwest::Client::new(), location, Duration::from_secs(60)),
            StreamResolver::new(extractor, config),
        )
    }

    #[tokio::test]
    async fn renders_single_direct_item() {
        let server =
            serve_source(json!([{ "title": "X", "type": "direct", "url": "http://a/x.m3u8" }]))
                .await;
        let assembler = assembler(
            Some(server.uri()),
            FakeExtractor::ok(""),
            ResolverConfig::default(),
        );

        assert_eq!(
            assembler.build_playlist(None).await.unwrap(),
            "#EXTM3U\n#EXTINF:-1 tvg-id=\"\" tvg-name=\"X\" group-title=\"Videolar\", X\nhttp://a/x.m3u8"
        );
    }

    #[tokio::test]
    async fn failed_youtube_item_is_left_out() {
        let server = serve_source(json!({ "items": [
            { "title": "Broken", "type": "youtube", "url": "https://youtu.be/gone" },
        ]}))
        .await;
        let extractor = FakeExtractor::failing("Video unavailable");
        let assembler = assembler(
            Some(server.uri()),
            extractor.clone(),
            ResolverConfig::default(),
        );

        assert_eq!(assembler.build_playlist(None).await.unwrap(), "#EXTM3U");
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn keeps_source_order_and_duplicates() {
        let server = serve_source(json!([
            { "title": "One", "group": "A", "url": "http://a/1.mp4" },
            { "title": "Two", "group": "B", "type": "youtube", "url": "https://youtu.be/two", "logo": "http://img/2.png" },
            { "title": "Three", "group": "A", "url": "http://a/1.mp4" },
            { "title": "No url", "group": "A" },
        ]))
        .await;
        let assembler = assembler(
            Some(server.uri()),
            FakeExtractor::ok("https://cdn.example/two.m3u8\n"),
            ResolverConfig::default(),
        );

        let expected = indoc! {r#"
            #EXTM3U
            #EXTINF:-1 tvg-id="" tvg-name="One" group-title="A", One
            http://a/1.mp4
            #EXTINF:-1 tvg-id="" tvg-name="Two" tvg-logo="http://img/2.png" group-title="B", Two
            https://cdn.example/two.m3u8
            #EXTINF:-1 tvg-id="" tvg-name="Three" group-title="A", Three
            http://a/1.mp4"#};

        assert_eq!(assembler.build_playlist(None).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn group_filter_skips_before_resolving() {
        let server = serve_source(json!([
            { "title": "One", "group": " A ", "url": "http://a/1.mp4" },
            { "title": "Two", "group": "B", "type": "youtube", "url": "https://youtu.be/two" },
            { "title": "Three", "url": "http://a/3.mp4" },
        ]))
        .await;
        let extractor = FakeExtractor::ok("https://cdn.example/two.m3u8");
        let assembler = assembler(
            Some(server.uri()),
            extractor.clone(),
            ResolverConfig::default(),
        );

        let playlist = assembler.build_playlist(Some(" A")).await.unwrap();

        assert_eq!(
            playlist,
            "#EXTM3U\n#EXTINF:-1 tvg-id=\"\" tvg-name=\"One\" group-title=\" A \", One\nhttp://a/1.mp4"
        );
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn blank_group_filter_is_ignored() {
        let server = serve_source(json!([
            { "title": "One", "group": "A", "url": "http://a/1.mp4" },
            { "title": "Two", "url": "http://a/2.mp4" },
        ]))
        .await;
        let assembler = assembler(
            Some(server.uri()),
            FakeExtractor::ok(""),
            ResolverConfig::default(),
        );

        let playlist = assembler.build_playlist(Some("  ")).await.unwrap();
        assert_eq!(playlist.lines().count(), 5);
    }

    #[tokio::test]
    async fn disabled_youtube_items_are_omitted() {
        let server = serve_source(json!([
            { "title": "Yt", "type": "youtube", "url": "https://youtu.be/a" },
            { "title": "Direct", "url": "http://a/d.mp4" },
        ]))
        .await;
        let extractor = FakeExtractor::ok("https://cdn.example/a.m3u8");
        let assembler = assembler(
            Some(server.uri()),
            extractor.clone(),
            ResolverConfig {
                youtube_disabled: true,
                ..ResolverConfig::default()
            },
        );

        let playlist = assembler.build_playlist(None).await.unwrap();

        assert!(!playlist.contains("Yt"));
        assert!(playlist.ends_with("http://a/d.mp4"));
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_requests_reuse_both_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "title": "Yt", "type": "youtube", "url": "https://youtu.be/a" },
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let extractor = FakeExtractor::ok("https://cdn.example/a.m3u8");
        let assembler = assembler(
            Some(server.uri()),
            extractor.clone(),
            ResolverConfig::default(),
        );

        let first = assembler.build_playlist(None).await.unwrap();
        let second = assembler.build_playlist(None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn missing_source_is_fatal() {
        let assembler = assembler(None, FakeExtractor::ok(""), ResolverConfig::default());

        assert!(matches!(
            assembler.build_playlist(None).await,
            Err(PlaylistError::Config)
        ));
    }
}
