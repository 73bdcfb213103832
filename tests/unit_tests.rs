use std::sync::Arc;
use std::time::Instant;
use tsunagi::config::{Config, PipelineConfig};
use tsunagi::net::proxy::{Proxy, ProxyCategory, ProxyPool, ProxySources, ProxyStore};
use tsunagi::net::{Dispatcher, OutboundRequest, RateLimiter, RequestMode};
use tsunagi::prelude::*;
use tsunagi::provider::ProviderDescriptorBuilder;
use tsunagi::similarity::{
    clean, compare_two_strings, find_best_match, find_best_match_2d, find_best_match_array,
    similarity, slugify,
};
use tsunagi::types::{AdvancedSearchParamsBuilder, MediaInfo};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod similarity_tests {
    use super::*;

    #[test]
    fn test_compare_bounds_and_symmetry() {
        let pairs = [
            ("Mushoku Tensei", "Mushoku Tensei: Jobless Reincarnation"),
            ("one piece", "one punch man"),
            ("berserk", "vagabond"),
        ];

        for (a, b) in pairs {
            let forward = compare_two_strings(a, b);
            assert!((0.0..=1.0).contains(&forward));
            assert_eq!(forward, compare_two_strings(b, a));
        }
    }

    #[test]
    fn test_compare_edge_cases() {
        assert_eq!(compare_two_strings("Naruto", "Naruto"), 1.0);
        assert_eq!(compare_two_strings("a", "a"), 1.0);
        assert_eq!(compare_two_strings("a", "b"), 0.0);
        assert_eq!(compare_two_strings("", "ab"), 0.0);
        assert_eq!(compare_two_strings("one piece", "onepiece"), 1.0);
    }

    #[test]
    fn test_clean_normalizations() {
        assert_eq!(clean("Kyoukai no Kanata"), "kyoukai no kanata");
        assert_eq!(clean("Shin Sekai Yori: From the New World"), "shin sekai yori from the new world");
        assert_eq!(clean("Tokyo Ghoul √A"), "tokyo ghoul a");
        assert_eq!(clean("Boku no Hero, Ou-sama"), "boku no hero oh-sama");
    }

    #[test]
    fn test_similarity_takes_best_alt() {
        let alts = strings(&["", "Shingeki no Kyojin"]);
        let result = similarity("Attack on Titan", "Shingeki no Kyojin", &alts);

        assert_eq!(result.value, 1.0);
        assert!(result.same);

        let unrelated = similarity("Attack on Titan", "Berserk", &[]);
        assert!(!unrelated.same);
        assert!(unrelated.value < 0.6);
    }

    #[test]
    fn test_find_best_match_keeps_earliest() {
        let targets = strings(&["Bleach", "Naruto", "Naruto"]);
        let result = find_best_match("Naruto", &targets);

        assert_eq!(result.best_match_index, 1);
        assert_eq!(result.best_match.rating, 1.0);
        assert_eq!(result.ratings.len(), 3);
    }

    #[test]
    fn test_find_best_match_empty_targets() {
        let result = find_best_match("Naruto", &[]);

        assert_eq!(result.best_match_index, 0);
        assert_eq!(result.best_match.rating, 0.0);
        assert!(result.ratings.is_empty());
    }

    #[test]
    fn test_find_best_match_array_picks_best_main() {
        let mains = strings(&["Shingeki no Kyojin", "Attack on Titan"]);
        let targets = strings(&["Attack on Titan Season 2", "Attack on Titan"]);
        let result = find_best_match_array(&mains, &targets);

        assert_eq!(result.best_match.target, "Attack on Titan");
        assert_eq!(result.best_match_index, 1);
    }

    #[test]
    fn test_find_best_match_2d_skips_empty_groups() {
        let groups = vec![
            Vec::new(),
            strings(&["Berserk"]),
            strings(&["Re:Zero kara Hajimeru Isekai Seikatsu", "Re:Zero"]),
        ];
        let result = find_best_match_2d(&strings(&["Re: Zero"]), &groups);

        assert_eq!(result.best_match_index, 2);
        assert_eq!(result.best_match.target, "re zero");
        assert_eq!(result.best_match.rating, 1.0);
    }

    #[test]
    fn test_cjk_only_titles_clean_to_empty_and_tie_at_one() {
        assert_eq!(clean("無職転生"), "");

        let mains = strings(&["Mushoku Tensei", "無職転生"]);
        let groups = vec![
            strings(&["Mushoku Tensei: Jobless Reincarnation"]),
            strings(&["Isekai Ojisan", "異世界おじさん"]),
        ];
        let result = find_best_match_2d(&mains, &groups);

        assert_eq!(result.best_match_index, 1);
        assert_eq!(result.best_match.target, "");
        assert_eq!(result.best_match.rating, 1.0);
    }

    #[test]
    fn test_slugify_is_idempotent() {
        for title in ["Attack on Titan!", "Ærøskøbing — Straße", "Re:Zero -Starting Life-", "鋼の錬金術師 FA"] {
            let once = slugify([title]);
            assert_eq!(slugify([&once]), once);
        }
    }

    #[test]
    fn test_slugify_forms() {
        assert_eq!(slugify(["  Mushoku Tensei  "]), "mushoku-tensei");
        assert_eq!(slugify(["Fate/Zero"]), "fate-zero");
        assert_eq!(slugify(["Pokémon", "Special"]), "pokemon-special");
        assert_eq!(slugify(["!!!"]), "");
        assert_eq!(slugify(Vec::<String>::new()), "");
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_title_distinguishes_empty_from_absent() {
        let empty = Title {
            english: Some(String::new()),
            romaji: None,
            native: None,
        };
        assert!(!empty.is_found());
        assert_eq!(empty.primary(), None);
        assert_eq!(Title::default(), Title { romaji: None, english: None, native: None });

        let romaji = Title {
            english: Some(" ".to_string()),
            romaji: Some("Shingeki no Kyojin".to_string()),
            native: Some("進撃の巨人".to_string()),
        };
        assert_eq!(romaji.primary(), Some("Shingeki no Kyojin"));
        assert_eq!(romaji.variants().count(), 2);
    }

    #[test]
    fn test_title_variants_include_synonyms() {
        let info = MediaInfo {
            title: Title {
                english: Some("Attack on Titan".to_string()),
                romaji: None,
                native: None,
            },
            synonyms: strings(&["AoT", "", "SnK"]),
            ..MediaInfo::default()
        };

        assert_eq!(info.title_variants(), strings(&["Attack on Titan", "AoT", "SnK"]));
    }

    #[test]
    fn test_format_wire_names() {
        assert_eq!(serde_json::to_string(&Format::OneShot).unwrap(), "\"ONE_SHOT\"");
        assert_eq!(serde_json::to_string(&Format::TvShort).unwrap(), "\"TV_SHORT\"");
        assert_eq!(
            serde_json::from_str::<Format>("\"NOVEL\"").unwrap(),
            Format::Novel
        );
        assert!(!Format::default().is_known());
    }

    #[test]
    fn test_mapping_request_primary_format() {
        let request = MappingRequest::new("x", MediaType::Manga, vec![Format::OneShot, Format::Manga]);
        assert_eq!(request.primary_format(), Format::OneShot);

        let empty = MappingRequest::new("x", MediaType::Manga, Vec::new());
        assert_eq!(empty.primary_format(), Format::Unknown);
    }

    #[test]
    fn test_advanced_search_builder_defaults() {
        let params = AdvancedSearchParamsBuilder::default()
            .media_type(MediaType::Manga)
            .genres(strings(&["Action"]))
            .year(Some(2014))
            .build()
            .unwrap();

        assert!(params.query.is_empty());
        assert_eq!(params.page, 0);
        assert_eq!(params.per_page, 25);
        assert_eq!(params.year, Some(2014));
        assert!(params.tags.is_empty());
    }

    #[test]
    fn test_media_serializes_camel_case() {
        let media = Media::new("id-1", "slug", MediaType::Anime);
        let value = serde_json::to_value(&media).unwrap();

        assert_eq!(value["mediaType"], "ANIME");
        assert_eq!(value["format"], "UNKNOWN");
        assert!(value["mappings"].as_array().unwrap().is_empty());
    }
}

#[cfg(test)]
mod proxy_tests {
    use super::*;

    fn manga_pool(addresses: &[&str]) -> ProxyPool {
        ProxyPool {
            manga: addresses
                .iter()
                .map(|a| Proxy::new("mangadex", *a))
                .collect(),
            ..ProxyPool::default()
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(ProxyCategory::for_provider("anilist"), ProxyCategory::Base);
        assert_eq!(ProxyCategory::for_provider("zoro"), ProxyCategory::Anime);
        assert_eq!(ProxyCategory::for_provider("comick"), ProxyCategory::Manga);
        assert_eq!(ProxyCategory::for_provider("novelupdates"), ProxyCategory::Manga);
        assert_eq!(ProxyCategory::for_provider("tvdb"), ProxyCategory::Meta);
    }

    #[test]
    fn test_proxy_address_scheme() {
        assert_eq!(Proxy::new("m", "1.2.3.4:80").address, "http://1.2.3.4:80");
        assert_eq!(Proxy::new("m", "https://relay.dev").address, "https://relay.dev");
    }

    #[test]
    fn test_select_from_category() {
        let store = ProxyStore::from_pool(manga_pool(&["10.0.0.1:8080", "10.0.0.2:8080"]));

        for _ in 0..20 {
            let picked = store.select("mangadex").unwrap();
            assert!(picked == "http://10.0.0.1:8080" || picked == "http://10.0.0.2:8080");
        }
        assert!(store.select("anilist").is_none());
    }

    #[tokio::test]
    async fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("mangaProxies.json"),
            r#"[{"providerId": "mangadex", "ip": "10.0.0.1:8080"}, {"providerId": "comick", "ip": "https://relay.dev"}]"#,
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("baseProxies.json"), "not json")
            .await
            .unwrap();

        let store = ProxyStore::new(ProxySources::in_dir(dir.path()));
        store.init().await.unwrap();

        let pool = store.snapshot();
        assert_eq!(pool.len(), 2);
        assert!(pool.base.is_empty());
        assert!(pool.anime.is_empty());
        assert_eq!(pool.manga[0].address, "http://10.0.0.1:8080");
        assert_eq!(pool.manga[1].address, "https://relay.dev");
    }

    #[tokio::test]
    async fn test_reload_replaces_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animeProxies.json");
        tokio::fs::write(&path, r#"[{"providerId": "zoro", "ip": "1.1.1.1"}]"#)
            .await
            .unwrap();

        let store = ProxyStore::new(ProxySources::in_dir(dir.path()));
        store.init().await.unwrap();
        let before = store.snapshot();

        tokio::fs::write(
            &path,
            r#"[{"providerId": "zoro", "ip": "2.2.2.2"}, {"providerId": "zoro", "ip": "3.3.3.3"}]"#,
        )
        .await
        .unwrap();
        store.reload().await.unwrap();

        assert_eq!(before.anime.len(), 1);
        assert_eq!(store.snapshot().anime.len(), 2);
    }

    #[tokio::test]
    async fn test_many_records_import() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<Proxy> = (0..250)
            .map(|i| Proxy {
                provider_id: "tvdb".to_string(),
                address: format!("10.0.{}.{}", i / 256, i % 256),
            })
            .collect();
        tokio::fs::write(
            dir.path().join("metaProxies.json"),
            serde_json::to_vec(&records).unwrap(),
        )
        .await
        .unwrap();

        let store = ProxyStore::new(ProxySources::in_dir(dir.path()));
        store.init().await.unwrap();

        let pool = store.snapshot();
        assert_eq!(pool.meta.len(), 250);
        assert!(pool.meta.iter().all(|p| p.address.starts_with("http://")));
    }
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;
    use reqwest::header::ORIGIN;

    const SEARCH_URL: &str = "https://api.mangadex.org/manga?title=Berserk";

    fn relay_store() -> Arc<ProxyStore> {
        Arc::new(ProxyStore::from_pool(ProxyPool {
            manga: vec![Proxy::new("mangadex", "10.0.0.1:8080/")],
            ..ProxyPool::default()
        }))
    }

    #[test]
    fn test_direct_is_unchanged() {
        let dispatcher = Dispatcher::new("mangadex", relay_store());
        let request = OutboundRequest::get(SEARCH_URL).unwrap();
        let prepared = dispatcher.prepare(&request, RequestMode::Direct).unwrap();

        assert_eq!(prepared.url, SEARCH_URL);
        assert!(prepared.headers.is_empty());
    }

    #[test]
    fn test_translated_wraps_url() {
        let dispatcher = Dispatcher::new("mangadex", Arc::new(ProxyStore::empty()));
        let request = OutboundRequest::get(SEARCH_URL).unwrap();
        let prepared = dispatcher.prepare(&request, RequestMode::Translated).unwrap();

        assert_eq!(
            prepared.url,
            "http://translate.google.com/translate?sl=ja&tl=en&u=https%3A%2F%2Fapi.mangadex.org%2Fmanga%3Ftitle%3DBerserk"
        );
    }

    #[test]
    fn test_proxied_prefixes_relay_and_sets_origin() {
        let dispatcher = Dispatcher::new("mangadex", relay_store());
        let request = OutboundRequest::get(SEARCH_URL)
            .unwrap()
            .with_header("x-requested-with", "tsunagi");
        let prepared = dispatcher.prepare(&request, RequestMode::Proxied).unwrap();

        assert_eq!(prepared.url, format!("http://10.0.0.1:8080/{SEARCH_URL}"));
        assert_eq!(prepared.headers[ORIGIN], "https://api.mangadex.org");
        assert_eq!(prepared.headers["x-requested-with"], "tsunagi");
    }

    #[test]
    fn test_proxied_without_relays_fails() {
        let dispatcher = Dispatcher::new("comick", Arc::new(ProxyStore::empty()));
        let request = OutboundRequest::get(SEARCH_URL).unwrap();
        let err = dispatcher.prepare(&request, RequestMode::Proxied).unwrap_err();

        assert!(matches!(err, Error::NoProxyAvailable { ref provider } if provider == "comick"));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_send_without_relays_fails_before_network() {
        let dispatcher = Dispatcher::new("zoro", Arc::new(ProxyStore::empty()));
        let request = OutboundRequest::get("https://zoro.invalid/search").unwrap();
        let result = dispatcher.send(&request, RequestMode::Proxied).await;

        assert!(matches!(result, Err(Error::NoProxyAvailable { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_waits_are_spaced() {
        let limiter = &RateLimiter::new(50);
        let start = Instant::now();
        let release = move || async move {
            limiter.wait("mangadex").await;
            start.elapsed()
        };

        let (a, b, c, d) = tokio::join!(release(), release(), release(), release());
        let mut released = [a, b, c, d];
        released.sort();

        for (slot, elapsed) in released.iter().enumerate() {
            let earliest = limiter.delay() * slot as u32;
            assert!(
                *elapsed >= earliest,
                "request {slot} released after {elapsed:?}, expected at least {earliest:?}"
            );
        }
    }

    #[test]
    fn test_dispatcher_clones_share_limiter() {
        let proxies = Arc::new(ProxyStore::empty());
        let dispatcher = Dispatcher::new("mangadex", proxies.clone()).with_rate_limit(250);
        let clone = dispatcher.clone();
        let separate = Dispatcher::new("mangadex", proxies.clone()).with_rate_limit(250);

        assert!(Arc::ptr_eq(dispatcher.rate_limiter(), clone.rate_limiter()));
        assert!(!Arc::ptr_eq(dispatcher.rate_limiter(), separate.rate_limiter()));

        let shared =
            Dispatcher::new("mangadex", proxies).with_limiter(dispatcher.rate_limiter().clone());
        assert!(Arc::ptr_eq(dispatcher.rate_limiter(), shared.rate_limiter()));
    }

    #[test]
    fn test_request_mode_from_descriptor() {
        let relayed = ProviderDescriptorBuilder::default()
            .id("mangadex")
            .url("https://mangadex.org")
            .needs_proxy(true)
            .build()
            .unwrap();
        assert_eq!(relayed.request_mode(None), RequestMode::Proxied);
        assert_eq!(relayed.request_mode(Some(false)), RequestMode::Direct);

        let direct = ProviderDescriptorBuilder::default()
            .id("comick")
            .url("https://comick.io")
            .build()
            .unwrap();
        assert_eq!(direct.request_mode(Some(true)), RequestMode::Direct);

        let translated = ProviderDescriptorBuilder::default()
            .id("novelupdates")
            .url("https://www.novelupdates.com")
            .needs_proxy(true)
            .use_translation(true)
            .build()
            .unwrap();
        assert_eq!(translated.request_mode(None), RequestMode::Translated);
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[cfg(feature = "source-mangadex")]
    #[test]
    fn test_default_registry() {
        let providers = Providers::with_defaults(Arc::new(ProxyStore::empty()));

        assert_eq!(providers.len(), 3);
        assert_eq!(providers.list_ids(), vec!["mangadex"]);
        assert_eq!(providers.get("mangadex").len(), 3);
        assert!(providers.base_for(Format::Manga).is_some());
        assert!(providers.base_for(Format::Tv).is_none());
        assert_eq!(providers.secondary_for(MediaType::Manga, Format::Manga).len(), 1);
        assert!(providers.secondary_for(MediaType::Anime, Format::Manga).is_empty());
        assert_eq!(providers.information().len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let providers = Providers::new();

        assert!(providers.is_empty());
        assert!(providers.base().is_empty());
        assert!(providers.list_ids().is_empty());
        assert!(providers.get("mangadex").is_empty());
    }
}

#[cfg(test)]
mod ambient_tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::upstream("mangadex", 503).to_string(),
            "Upstream error [mangadex]: HTTP 503"
        );
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
        assert!(!Error::Cancelled.is_recoverable());
        assert!(!Error::parse("bad").is_recoverable());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.policy, MatchPolicy::default());
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.store_timeout().as_secs(), 10);
        assert_eq!(config.proxies, ProxySources::default());
    }

    #[test]
    fn test_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.policy.same_threshold, 0.6);
        assert_eq!(config.pipeline.worker_limit, 4);
    }

    #[test]
    fn test_config_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsunagi.toml");
        std::fs::write(
            &path,
            "[policy]\naccept_threshold = 0.5\n\n[pipeline]\nworker_limit = 8\n\n[proxies]\nmanga = \"/etc/relays/manga.json\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.policy.accept_threshold, 0.5);
        assert_eq!(config.policy.best_match_threshold, 0.7);
        assert_eq!(config.pipeline.worker_limit, 8);
        assert_eq!(config.pipeline.store_timeout_secs, 10);
        assert_eq!(config.proxies.manga.to_str(), Some("/etc/relays/manga.json"));
        assert_eq!(config.proxies.base.to_str(), Some("./baseProxies.json"));
    }

    #[test]
    fn test_config_rejects_bad_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsunagi.toml");
        std::fs::write(&path, "[pipeline]\nworker_limit = \"many\"\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.insert(Media::new("abc", "slug", MediaType::Manga));
        assert_eq!(store.len(), 1);
        assert!(store.get("abc", MediaType::Manga).await.unwrap().is_some());
        assert!(store.get("abc", MediaType::Anime).await.unwrap().is_none());

        assert!(store.remove("abc", MediaType::Manga).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(Event::MappingLoadCompleted);
        LogSink.emit(Event::MappingLoadCompleted);

        assert_eq!(rx.try_recv().ok(), Some(Event::MappingLoadCompleted));
        assert_eq!(Event::MappingLoadCompleted.to_string(), "mapping.load.completed");

        drop(rx);
        tx.emit(Event::MappingLoadCompleted);
    }
}
