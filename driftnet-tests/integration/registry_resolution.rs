//! Registry construction and link resolution over the built-in capabilities.

use std::sync::Arc;

use driftnet_core::config::ExtractionConfig;
use driftnet_core::test_fixtures::{ScriptedTransport, StubExtractor};
use driftnet_core::{
    CachePolicy, Extractor, ExtractorRegistry, LinkResolver, MediaSource, RegistryError,
    ResolveError, normalize_host,
};

fn builtin_resolver() -> LinkResolver {
    let registry = driftnet_extract::default_registry(
        Arc::new(ScriptedTransport::new()),
        &ExtractionConfig::default(),
    )
    .unwrap();
    LinkResolver::new(Arc::new(registry))
}

#[test]
fn test_prefixed_hosts_resolve_to_same_capability() {
    let resolver = builtin_resolver();

    for link in [
        "https://www.instagram.com/p/CzBjgFiISfF/",
        "https://instagram.com/p/CzBjgFiISfF/",
        "https://m.instagram.com/p/CzBjgFiISfF/",
    ] {
        let info = resolver.resolve(link).unwrap();
        assert_eq!(info.source, MediaSource::INSTAGRAM, "{link}");
        assert_eq!(info.original, link);
    }
}

#[test]
fn test_resolution_picks_policy_per_source() {
    let resolver = builtin_resolver();

    let instagram = resolver.resolve("https://www.instagram.com/reel/CzBjgFiISfF/").unwrap();
    assert_eq!(instagram.extractor.cache_policy(), CachePolicy::Mirror);

    let youtube = resolver.resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
    assert_eq!(youtube.source, MediaSource::YOUTUBE);
    assert_eq!(youtube.extractor.cache_policy(), CachePolicy::Direct);

    let twitter = resolver.resolve("https://x.com/someone/status/1").unwrap();
    assert_eq!(twitter.source, MediaSource::TWITTER);
}

#[test]
fn test_invalid_and_unsupported_links() {
    let resolver = builtin_resolver();

    assert!(matches!(
        resolver.resolve("not a url"),
        Err(ResolveError::InvalidLink { .. })
    ));
    assert!(matches!(
        resolver.resolve(""),
        Err(ResolveError::InvalidLink { .. })
    ));

    match resolver.resolve("https://unknown-site.example/x") {
        Err(ResolveError::UnsupportedSource { source }) => {
            assert_eq!(
                source,
                RegistryError::NoExtractorForHost {
                    host: "unknown-site.example".to_string()
                }
            );
        }
        other => panic!("unexpected resolution: {other:?}"),
    }
}

#[test]
fn test_failed_registration_leaves_builtin_registry_unchanged() {
    let registry = driftnet_extract::default_registry(
        Arc::new(ScriptedTransport::new()),
        &ExtractionConfig::default(),
    )
    .unwrap();
    let names_before = registry.supported_sources();
    let hosts_before = registry.supported_hosts();

    let clash = StubExtractor::new("tiktok-mirror", &["new-site.example", "www.tiktok.com"]);
    let error = registry.register(Arc::new(clash)).unwrap_err();

    assert!(matches!(error, RegistryError::DuplicateHost { ref owner, .. } if owner == "tiktok"));
    assert_eq!(registry.supported_sources(), names_before);
    assert_eq!(registry.supported_hosts(), hosts_before);
    assert!(registry.get_by_host("new-site.example").is_none());
}

#[test]
fn test_isolated_registries_do_not_share_state() {
    let first = ExtractorRegistry::new();
    let second = ExtractorRegistry::new();
    first
        .register(Arc::new(StubExtractor::new("vimeo", &["vimeo.com"])))
        .unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(second.get_by_host("vimeo.com").is_none());
}

#[test]
fn test_every_registered_host_is_normalized() {
    let resolver = builtin_resolver();
    let registry = resolver.registry();

    for host in registry.supported_hosts() {
        assert_eq!(normalize_host(&host), host);
        let extractor = registry.get_by_host(&host).unwrap();
        assert!(
            extractor
                .hosts()
                .iter()
                .any(|declared| normalize_host(declared) == host)
        );
    }
}
