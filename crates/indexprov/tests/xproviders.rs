//! Building and publishing advertisements with extended providers.

use bytes::Bytes;
use proptest::prelude::*;

use indexprov::{
    AdParams, BuildError, Engine, EngineConfig, Entries, MemoryPublisher, XpInfo,
};
use indexprov_testkit::{random_multiaddrs, random_xp_info, BuildInput, TestFixture};

const CONTEXT_ID: &[u8] = b"test-context";
const METADATA: &[u8] = b"thisismeta";

async fn engine_for(fixture: &TestFixture) -> Engine<MemoryPublisher> {
    Engine::start(
        fixture.keypair.clone(),
        MemoryPublisher::new(),
        EngineConfig::default(),
    )
    .await
    .unwrap()
}

fn params(extended_providers: Vec<XpInfo>, override_providers: bool) -> AdParams {
    AdParams {
        extended_providers,
        override_providers,
        context_id: Bytes::from_static(CONTEXT_ID),
        metadata: Bytes::from_static(METADATA),
        ..AdParams::default()
    }
}

#[tokio::test]
async fn test_publish_with_extended_providers() {
    let fixture = TestFixture::new();
    let engine = engine_for(&fixture).await;
    let xps = vec![random_xp_info(2), random_xp_info(2)];

    let ad = fixture
        .builder()
        .build_and_sign(params(xps.clone(), false))
        .unwrap();
    assert_eq!(ad.verify_signature().unwrap(), fixture.peer_id());

    engine.publish(ad.clone()).await.unwrap();

    assert_eq!(ad.addresses, fixture.addresses);
    assert_eq!(ad.context_id.as_ref(), CONTEXT_ID);
    assert_eq!(ad.entries, Entries::NoEntries);
    assert!(!ad.is_rm);
    assert_eq!(ad.metadata.as_ref(), METADATA);
    assert_eq!(ad.provider, fixture.peer_id());

    let xp = ad.extended_provider.as_ref().unwrap();
    assert!(!xp.override_providers);
    assert_eq!(xp.providers.len(), 3);

    for (supplied, built) in xps.iter().zip(&xp.providers) {
        assert_eq!(built.id.to_string(), supplied.id);
        assert_eq!(built.addresses, supplied.addresses);
        assert_eq!(built.metadata, supplied.metadata);
    }
    let main = &xp.providers[2];
    assert_eq!(main.id, fixture.peer_id());
    assert_eq!(main.addresses, fixture.addresses);
    assert_eq!(main.metadata.as_ref(), METADATA);
}

#[tokio::test]
async fn test_override_does_not_add_main_provider() {
    let fixture = TestFixture::new();
    let engine = engine_for(&fixture).await;
    let xps = vec![random_xp_info(2), random_xp_info(2)];

    let ad = fixture.builder().build_and_sign(params(xps, true)).unwrap();
    engine.publish(ad.clone()).await.unwrap();

    let xp = ad.extended_provider.as_ref().unwrap();
    assert!(xp.override_providers);
    assert_eq!(xp.providers.len(), 2);
    assert!(xp.providers.iter().all(|p| p.id != fixture.peer_id()));
}

#[tokio::test]
async fn test_main_provider_not_added_twice() {
    let fixture = TestFixture::new();
    let engine = engine_for(&fixture).await;
    let listed_addrs = random_multiaddrs(1);
    let listed = XpInfo::for_keypair(fixture.keypair.clone(), &b"listed"[..], listed_addrs.clone());

    let ad = fixture
        .builder()
        .build_and_sign(params(vec![listed], false))
        .unwrap();
    engine.publish(ad.clone()).await.unwrap();

    let xp = ad.extended_provider.as_ref().unwrap();
    assert_eq!(xp.providers.len(), 1);
    assert_eq!(xp.providers[0].id, fixture.peer_id());
    assert_eq!(xp.providers[0].addresses, listed_addrs);
    assert_eq!(xp.providers[0].metadata.as_ref(), b"listed");
}

#[test]
fn test_empty_addresses_rejected() {
    let fixture = TestFixture::new();
    for override_providers in [false, true] {
        let xp = XpInfo::for_keypair(fixture.keypair.clone(), &METADATA[..], Vec::new());
        assert_eq!(
            fixture
                .builder()
                .build_and_sign(params(vec![xp], override_providers))
                .unwrap_err(),
            BuildError::EmptyAddresses
        );
    }
}

#[test]
fn test_empty_metadata_allowed() {
    let fixture = TestFixture::new();
    let xp = XpInfo::for_keypair(fixture.keypair.clone(), Bytes::new(), fixture.addresses.clone());
    fixture
        .builder()
        .build_and_sign(params(vec![xp], true))
        .unwrap();
}

#[test]
fn test_invalid_identity_rejected() {
    let fixture = TestFixture::new();
    let xp = XpInfo::new("invalid", fixture.keypair.clone(), Bytes::new(), fixture.addresses.clone());
    assert!(matches!(
        fixture.builder().build_and_sign(params(vec![xp], true)),
        Err(BuildError::InvalidIdentity { id, .. }) if id == "invalid"
    ));
}

#[test]
fn test_identity_must_match_key() {
    let fixture = TestFixture::new();
    let other = TestFixture::new();
    let xp = XpInfo::new(
        other.peer_id().to_string(),
        fixture.keypair.clone(),
        Bytes::new(),
        fixture.addresses.clone(),
    );
    assert!(matches!(
        fixture.builder().build_and_sign(params(vec![xp], false)),
        Err(BuildError::IdentityKeyMismatch { .. })
    ));
}

#[tokio::test]
async fn test_override_with_no_providers_is_empty_list() {
    let fixture = TestFixture::new();
    let engine = engine_for(&fixture).await;

    let ad = fixture.builder().build_and_sign(params(Vec::new(), true)).unwrap();
    engine.publish(ad.clone()).await.unwrap();

    let xp = ad.extended_provider.as_ref().unwrap();
    assert!(xp.override_providers);
    assert!(xp.providers.is_empty());
}

#[test]
fn test_override_without_context_rejected() {
    let fixture = TestFixture::new();
    let mut p = params(vec![random_xp_info(2), random_xp_info(2)], true);
    p.context_id = Bytes::new();
    assert_eq!(
        fixture.builder().build_and_sign(p).unwrap_err(),
        BuildError::OverrideWithoutContext
    );
}

#[test]
fn test_duplicate_ids_keep_first() {
    let fixture = TestFixture::new();
    let first = random_xp_info(1);
    let mut second = first.clone();
    second.addresses = random_multiaddrs(2);

    let ad = fixture
        .builder()
        .build_and_sign(params(vec![first.clone(), second], false))
        .unwrap();
    let xp = ad.extended_provider.unwrap();
    assert_eq!(xp.providers.len(), 2);
    assert_eq!(xp.providers[0].addresses, first.addresses);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_main_appended_last_when_absent(input: BuildInput) {
        prop_assume!(!input.override_providers && !input.main_supplied());
        let ad = input.builder().build_and_sign(input.params()).unwrap();
        let providers = ad.extended_provider.unwrap().providers;

        prop_assert_eq!(providers.len(), input.distinct_extended() + 1);
        let last = providers.last().unwrap();
        prop_assert_eq!(last.id, input.keypair.peer_id());
        prop_assert_eq!(&last.addresses, &input.addresses);
        prop_assert_eq!(last.metadata.as_ref(), input.metadata.as_slice());
    }

    #[test]
    fn test_supplied_main_left_untouched(mut input: BuildInput) {
        input.override_providers = false;
        prop_assume!(input.main_supplied());
        let main = input.keypair.peer_id();
        let supplied = input
            .extended_providers
            .iter()
            .find(|xp| xp.id == main.to_string())
            .cloned()
            .unwrap();

        let ad = input.builder().build_and_sign(input.params()).unwrap();
        let providers = ad.extended_provider.unwrap().providers;

        prop_assert_eq!(providers.len(), input.distinct_extended());
        let entry = providers.iter().find(|p| p.id == main).unwrap();
        prop_assert_eq!(&entry.addresses, &supplied.addresses);
        prop_assert_eq!(&entry.metadata, &supplied.metadata);
    }

    #[test]
    fn test_override_without_context_always_fails(mut input: BuildInput) {
        input.override_providers = true;
        input.context_id.clear();
        prop_assert_eq!(
            input.builder().build_and_sign(input.params()).unwrap_err(),
            BuildError::OverrideWithoutContext
        );
    }

    #[test]
    fn test_any_empty_addresses_fails(mut input: BuildInput, pick in any::<prop::sample::Index>()) {
        prop_assume!(!input.extended_providers.is_empty());
        let i = pick.index(input.extended_providers.len());
        input.extended_providers[i].addresses.clear();
        prop_assert_eq!(
            input.builder().build_and_sign(input.params()).unwrap_err(),
            BuildError::EmptyAddresses
        );
    }

    #[test]
    fn test_signature_recovers_main(input: BuildInput) {
        let ad = input.builder().build_and_sign(input.params()).unwrap();
        prop_assert_eq!(ad.verify_signature().unwrap(), input.keypair.peer_id());
        prop_assert!(ad.verify_extended_signatures().is_ok());
    }
}
