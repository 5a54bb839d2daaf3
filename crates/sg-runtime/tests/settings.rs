mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use sg_compiler::dynamic::{DOMAIN_EXCEPTIONS_RULE_ID, WHITELIST_RULE_ID, XHR_TEST_RULE_ID};
use sg_compiler::RulesetId;
use sg_core::settings::Origin;
use sg_core::{SettingKey, StatisticKey};
use sg_runtime::{Coordinator, MemoryRuleEngine, RuleEngineError, RuntimeConfig, RuntimeError};

#[tokio::test]
async fn test_start_applies_rules() {
    let h = harness_with(json!({"whitelistedDomains": {"news.test": true}}), json!({}));
    h.coordinator.start(Vec::new()).await.unwrap();

    let whitelist = h.engine.dynamic_rule(WHITELIST_RULE_ID).unwrap();
    assert_eq!(whitelist.priority, 3);
    assert_eq!(whitelist.condition.initiator_domains, Some(vec!["news.test".to_string()]));

    let xhr = h.engine.dynamic_rule(XHR_TEST_RULE_ID).unwrap();
    assert_eq!(xhr.condition.initiator_domains, Some(vec!["surrogate-cdn.org".to_string()]));

    assert!(h.engine.dynamic_rule(DOMAIN_EXCEPTIONS_RULE_ID).is_some());
    assert!(h.engine.is_enabled(RulesetId::Sanitize));
    assert!(!h.engine.is_enabled(RulesetId::RedirectStaging));
}

#[tokio::test]
async fn test_whitelist_add_and_remove() {
    let h = harness();
    h.coordinator.start([(1, Some("https://shop.news.test/".to_string()))]).await.unwrap();
    h.view.take();

    assert!(h.coordinator.add_to_whitelist("WWW.News.Test").await.unwrap());
    assert!(!h.coordinator.add_to_whitelist("news.test").await.unwrap());

    let rule = h.engine.dynamic_rule(WHITELIST_RULE_ID).unwrap();
    assert_eq!(rule.condition.initiator_domains, Some(vec!["news.test".to_string()]));
    let xhr = h.engine.dynamic_rule(XHR_TEST_RULE_ID).unwrap();
    assert_eq!(xhr.condition.excluded_initiator_domains, Some(vec!["news.test".to_string()]));

    assert_eq!(
        h.view.take(),
        vec![Rendered::WhitelistState {
            tab: 1,
            whitelisted: true,
            injection_count: 0
        }]
    );

    // Removing a subdomain drops the parent entry covering it
    assert!(h.coordinator.remove_from_whitelist("shop.news.test").await.unwrap());
    assert!(h.engine.dynamic_rule(WHITELIST_RULE_ID).is_none());
    assert!(h.coordinator.get_settings().await.unwrap().whitelist().is_empty());
    assert!(!h.coordinator.remove_from_whitelist("news.test").await.unwrap());
}

#[tokio::test]
async fn test_concurrent_whitelist_changes_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let config = RuntimeConfig {
        state_dir: Some(dir.path().to_path_buf()),
        ..RuntimeConfig::default()
    };
    let engine = Arc::new(MemoryRuleEngine::new());
    let coordinator = Coordinator::from_config(&config, engine.clone(), Arc::new(RecordingView::default())).unwrap();

    let (a, b) = tokio::join!(
        coordinator.add_to_whitelist("a.test"),
        coordinator.add_to_whitelist("b.test"),
    );
    assert!(a.unwrap());
    assert!(b.unwrap());

    let rule = engine.dynamic_rule(WHITELIST_RULE_ID).unwrap();
    assert_eq!(
        rule.condition.initiator_domains,
        Some(vec!["a.test".to_string(), "b.test".to_string()])
    );

    let reopened = Coordinator::from_config(&config, Arc::new(MemoryRuleEngine::new()), Arc::new(RecordingView::default())).unwrap();
    let whitelist = reopened.get_settings().await.unwrap().whitelist();
    assert_eq!(whitelist.domains().collect::<Vec<_>>(), vec!["a.test", "b.test"]);

    let (a, b) = tokio::join!(
        coordinator.remove_from_whitelist("a.test"),
        coordinator.add_to_whitelist("c.test"),
    );
    assert!(a.unwrap());
    assert!(b.unwrap());
    let whitelist = coordinator.get_settings().await.unwrap().whitelist();
    assert_eq!(whitelist.domains().collect::<Vec<_>>(), vec!["b.test", "c.test"]);
}

#[tokio::test]
async fn test_whitelisting_test_domain_drops_xhr_rule() {
    let h = harness();
    h.coordinator.start(Vec::new()).await.unwrap();
    assert!(h.engine.dynamic_rule(XHR_TEST_RULE_ID).is_some());

    h.coordinator.add_to_whitelist("surrogate-cdn.org").await.unwrap();
    assert!(h.engine.dynamic_rule(XHR_TEST_RULE_ID).is_none());
}

#[tokio::test]
async fn test_ruleset_toggles() {
    let h = harness();
    h.coordinator.start(Vec::new()).await.unwrap();
    let updates = h.engine.ruleset_update_count();

    h.coordinator.update_setting("enforceStaging", json!(true)).await.unwrap();
    assert!(h.engine.is_enabled(RulesetId::RedirectStaging));
    assert!(!h.engine.is_enabled(RulesetId::Block));

    h.coordinator.update_setting("blockMissing", json!(true)).await.unwrap();
    assert!(h.engine.is_enabled(RulesetId::Block));

    h.coordinator.update_setting("stripMetadata", json!(false)).await.unwrap();
    assert!(!h.engine.is_enabled(RulesetId::Sanitize));

    h.coordinator.clear_setting("enforceStaging").await.unwrap();
    h.coordinator.clear_setting("blockMissing").await.unwrap();
    assert!(!h.engine.is_enabled(RulesetId::RedirectStaging));
    assert!(!h.engine.is_enabled(RulesetId::Block));

    // Settings that touch no ruleset leave the engine alone
    let before = h.engine.ruleset_update_count();
    h.coordinator.update_setting("showReleaseNotes", json!(false)).await.unwrap();
    assert_eq!(h.engine.ruleset_update_count(), before);
    assert!(before > updates);
}

#[tokio::test]
async fn test_icon_badge_toggle_rerenders_tabs() {
    let h = harness();
    h.coordinator.start([(1, Some("https://news.test/".to_string()))]).await.unwrap();
    h.coordinator
        .on_before_request(&request("r1", JQUERY_364, "script", 1))
        .await
        .unwrap();
    h.coordinator.on_request_completed("r1").await.unwrap();
    h.view.take();

    h.coordinator.update_setting("showIconBadge", json!(false)).await.unwrap();
    assert_eq!(h.view.take(), vec![Rendered::ClearBadge { tab: 1 }]);

    h.coordinator.update_setting("showIconBadge", json!(true)).await.unwrap();
    assert_eq!(
        h.view.take(),
        vec![Rendered::InjectionCount {
            tab: 1,
            injection_count: 1,
            show_badge: true
        }]
    );
}

#[tokio::test]
async fn test_setting_contract() {
    let h = harness_with(json!({}), json!({"blockMissing": true}));

    let err = h.coordinator.get_setting("unknownSetting").await.unwrap_err();
    assert_eq!(err.to_string(), "Setting \"unknownSetting\" does not exist.");

    let err = h
        .coordinator
        .update_setting("environmentName", json!("stable"))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Setting(_)));

    let settings = h.coordinator.get_settings().await.unwrap();
    assert_eq!(settings.origin(SettingKey::BlockMissing), Some(Origin::Managed));
    assert_eq!(h.coordinator.get_setting("environmentName").await.unwrap(), json!("staging"));

    // A local value can not lift a truthy managed one
    let settings = h.coordinator.update_setting("blockMissing", json!(false)).await.unwrap();
    assert!(settings.block_missing());
}

#[tokio::test]
async fn test_rule_failure_surfaces_to_caller() {
    let h = harness();
    h.coordinator.start(Vec::new()).await.unwrap();

    h.engine.fail_next(RuleEngineError::Rejected("quota exceeded".to_string()));
    let err = h.coordinator.add_to_whitelist("news.test").await.unwrap_err();
    assert_eq!(err.to_string(), "Rule update rejected: quota exceeded");

    // The setting was stored; re-applying it goes through
    assert!(h.coordinator.get_settings().await.unwrap().whitelist().contains("news.test"));
    h.coordinator.add_to_whitelist("other.test").await.unwrap();
    let rule = h.engine.dynamic_rule(WHITELIST_RULE_ID).unwrap();
    assert_eq!(rule.condition.initiator_domains.map(|d| d.len()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_statistics_are_debounced() {
    let h = harness();
    let storage = h.coordinator.storage();

    for _ in 0..3 {
        storage.increment_statistic(StatisticKey::AmountInjected).await.unwrap();
    }
    assert_eq!(storage.get_statistic("amountInjected").await.unwrap().value, 3);
    assert_eq!(h.local.writes(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    storage.increment_statistic(StatisticKey::AmountInjected).await.unwrap();

    // The second increment restarted the quiet period
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.local.writes(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.local.writes(), 1);
    assert!(!storage.has_pending_flush());

    let stored = h.coordinator.storage().get_statistic("amountInjected").await.unwrap();
    assert_eq!(stored.value, 4);
}

#[tokio::test]
async fn test_persisted_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = RuntimeConfig {
        state_dir: Some(dir.path().to_path_buf()),
        ..RuntimeConfig::default()
    };

    let coordinator = Coordinator::from_config(
        &config,
        Arc::new(MemoryRuleEngine::new()),
        Arc::new(RecordingView::default()),
    )
    .unwrap();
    coordinator.add_to_whitelist("news.test").await.unwrap();
    coordinator
        .storage()
        .increment_statistic(StatisticKey::AmountBlocked)
        .await
        .unwrap();
    coordinator.flush_statistics().await.unwrap();

    let reopened = Coordinator::from_config(
        &config,
        Arc::new(MemoryRuleEngine::new()),
        Arc::new(RecordingView::default()),
    )
    .unwrap();
    let settings = reopened.get_settings().await.unwrap();
    assert!(settings.whitelist().is_whitelisted("shop.news.test"));
    assert_eq!(reopened.get_statistic("amountBlocked").await.unwrap().value, 1);
}
