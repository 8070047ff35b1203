use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::cooldown::{Cooldown, FixedCooldown};
use crate::services::oracle::{GeminiOracle, RepairOracle};
use crate::services::repair::{RepairOptions, Repairer};
use crate::services::sanitizer::Sanitizer;
use crate::store::{PostgrestStore, RecordStore};
use crate::text::CorrectionMap;

pub fn build_store(cfg: &AppConfig) -> Result<Arc<dyn RecordStore>, AppError> {
    let store = PostgrestStore::new(cfg.store.url()?, cfg.store.api_key()?, &cfg.store.table)?
        .with_rate_limit(cfg.store.requests_per_second)
        .with_fetch_attempts(cfg.store.fetch_attempts.max(1));
    debug!(
        url = %store.collection_url(),
        rps = cfg.store.requests_per_second,
        "initialized PostgREST store"
    );
    Ok(Arc::new(store))
}

/// Builds the sanitizer. `use_oracle` lets the caller veto the oracle even
/// when configuration enables it.
pub fn build_sanitizer(cfg: &AppConfig, use_oracle: bool) -> Result<Sanitizer, AppError> {
    let corrections =
        Arc::new(CorrectionMap::builtin().with_extra(cfg.corrections.iter().cloned()));

    let oracle: Option<Arc<dyn RepairOracle>> = if use_oracle && cfg.oracle.enabled {
        let oracle = GeminiOracle::with_endpoint(
            &cfg.oracle.base_url,
            &cfg.oracle.model,
            cfg.oracle.api_key()?,
        )?
        .with_length_tolerance(cfg.oracle.length_tolerance)
        .with_timeout(Duration::from_secs(cfg.oracle.timeout_secs.max(1)))?;
        debug!(model = %cfg.oracle.model, "initialized Gemini oracle");
        Some(Arc::new(oracle) as Arc<dyn RepairOracle>)
    } else {
        debug!("oracle disabled; unresolved values are left as-is");
        None
    };

    let cooldown: Arc<dyn Cooldown> = Arc::new(FixedCooldown::from_millis(cfg.oracle.cooldown_ms));
    Ok(Sanitizer::new(corrections, oracle, cooldown))
}

pub fn build_repairer(
    cfg: &AppConfig,
    options: RepairOptions,
    use_oracle: bool,
) -> Result<Repairer, AppError> {
    let store = build_store(cfg)?;
    let sanitizer = build_sanitizer(cfg, use_oracle)?;
    Ok(Repairer::new(store, sanitizer, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OracleConfig, RepairConfig, StoreConfig};
    use crate::text::CorrectionRule;

    fn config(oracle_key: Option<&str>) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                url: Some("https://example.supabase.co".into()),
                api_key: Some("anon".into()),
                table: "places".into(),
                requests_per_second: 10,
                fetch_attempts: 3,
            },
            oracle: OracleConfig {
                enabled: true,
                api_key: oracle_key.map(str::to_owned),
                base_url: "http://localhost:9".into(),
                model: "gemini-test".into(),
                cooldown_ms: 0,
                length_tolerance: 5,
                timeout_secs: 5,
            },
            repair: RepairConfig {
                page_size: 100,
                start_offset: 0,
                include_descriptions: false,
            },
            corrections: vec![CorrectionRule::new("Umag?", "Umag")],
        }
    }

    #[test]
    fn enabled_oracle_requires_a_key() {
        let err = build_sanitizer(&config(None), true)
            .err()
            .expect("missing key must fail");
        assert!(matches!(err, AppError::ConfigLoad(_)));
    }

    #[test]
    fn oracle_can_be_vetoed_without_a_key() {
        let sanitizer = build_sanitizer(&config(None), false).expect("sanitizer");
        assert!(!sanitizer.has_oracle());
    }

    #[tokio::test]
    async fn configured_corrections_extend_the_dictionary() {
        let sanitizer = build_sanitizer(&config(Some("k")), false).expect("sanitizer");
        let out = sanitizer.sanitize("Umag?").await;
        assert_eq!(out.text, "Umag");
    }

    #[test]
    fn store_requires_credentials() {
        let mut cfg = config(Some("k"));
        cfg.store.api_key = None;
        assert!(build_store(&cfg).is_err());
        cfg.store.api_key = Some("anon".into());
        assert!(build_store(&cfg).is_ok());
    }
}
