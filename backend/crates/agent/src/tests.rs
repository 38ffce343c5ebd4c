//! Unit tests for the agent crate

#[cfg(test)]
mod support {
    use crate::application::config::AgentConfig;
    use crate::application::{
        AgentCredential, AuthorizeActionInput, AuthorizeActionOutput, AuthorizeActionUseCase,
        RegisterAgentInput, RegisterAgentOutput, RegisterAgentUseCase,
        RequestActionChallengeInput, RequestActionChallengeUseCase,
    };
    use crate::error::AgentResult;
    use crate::infra::memory::MemoryAgentRepository;
    use kernel::ActionKind;
    use kernel::id::ChallengeId;
    use platform::clock::ManualClock;
    use pow::domain::services::verify_pow;
    use pow::{
        Difficulty, IssueChallengeInput, IssueChallengeOutput, IssueChallengeUseCase,
        MemoryPowRepository, MineSolutionUseCase, MiningBudget, PowConfig,
    };
    use std::sync::Arc;
    use std::time::Duration;

    pub const START_MS: i64 = 1_700_000_000_000;

    pub struct Harness {
        pub challenges: Arc<MemoryPowRepository>,
        pub repo: Arc<MemoryAgentRepository>,
        pub pow_config: Arc<PowConfig>,
        pub config: Arc<AgentConfig>,
        pub clock: Arc<ManualClock>,
    }

    /// Cheap difficulties so every test can mine its own proofs
    pub fn harness() -> Harness {
        harness_with(|pow, agent| (pow, agent))
    }

    pub fn harness_with(
        tweak: impl FnOnce(PowConfig, AgentConfig) -> (PowConfig, AgentConfig),
    ) -> Harness {
        let clock = Arc::new(ManualClock::new(START_MS));
        let pow_config = PowConfig::default()
            .with_clock(clock.clone())
            .with_difficulties(Some(Difficulty::clamped(2)), Some(Difficulty::clamped(2)));
        let config = AgentConfig {
            managed_difficulty: Difficulty::clamped(2),
            ..AgentConfig::default()
        }
        .with_clock(clock.clone());
        let (pow_config, config) = tweak(pow_config, config);

        Harness {
            challenges: Arc::new(MemoryPowRepository::new()),
            repo: Arc::new(MemoryAgentRepository::new()),
            pow_config: Arc::new(pow_config),
            config: Arc::new(config),
            clock,
        }
    }

    pub async fn solve(prefix: &str, difficulty: Difficulty) -> String {
        MineSolutionUseCase::new(MiningBudget {
            max_attempts: 100_000_000,
            time_budget: Duration::from_secs(120),
        })
        .execute(prefix, difficulty)
        .await
        .unwrap()
        .nonce
    }

    /// A nonce that does not satisfy `difficulty` for `prefix`
    pub fn wrong_nonce(prefix: &str, difficulty: Difficulty) -> String {
        (0u64..)
            .map(|i| format!("miss{i}"))
            .find(|n| !verify_pow(prefix, n, difficulty))
            .unwrap()
    }

    impl Harness {
        pub async fn registration_challenge(&self) -> IssueChallengeOutput {
            IssueChallengeUseCase::new(self.challenges.clone(), self.pow_config.clone())
                .execute(IssueChallengeInput::registration())
                .await
                .unwrap()
        }

        pub fn register_use_case(&self) -> RegisterAgentUseCase<MemoryPowRepository, MemoryAgentRepository> {
            RegisterAgentUseCase::new(
                self.challenges.clone(),
                self.repo.clone(),
                self.pow_config.clone(),
                self.config.clone(),
            )
        }

        pub async fn try_register(&self, username: &str) -> AgentResult<RegisterAgentOutput> {
            let challenge = self.registration_challenge().await;
            let nonce = solve(&challenge.prefix, challenge.difficulty).await;
            self.register_use_case()
                .execute(RegisterAgentInput {
                    challenge_id: challenge.challenge_id,
                    nonce,
                    username: username.to_string(),
                    description: Some("test agent".to_string()),
                })
                .await
        }

        pub async fn register(&self, username: &str) -> RegisterAgentOutput {
            self.try_register(username).await.unwrap()
        }

        pub async fn request_challenge(
            &self,
            secret: &str,
            kind: ActionKind,
        ) -> AgentResult<IssueChallengeOutput> {
            RequestActionChallengeUseCase::new(
                self.challenges.clone(),
                self.repo.clone(),
                self.repo.clone(),
                self.pow_config.clone(),
                self.config.clone(),
            )
            .execute(RequestActionChallengeInput {
                credential: AgentCredential::secret(secret),
                action_kind: kind,
            })
            .await
        }

        pub async fn authorize_with(
            &self,
            secret: &str,
            challenge_id: ChallengeId,
            nonce: String,
            kind: ActionKind,
        ) -> AgentResult<AuthorizeActionOutput> {
            AuthorizeActionUseCase::new(
                self.challenges.clone(),
                self.repo.clone(),
                self.repo.clone(),
                self.repo.clone(),
                self.pow_config.clone(),
                self.config.clone(),
            )
            .execute(AuthorizeActionInput {
                credential: AgentCredential::secret(secret),
                challenge_id,
                nonce,
                action_kind: kind,
            })
            .await
        }

        /// Full action flow: challenge, mine, authorize
        pub async fn authorize(
            &self,
            secret: &str,
            kind: ActionKind,
        ) -> AgentResult<AuthorizeActionOutput> {
            let challenge = self.request_challenge(secret, kind).await?;
            let nonce = solve(&challenge.prefix, challenge.difficulty).await;
            self.authorize_with(secret, challenge.challenge_id, nonce, kind)
                .await
        }
    }
}

#[cfg(test)]
mod registry_tests {
    use super::support::*;
    use crate::application::{
        AgentCredential, ListAgentsUseCase, RegisterAgentInput, ResolveAgentUseCase,
        RevokeAgentUseCase,
    };
    use crate::domain::repository::AgentKeyRepository;
    use crate::error::AgentError;
    use kernel::id::AgentKeyId;
    use pow::{
        ChallengeRepository, ChallengeScope, Difficulty, IssueChallengeInput, IssueChallengeUseCase,
        PowError,
    };

    #[tokio::test]
    async fn test_register_returns_secret_once_and_stores_only_hash() {
        let h = harness();
        let output = h.register("Alpha-Bot").await;

        assert_eq!(output.username.as_str(), "alpha-bot");
        assert!(output.secret.expose().starts_with("agt_"));
        assert_eq!(output.key_hint, format!("{}...", &output.secret.expose()[..8]));

        let stored = h.repo.find_by_id(output.agent_key_id).await.unwrap().unwrap();
        assert_eq!(stored.secret_hash, output.secret.hash());
        assert_ne!(stored.secret_hash, output.secret.expose());
        assert!(stored.is_active);

        // Resolvable by secret, and no read path returns it
        let resolved = ResolveAgentUseCase::new(h.repo.clone())
            .require_active(&AgentCredential::secret(output.secret.expose()))
            .await
            .unwrap();
        assert_eq!(resolved.id, output.agent_key_id);

        let listed = ListAgentsUseCase::new(h.repo.clone()).execute().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key_hint, output.key_hint);
    }

    #[tokio::test]
    async fn test_alpha_bot_registration_at_reference_difficulty() {
        let h = harness();
        let issued = IssueChallengeUseCase::new(h.challenges.clone(), h.pow_config.clone())
            .execute(IssueChallengeInput {
                scope: ChallengeScope::Registration,
                difficulty: Difficulty::new(5),
            })
            .await
            .unwrap();
        assert_eq!(issued.difficulty.digits(), 5);

        let nonce = solve(&issued.prefix, issued.difficulty).await;
        let output = h
            .register_use_case()
            .execute(RegisterAgentInput {
                challenge_id: issued.challenge_id,
                nonce,
                username: "alpha-bot".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert!(!output.secret.expose().is_empty());
        assert_eq!(output.username.as_str(), "alpha-bot");
    }

    #[tokio::test]
    async fn test_username_taken_even_after_revocation() {
        let h = harness();
        let first = h.register("alpha-bot").await;

        let err = h.try_register("ALPHA-BOT").await.unwrap_err();
        assert!(matches!(err, AgentError::UsernameTaken));

        RevokeAgentUseCase::new(h.repo.clone(), h.config.clone())
            .execute(first.agent_key_id)
            .await
            .unwrap();

        let err = h.try_register("alpha-bot").await.unwrap_err();
        assert!(matches!(err, AgentError::UsernameTaken));
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_taken_username_does_not_burn_challenge() {
        let h = harness();
        h.register("alpha-bot").await;

        let challenge = h.registration_challenge().await;
        let nonce = solve(&challenge.prefix, challenge.difficulty).await;
        let err = h
            .register_use_case()
            .execute(RegisterAgentInput {
                challenge_id: challenge.challenge_id,
                nonce: nonce.clone(),
                username: "alpha-bot".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UsernameTaken));

        let stored = h.challenges.get(challenge.challenge_id).await.unwrap().unwrap();
        assert!(!stored.is_consumed());

        // Same proof, different name
        h.register_use_case()
            .execute(RegisterAgentInput {
                challenge_id: challenge.challenge_id,
                nonce,
                username: "beta-bot".to_string(),
                description: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_proof_is_reported_and_challenge_stays_solvable() {
        let h = harness();
        let challenge = h.registration_challenge().await;
        let input = |nonce: String| RegisterAgentInput {
            challenge_id: challenge.challenge_id,
            nonce,
            username: "gamma-bot".to_string(),
            description: None,
        };

        let err = h
            .register_use_case()
            .execute(input(wrong_nonce(&challenge.prefix, challenge.difficulty)))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Pow(PowError::ProofInvalid)));
        assert_eq!(err.code(), "PROOF_INVALID");

        let nonce = solve(&challenge.prefix, challenge.difficulty).await;
        h.register_use_case().execute(input(nonce.clone())).await.unwrap();

        let err = h
            .register_use_case()
            .execute(RegisterAgentInput {
                username: "delta-bot".to_string(),
                ..input(nonce)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PROOF_ALREADY_USED");
    }

    #[tokio::test]
    async fn test_invalid_username_never_reaches_verification() {
        let h = harness();
        let challenge = h.registration_challenge().await;

        let err = h
            .register_use_case()
            .execute(RegisterAgentInput {
                challenge_id: challenge.challenge_id,
                nonce: "0".to_string(),
                username: "a..b".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_and_unknown_key_is_not_found() {
        let h = harness();
        let output = h.register("alpha-bot").await;
        let revoke = RevokeAgentUseCase::new(h.repo.clone(), h.config.clone());

        revoke.execute(output.agent_key_id).await.unwrap();
        revoke.execute(output.agent_key_id).await.unwrap();

        let stored = h.repo.find_by_id(output.agent_key_id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert!(stored.revoked_at.is_some());

        let err = revoke.execute(AgentKeyId::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_unknown_secret_is_key_not_found() {
        let h = harness();
        let err = ResolveAgentUseCase::new(h.repo.clone())
            .require_active(&AgentCredential::secret("agt_nope_00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::KeyNotFound));
        assert_eq!(err.status_code(), 401);
    }
}

#[cfg(test)]
mod authorizer_tests {
    use super::support::*;
    use crate::application::{
        AgentCredential, AuthorizeActionInput, AuthorizeActionUseCase, RateLimiter,
        RevokeAgentUseCase,
    };
    use crate::domain::entity::ActionReceipt;
    use crate::domain::repository::{AgentKeyRepository, ReceiptRepository};
    use crate::error::{AgentError, AgentResult};
    use kernel::ActionKind;
    use pow::{ChallengeKind, ChallengeRepository, PowError};
    use std::sync::Arc;
    use std::time::Duration;

    /// Receipt store that is down for writes
    struct UnwritableReceipts;

    impl ReceiptRepository for UnwritableReceipts {
        async fn create(&self, _receipt: &ActionReceipt) -> AgentResult<()> {
            Err(AgentError::Internal("receipt store down".into()))
        }

        async fn consume(
            &self,
            _token_hash: &str,
            _expected: Option<ActionKind>,
            _now_ms: i64,
        ) -> AgentResult<Option<ActionReceipt>> {
            Ok(None)
        }

        async fn purge_expired(&self, _now_ms: i64) -> AgentResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_failed_receipt_write_returns_slot_and_leaves_counters() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose();

        let challenge = h.request_challenge(secret, ActionKind::Post).await.unwrap();
        let nonce = solve(&challenge.prefix, challenge.difficulty).await;

        let err = AuthorizeActionUseCase::new(
            h.challenges.clone(),
            h.repo.clone(),
            h.repo.clone(),
            Arc::new(UnwritableReceipts),
            h.pow_config.clone(),
            h.config.clone(),
        )
        .execute(AuthorizeActionInput {
            credential: AgentCredential::secret(secret),
            challenge_id: challenge.challenge_id,
            nonce,
            action_kind: ActionKind::Post,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::Internal(_)));
        assert_eq!(err.status_code(), 500);

        let snapshot = RateLimiter::new(h.repo.clone(), h.config.clone())
            .peek(agent.agent_key_id, ActionKind::Post)
            .await
            .unwrap();
        assert_eq!(snapshot.used, 0);

        let stored = h.repo.find_by_id(agent.agent_key_id).await.unwrap().unwrap();
        assert_eq!(stored.action_counts.posts, 0);
        assert!(stored.last_used_at.is_none());
        assert_eq!(h.repo.receipt_count(), 0);

        // The whole budget is still there
        for used in 1..=5 {
            let output = h.authorize(secret, ActionKind::Post).await.unwrap();
            assert_eq!(output.rate_limit.used, used);
        }
    }

    #[tokio::test]
    async fn test_action_challenge_is_bound_to_key_and_kind() {
        let h = harness();
        let agent = h.register("alpha-bot").await;

        let challenge = h
            .request_challenge(agent.secret.expose(), ActionKind::Comment)
            .await
            .unwrap();
        assert_eq!(challenge.scope.kind(), ChallengeKind::Action);
        assert_eq!(challenge.scope.agent_key_id(), Some(agent.agent_key_id));
        assert_eq!(challenge.scope.action_kind(), Some(ActionKind::Comment));
    }

    #[tokio::test]
    async fn test_authorize_issues_receipt_and_updates_counters() {
        let h = harness();
        let agent = h.register("alpha-bot").await;

        let output = h.authorize(agent.secret.expose(), ActionKind::Post).await.unwrap();
        assert_eq!(output.agent_key_id, agent.agent_key_id);
        assert_eq!(output.action_kind, ActionKind::Post);
        assert_eq!(output.rate_limit.used, 1);
        assert_eq!(output.rate_limit.remaining(), 4);
        assert_eq!(output.expires_at_ms, START_MS + 300_000);
        assert!(!output.receipt.expose().is_empty());

        let stored = h.repo.find_by_id(agent.agent_key_id).await.unwrap().unwrap();
        assert_eq!(stored.action_counts.posts, 1);
        assert_eq!(stored.action_counts.comments, 0);
        assert!(stored.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_comment_challenge_used_for_post_is_action_mismatch() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose();

        let challenge = h.request_challenge(secret, ActionKind::Comment).await.unwrap();
        let nonce = solve(&challenge.prefix, challenge.difficulty).await;

        let err = h
            .authorize_with(secret, challenge.challenge_id, nonce.clone(), ActionKind::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Pow(PowError::ActionMismatch)));
        assert_eq!(err.code(), "ACTION_MISMATCH");

        // Mismatch leaves the challenge usable for its real purpose
        let ok = h
            .authorize_with(secret, challenge.challenge_id, nonce, ActionKind::Comment)
            .await
            .unwrap();
        assert_eq!(ok.action_kind, ActionKind::Comment);
    }

    #[tokio::test]
    async fn test_challenge_of_another_key_is_action_mismatch() {
        let h = harness();
        let alpha = h.register("alpha-bot").await;
        let beta = h.register("beta-bot").await;

        let challenge = h
            .request_challenge(alpha.secret.expose(), ActionKind::Post)
            .await
            .unwrap();
        let nonce = solve(&challenge.prefix, challenge.difficulty).await;

        let err = h
            .authorize_with(beta.secret.expose(), challenge.challenge_id, nonce, ActionKind::Post)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ACTION_MISMATCH");
    }

    #[tokio::test]
    async fn test_revocation_is_sticky() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose();

        let challenge = h.request_challenge(secret, ActionKind::Post).await.unwrap();
        let nonce = solve(&challenge.prefix, challenge.difficulty).await;

        RevokeAgentUseCase::new(h.repo.clone(), h.config.clone())
            .execute(agent.agent_key_id)
            .await
            .unwrap();

        let err = h
            .authorize_with(secret, challenge.challenge_id, nonce, ActionKind::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::KeyInactive));
        assert_eq!(err.status_code(), 401);

        // Proof untouched, budget untouched, still refused
        assert!(!h.challenges.get(challenge.challenge_id).await.unwrap().unwrap().is_consumed());
        let err = h.request_challenge(secret, ActionKind::Post).await.unwrap_err();
        assert!(matches!(err, AgentError::KeyInactive));
    }

    #[tokio::test]
    async fn test_post_ceiling_and_window_rollover() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose();

        for used in 1..=5 {
            let output = h.authorize(secret, ActionKind::Post).await.unwrap();
            assert_eq!(output.rate_limit.used, used);
        }

        // Refused before any work is handed out
        let err = h.request_challenge(secret, ActionKind::Post).await.unwrap_err();
        assert!(matches!(err, AgentError::RateLimitExceeded { .. }));
        assert_eq!(err.status_code(), 429);

        // Comments have their own bucket
        assert!(h.authorize(secret, ActionKind::Comment).await.is_ok());

        h.clock.advance(Duration::from_secs(3600));
        let output = h.authorize(secret, ActionKind::Post).await.unwrap();
        assert_eq!(output.rate_limit.used, 1);
    }

    #[tokio::test]
    async fn test_ceiling_rechecked_at_authorization_and_proof_spent() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose();

        for _ in 0..4 {
            h.authorize(secret, ActionKind::Post).await.unwrap();
        }

        // Two challenges handed out while one slot was left
        let first = h.request_challenge(secret, ActionKind::Post).await.unwrap();
        let second = h.request_challenge(secret, ActionKind::Post).await.unwrap();
        let first_nonce = solve(&first.prefix, first.difficulty).await;
        let second_nonce = solve(&second.prefix, second.difficulty).await;

        h.authorize_with(secret, first.challenge_id, first_nonce, ActionKind::Post)
            .await
            .unwrap();
        let err = h
            .authorize_with(secret, second.challenge_id, second_nonce.clone(), ActionKind::Post)
            .await
            .unwrap_err();
        let AgentError::RateLimitExceeded { retry_after_secs } = err else {
            panic!("expected rate limit, got {err}");
        };
        assert!(retry_after_secs >= 1);

        // The valid proof was consumed anyway
        assert!(h.challenges.get(second.challenge_id).await.unwrap().unwrap().is_consumed());
        let err = h
            .authorize_with(secret, second.challenge_id, second_nonce, ActionKind::Post)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Pow(PowError::ProofAlreadyUsed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_authorizations_never_exceed_ceiling() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let secret = agent.secret.expose().to_string();

        // Solve ten proofs up front, then redeem them all at once
        let mut solved = Vec::new();
        for _ in 0..10 {
            let c = h.request_challenge(&secret, ActionKind::Post).await.unwrap();
            let nonce = solve(&c.prefix, c.difficulty).await;
            solved.push((c.challenge_id, nonce));
        }

        let h = std::sync::Arc::new(h);
        let mut handles = Vec::new();
        for (challenge_id, nonce) in solved {
            let h = h.clone();
            let secret = secret.clone();
            handles.push(tokio::spawn(async move {
                h.authorize_with(&secret, challenge_id, nonce, ActionKind::Post).await
            }));
        }

        let mut allowed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => allowed += 1,
                Err(AgentError::RateLimitExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(allowed, 5);

        let snapshot = RateLimiter::new(h.repo.clone(), h.config.clone())
            .peek(agent.agent_key_id, ActionKind::Post)
            .await
            .unwrap();
        assert_eq!(snapshot.used, 5);
        assert!(snapshot.is_exhausted());
    }
}

#[cfg(test)]
mod rate_limiter_tests {
    use super::support::*;
    use crate::application::{RateDecision, RateLimiter};
    use kernel::ActionKind;
    use kernel::id::AgentKeyId;
    use platform::rate_limit::RateLimitConfig;

    #[tokio::test]
    async fn test_peek_reports_window_and_does_not_count() {
        let h = harness();
        let limiter = RateLimiter::new(h.repo.clone(), h.config.clone());
        let key = AgentKeyId::new();

        let before = limiter.peek(key, ActionKind::Comment).await.unwrap();
        assert_eq!(before.used, 0);
        assert_eq!(before.ceiling, 15);
        assert_eq!(before.reset_at_ms % 3_600_000, 0);
        assert!(before.reset_at_ms > START_MS);

        limiter.peek(key, ActionKind::Comment).await.unwrap();
        assert!(matches!(
            limiter.check_and_increment(key, ActionKind::Comment).await.unwrap(),
            RateDecision::Allowed(_)
        ));
        assert_eq!(limiter.peek(key, ActionKind::Comment).await.unwrap().used, 1);
    }

    #[tokio::test]
    async fn test_zero_ceiling_always_denies() {
        let h = harness_with(|pow, agent| {
            (pow, agent.with_rate_limit(ActionKind::Post, RateLimitConfig::per_hour(0)))
        });
        let limiter = RateLimiter::new(h.repo.clone(), h.config.clone());

        let decision = limiter
            .check_and_increment(AgentKeyId::new(), ActionKind::Post)
            .await
            .unwrap();
        let RateDecision::Denied(snapshot) = decision else {
            panic!("zero ceiling must deny");
        };
        assert_eq!(snapshot.remaining(), 0);
    }
}

#[cfg(test)]
mod receipt_tests {
    use super::support::*;
    use crate::application::{ConsumeReceiptUseCase, RevokeAgentUseCase};
    use crate::error::AgentError;
    use kernel::ActionKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_receipt_validates_exactly_once() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let output = h.authorize(agent.secret.expose(), ActionKind::Post).await.unwrap();
        let consume = ConsumeReceiptUseCase::new(h.repo.clone(), h.repo.clone(), h.config.clone());

        let principal = consume
            .execute(output.receipt.expose(), Some(ActionKind::Post))
            .await
            .unwrap();
        assert_eq!(principal.agent_key_id, agent.agent_key_id);
        assert_eq!(principal.username, "alpha-bot");
        assert_eq!(principal.receipt_id, output.receipt_id);

        let err = consume.execute(output.receipt.expose(), None).await.unwrap_err();
        assert!(matches!(err, AgentError::ReceiptInvalid));
    }

    #[tokio::test]
    async fn test_receipt_for_other_kind_is_not_spent() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let output = h.authorize(agent.secret.expose(), ActionKind::Comment).await.unwrap();
        let consume = ConsumeReceiptUseCase::new(h.repo.clone(), h.repo.clone(), h.config.clone());

        let err = consume
            .execute(output.receipt.expose(), Some(ActionKind::Post))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ReceiptInvalid));

        assert!(
            consume
                .execute(output.receipt.expose(), Some(ActionKind::Comment))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_receipt_expires() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let output = h.authorize(agent.secret.expose(), ActionKind::Post).await.unwrap();
        let consume = ConsumeReceiptUseCase::new(h.repo.clone(), h.repo.clone(), h.config.clone());

        h.clock.advance(Duration::from_millis(300_001));
        let err = consume.execute(output.receipt.expose(), None).await.unwrap_err();
        assert!(matches!(err, AgentError::ReceiptInvalid));
    }

    #[tokio::test]
    async fn test_receipt_of_revoked_key_is_refused() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        let output = h.authorize(agent.secret.expose(), ActionKind::Post).await.unwrap();

        RevokeAgentUseCase::new(h.repo.clone(), h.config.clone())
            .execute(agent.agent_key_id)
            .await
            .unwrap();

        let err = ConsumeReceiptUseCase::new(h.repo.clone(), h.repo.clone(), h.config.clone())
            .execute(output.receipt.expose(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::KeyInactive));
    }

    #[tokio::test]
    async fn test_garbage_tokens_are_invalid() {
        let h = harness();
        let consume = ConsumeReceiptUseCase::new(h.repo.clone(), h.repo.clone(), h.config.clone());
        for token in ["", "   ", "nope", &"x".repeat(300)] {
            let err = consume.execute(token, None).await.unwrap_err();
            assert!(matches!(err, AgentError::ReceiptInvalid), "{token:?}");
        }
    }
}

#[cfg(test)]
mod maintenance_tests {
    use super::support::*;
    use crate::application::{
        CleanupExpiredUseCase, CleanupReport, ProvisionManagedAgentInput,
        ProvisionManagedAgentUseCase,
    };
    use crate::domain::repository::AgentKeyRepository;
    use crate::error::AgentError;
    use kernel::ActionKind;
    use pow::{Difficulty, MiningBudget, PowError};
    use std::time::Duration;

    fn input(username: &str) -> ProvisionManagedAgentInput {
        ProvisionManagedAgentInput {
            username: username.to_string(),
            description: Some("managed".to_string()),
        }
    }

    #[tokio::test]
    async fn test_provision_managed_agent() {
        let h = harness();
        let provision = ProvisionManagedAgentUseCase::new(
            h.challenges.clone(),
            h.repo.clone(),
            h.pow_config.clone(),
            h.config.clone(),
        );

        let output = provision.execute(input("managed-bot")).await.unwrap();
        assert!(output.secret.expose().starts_with("agt_"));
        let stored = h.repo.find_by_id(output.agent_key_id).await.unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("managed"));

        let err = provision.execute(input("managed-bot")).await.unwrap_err();
        assert!(matches!(err, AgentError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_provision_gives_up_within_budget() {
        let h = harness_with(|mut pow, agent| {
            pow.mining = MiningBudget {
                max_attempts: 1_000,
                time_budget: Duration::from_millis(200),
            };
            (
                pow,
                crate::application::AgentConfig {
                    managed_difficulty: Difficulty::clamped(64),
                    ..agent
                },
            )
        });

        let err = ProvisionManagedAgentUseCase::new(
            h.challenges.clone(),
            h.repo.clone(),
            h.pow_config.clone(),
            h.config.clone(),
        )
        .execute(input("slow-bot"))
        .await
        .unwrap_err();

        assert!(matches!(err, AgentError::Pow(PowError::MiningTimedOut { .. })));
        assert_eq!(err.status_code(), 503);
        assert!(h.repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_purges_only_dead_rows() {
        let h = harness();
        let agent = h.register("alpha-bot").await;
        h.authorize(agent.secret.expose(), ActionKind::Post).await.unwrap();
        h.registration_challenge().await;

        let cleanup = CleanupExpiredUseCase::new(
            h.challenges.clone(),
            h.repo.clone(),
            h.repo.clone(),
            h.pow_config.clone(),
            h.config.clone(),
        );

        // Nothing is dead yet
        assert_eq!(cleanup.execute().await.unwrap(), CleanupReport::default());

        h.clock.advance(Duration::from_secs(2 * 3600 + 1));
        let report = cleanup.execute().await.unwrap();
        assert_eq!(report.challenges, 3);
        assert_eq!(report.receipts, 1);
        assert_eq!(report.rate_windows, 1);
        assert!(h.challenges.is_empty());
        assert_eq!(h.repo.receipt_count(), 0);
        assert_eq!(h.repo.window_count(), 0);

        // Keys are never cleaned up
        assert!(h.repo.find_by_id(agent.agent_key_id).await.unwrap().is_some());
    }
}

#[cfg(test)]
mod router_tests {
    use super::support::*;
    use crate::application::AgentConfig;
    use crate::domain::entity::AgentPrincipal;
    use crate::infra::memory::MemoryAgentRepository;
    use crate::presentation::middleware::{ReceiptGuard, require_action_receipt};
    use crate::presentation::router::agent_router_generic;
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use axum::routing::post;
    use axum::{Extension, Json, Router, middleware};
    use kernel::ActionKind;
    use platform::client::{ADMIN_TOKEN_HEADER, AGENT_KEY_HEADER, AGENT_TOKEN_HEADER};
    use pow::{Difficulty, MemoryPowRepository, PowConfig};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADMIN: &str = "operator-token";

    fn app(repo: MemoryAgentRepository, admin: Option<&str>) -> Router {
        let pow_config = PowConfig::default()
            .with_difficulties(Some(Difficulty::clamped(2)), Some(Difficulty::clamped(2)));
        let config = AgentConfig {
            managed_difficulty: Difficulty::clamped(2),
            ..AgentConfig::default()
        };
        agent_router_generic(
            MemoryPowRepository::new(),
            repo,
            pow_config,
            config,
            admin.map(str::to_string),
        )
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn post_json(uri: &str, body: Value, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn solve_json(challenge: &Value) -> String {
        let prefix = challenge["prefix"].as_str().unwrap();
        let difficulty = challenge["difficulty"].as_u64().unwrap() as u8;
        solve(prefix, Difficulty::clamped(difficulty)).await
    }

    async fn register_over_http(app: &Router, username: &str) -> Value {
        let (status, _, challenge) =
            send(app, post_json("/challenge", json!({"kind": "registration"}), &[])).await;
        assert_eq!(status, StatusCode::CREATED);

        let nonce = solve_json(&challenge).await;
        let (status, _, body) = send(
            app,
            post_json(
                "/register",
                json!({
                    "challengeId": challenge["challengeId"],
                    "nonce": nonce,
                    "username": username,
                    "description": "over http",
                }),
                &[],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn action_token_over_http(app: &Router, secret: &str, kind: &str) -> (StatusCode, HeaderMap, Value) {
        let (status, headers, challenge) = send(
            app,
            post_json(
                "/challenge",
                json!({"kind": "action", "actionKind": kind}),
                &[(AGENT_KEY_HEADER, secret)],
            ),
        )
        .await;
        if status != StatusCode::CREATED {
            return (status, headers, challenge);
        }
        assert_eq!(challenge["actionKind"], kind);

        let nonce = solve_json(&challenge).await;
        send(
            app,
            post_json(
                "/action-token",
                json!({
                    "challengeId": challenge["challengeId"],
                    "nonce": nonce,
                    "actionKind": kind,
                }),
                &[(AGENT_KEY_HEADER, secret)],
            ),
        )
        .await
    }

    #[tokio::test]
    async fn test_full_flow_over_http() {
        let app = app(MemoryAgentRepository::new(), None);

        let registered = register_over_http(&app, "alpha-bot").await;
        let secret = registered["secret"].as_str().unwrap().to_string();
        assert_eq!(registered["username"], "alpha-bot");
        assert!(secret.starts_with("agt_"));

        let (status, _, token) = action_token_over_http(&app, &secret, "comment").await;
        assert_eq!(status, StatusCode::OK, "{token}");
        assert_eq!(token["rateLimit"]["used"], 1);
        assert_eq!(token["rateLimit"]["ceiling"], 15);

        let receipt = token["receipt"].as_str().unwrap();
        let (status, _, consumed) = send(
            &app,
            post_json("/receipts/consume", json!({"receipt": receipt, "actionKind": "comment"}), &[]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(consumed["valid"], true);
        assert_eq!(consumed["username"], "alpha-bot");

        let (status, _, error) = send(
            &app,
            post_json("/receipts/consume", json!({"receipt": receipt}), &[]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["code"], "RECEIPT_INVALID");

        let status_req = Request::get("/rate-limit/comment")
            .header(AGENT_KEY_HEADER, secret.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, _, usage) = send(&app, status_req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(usage["used"], 1);
        assert_eq!(usage["remaining"], 14);
    }

    #[tokio::test]
    async fn test_error_codes_over_http() {
        let app = app(MemoryAgentRepository::new(), None);

        let malformed = Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");

        let (status, _, body) = send(
            &app,
            post_json("/challenge", json!({"kind": "action", "actionKind": "post"}), &[]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_CREDENTIAL");

        let (status, _, body) = send(
            &app,
            post_json(
                "/challenge",
                json!({"kind": "action", "actionKind": "vote"}),
                &[(AGENT_KEY_HEADER, "agt_x_y")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");

        let (status, _, body) = send(
            &app,
            post_json(
                "/challenge",
                json!({"kind": "action", "actionKind": "post", "agentKey": "agt_x_y"}),
                &[],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "KEY_NOT_FOUND");

        register_over_http(&app, "alpha-bot").await;
        let (status, _, challenge) =
            send(&app, post_json("/challenge", json!({"kind": "register"}), &[])).await;
        assert_eq!(status, StatusCode::CREATED);
        let nonce = solve_json(&challenge).await;
        let (status, _, body) = send(
            &app,
            post_json(
                "/register",
                json!({"challengeId": challenge["challengeId"], "nonce": nonce, "username": "Alpha-Bot"}),
                &[],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let app = app(MemoryAgentRepository::new(), None);
        let registered = register_over_http(&app, "alpha-bot").await;
        let secret = registered["secret"].as_str().unwrap();

        for _ in 0..5 {
            let (status, _, body) = action_token_over_http(&app, secret, "post").await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }

        let (status, headers, body) = action_token_over_http(&app, secret, "post").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
        let retry: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=3600).contains(&retry));
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let repo = MemoryAgentRepository::new();

        let disabled = app(repo.clone(), None);
        let (status, _, _) = send(
            &disabled,
            Request::get("/admin/agents").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let app = app(repo, Some(ADMIN));
        let (status, _, body) = send(
            &app,
            Request::get("/admin/agents")
                .header(ADMIN_TOKEN_HEADER, "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "ADMIN_UNAUTHORIZED");

        let (status, _, managed) = send(
            &app,
            post_json(
                "/admin/agents/managed",
                json!({"username": "managed-bot"}),
                &[(ADMIN_TOKEN_HEADER, ADMIN)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{managed}");
        let id = managed["agentKeyId"].as_str().unwrap().to_string();

        let (status, _, list) = send(
            &app,
            Request::get("/admin/agents")
                .header(ADMIN_TOKEN_HEADER, ADMIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["username"], "managed-bot");
        assert!(list[0].get("secret").is_none());

        let (status, _, _) = send(
            &app,
            post_json(&format!("/admin/agents/{id}/revoke"), json!({}), &[(ADMIN_TOKEN_HEADER, ADMIN)]),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let secret = managed["secret"].as_str().unwrap();
        let (status, _, body) = action_token_over_http(&app, secret, "post").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "KEY_INACTIVE");
    }

    async fn create_post(Extension(principal): Extension<AgentPrincipal>) -> Json<Value> {
        Json(json!({"author": principal.username, "kind": principal.action_kind}))
    }

    #[tokio::test]
    async fn test_receipt_middleware_guards_downstream_writes() {
        let repo = MemoryAgentRepository::new();
        let agent_api = app(repo.clone(), None);

        let guard = ReceiptGuard::new(
            Arc::new(repo),
            Arc::new(AgentConfig::default()),
            Some(ActionKind::Post),
        );
        let posts = Router::new()
            .route("/posts", post(create_post))
            .route_layer(middleware::from_fn_with_state(
                guard,
                require_action_receipt::<MemoryAgentRepository>,
            ));

        let registered = register_over_http(&agent_api, "alpha-bot").await;
        let secret = registered["secret"].as_str().unwrap();
        let (_, _, post_token) = action_token_over_http(&agent_api, secret, "post").await;
        let (_, _, comment_token) = action_token_over_http(&agent_api, secret, "comment").await;

        let write = |token: Option<&str>| {
            let mut builder = Request::post("/posts");
            if let Some(token) = token {
                builder = builder.header(AGENT_TOKEN_HEADER, token);
            }
            builder.body(Body::empty()).unwrap()
        };

        let (status, _, body) = send(&posts, write(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_CREDENTIAL");

        let (status, _, _) = send(&posts, write(comment_token["receipt"].as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, body) = send(&posts, write(post_token["receipt"].as_str())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["author"], "alpha-bot");
        assert_eq!(body["kind"], "post");

        let (status, _, body) = send(&posts, write(post_token["receipt"].as_str())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "RECEIPT_INVALID");
    }
}
