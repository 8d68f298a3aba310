/// End-to-end investigation scenarios driven by a scripted reasoning model
/// over in-memory backends.
#[cfg(test)]
mod scenarios {
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crashlens_core::chunk::DocumentHit;
    use crashlens_core::seed::InvestigationSeed;
    use crashlens_core::store::RcaStore;

    use crate::tools::testing::{backends, chunk, StubCodeIndex, StubDocuments, StubFiles};
    use crate::{
        AgentError, ContentBlock, IncompleteReason, InvestigationConfig, InvestigationStatus,
        Investigator, ModelRequest, ModelTurn, ReasoningModel, Role, StopReason, TokenUsage,
        Toolbox,
    };

    const PAYSTACK_PY: &str = "import requests\n\nPAYSTACK_URL = \"https://api.paystack.co/transaction/initialize\"\n\ndef initialize_payment(order):\n    payload = {\"email\": order.email, \"amount\": order.total}\n    resp = requests.post(PAYSTACK_URL, json=payload, timeout=5)\n    return resp.json()\n";

    const FIX: &str = "--- a/backend/core/paystack.py\n+++ b/backend/core/paystack.py\n@@ -7 +7 @@\n-    resp = requests.post(PAYSTACK_URL, json=payload, timeout=5)\n+    resp = requests.post(PAYSTACK_URL, json=payload, timeout=(3, 30))\n";

    const TRACE: &str = "Traceback (most recent call last):\n  File \"backend/core/views.py\", line 88, in checkout\n    session = initialize_payment(order)\n  File \"backend/core/paystack.py\", line 7, in initialize_payment\n    resp = requests.post(PAYSTACK_URL, json=payload, timeout=5)\nrequests.exceptions.ConnectTimeout: HTTPSConnectionPool(host='api.paystack.co', port=443): Max retries exceeded";

    // ─── Scripted model ───────────────────────────────────────────────────

    #[derive(Default)]
    struct ScriptedModel {
        turns: Mutex<VecDeque<ModelTurn>>,
        requests: Mutex<Vec<ModelRequest>>,
        /// Fired after the given number of calls.
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl ScriptedModel {
        fn new(turns: Vec<ModelTurn>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReasoningModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn respond(&self, request: &ModelRequest) -> Result<ModelTurn, AgentError> {
            let calls = {
                let mut reqs = self.requests.lock().unwrap();
                reqs.push(request.clone());
                reqs.len()
            };
            if let Some((after, token)) = &self.cancel_after {
                if calls >= *after {
                    token.cancel();
                }
            }
            let next = self.turns.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| text_turn("Nothing further.")))
        }
    }

    /// Searches forever without concluding.
    struct RestlessModel;

    #[async_trait]
    impl ReasoningModel for RestlessModel {
        fn name(&self) -> &str {
            "restless"
        }

        async fn respond(&self, request: &ModelRequest) -> Result<ModelTurn, AgentError> {
            let n = request.messages.len();
            Ok(tool_turn(vec![(
                &format!("tu_{n}"),
                "search_code",
                json!({"query": format!("attempt {n}")}),
            )]))
        }
    }

    struct SlowModel;

    #[async_trait]
    impl ReasoningModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn respond(&self, _: &ModelRequest) -> Result<ModelTurn, AgentError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(text_turn("too late"))
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl ReasoningModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        async fn respond(&self, _: &ModelRequest) -> Result<ModelTurn, AgentError> {
            Err(AgentError::ModelHttp {
                status: 500,
                body: "internal error".into(),
            })
        }
    }

    fn usage() -> TokenUsage {
        TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        }
    }

    fn tool_turn(calls: Vec<(&str, &str, serde_json::Value)>) -> ModelTurn {
        ModelTurn {
            content: calls
                .into_iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: id.into(),
                    name: name.into(),
                    input,
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
            usage: usage(),
        }
    }

    fn text_turn(text: &str) -> ModelTurn {
        ModelTurn {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
            usage: usage(),
        }
    }

    fn rca_args(crash_id: &str, root_cause: &str) -> serde_json::Value {
        json!({
            "crash_id": crash_id,
            "description": "Checkout crashes when the payment gateway responds slowly",
            "problem_identification": "ConnectTimeout raised from initialize_payment during checkout",
            "data_collection": "Stack trace, backend/core/paystack.py, payment integration guide",
            "root_cause_identification": root_cause,
            "solution": "Use separate connect/read timeouts of 3s and 30s",
            "supporting_documents": ["https://docs.example.com/payments#timeouts"]
        })
    }

    fn payment_script(crash_id: &str) -> Vec<ModelTurn> {
        vec![
            tool_turn(vec![
                (
                    "tu_1",
                    "search_code",
                    json!({"query": "initialize_payment paystack requests.post timeout", "top_k": 5}),
                ),
                (
                    "tu_2",
                    "search_documents",
                    json!({"query": "payment gateway timeout policy"}),
                ),
            ]),
            tool_turn(vec![(
                "tu_3",
                "fetch_file",
                json!({"path": "backend/core/paystack.py"}),
            )]),
            tool_turn(vec![(
                "tu_4",
                "save_rca",
                rca_args(crash_id, "The gateway call uses a 5 second total timeout, shorter than the gateway's documented latency"),
            )]),
            tool_turn(vec![(
                "tu_5",
                "save_diff",
                json!({"crash_id": crash_id, "diff": FIX}),
            )]),
            text_turn("Saved the RCA and a fix raising the gateway timeout."),
        ]
    }

    fn payment_toolbox(store: RcaStore) -> Arc<Toolbox> {
        let code = StubCodeIndex {
            chunks: vec![chunk("backend/core/paystack.py", "initialize_payment", 5)],
            ..Default::default()
        };
        let docs = StubDocuments {
            hits: vec![DocumentHit {
                reference: "https://docs.example.com/payments#timeouts".into(),
                text: Some("Gateway initialization can take up to 20 seconds.".into()),
                score: Some(0.77),
            }],
        };
        let mut files = StubFiles::default();
        files
            .files
            .insert("backend/core/paystack.py".into(), PAYSTACK_PY.into());
        Arc::new(Toolbox::new(backends(code, docs, files, store)))
    }

    fn empty_toolbox(store: RcaStore) -> Arc<Toolbox> {
        Arc::new(Toolbox::new(backends(
            StubCodeIndex::default(),
            StubDocuments::default(),
            StubFiles::default(),
            store,
        )))
    }

    fn seed(crash_id: &str) -> InvestigationSeed {
        InvestigationSeed::new(
            TRACE,
            crash_id,
            "R1",
            Some("https://github.com/acme/shop".into()),
        )
    }

    // ─── Scenarios ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn payment_gateway_timeout_is_diagnosed_and_fixed() {
        let store = RcaStore::open_in_memory().unwrap();
        let model = Arc::new(ScriptedModel::new(payment_script("C1")));
        let investigator = Investigator::new(
            model.clone(),
            payment_toolbox(store.clone()),
            InvestigationConfig::default(),
        );

        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, InvestigationStatus::Completed);
        assert_eq!(report.turns, 5);
        assert_eq!(report.tool_calls, 5);
        assert!(report.rca_saved);
        assert!(report.diff_saved);
        assert!(report.can_create_pr);
        assert_eq!(report.usage.input_tokens, 500);
        assert_eq!(
            report.final_text.as_deref(),
            Some("Saved the RCA and a fix raising the gateway timeout.")
        );

        let rca = store.get_rca("C1").unwrap().unwrap();
        assert!(rca.is_populated());
        let diff = rca.git_diff.unwrap();
        assert!(diff.starts_with("--- ") || diff.starts_with("diff --git"));
    }

    #[tokio::test]
    async fn seed_and_tool_results_reach_the_model_in_order() {
        let store = RcaStore::open_in_memory().unwrap();
        let model = Arc::new(ScriptedModel::new(payment_script("C1")));
        let investigator = Investigator::new(
            model.clone(),
            payment_toolbox(store),
            InvestigationConfig::default(),
        );
        investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[0].tools.len(), 5);
        assert!(requests[0].system.contains("root cause"));

        let first = &requests[0].messages[0];
        assert_eq!(first.role, Role::User);
        assert!(first.text().contains("crash id: C1"));
        assert!(first.text().contains("backend/core/paystack.py:7 in initialize_payment"));

        // Second request: seed, assistant turn, one user message with both results.
        let msgs = &requests[1].messages;
        assert_eq!(msgs.len(), 3);
        let ids: Vec<&str> = msgs[2]
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, ["tu_1", "tu_2"]);
    }

    #[tokio::test]
    async fn empty_index_and_missing_file_never_produce_a_diff() {
        let store = RcaStore::open_in_memory().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![(
                "tu_1",
                "search_code",
                json!({"query": "initialize_payment"}),
            )]),
            tool_turn(vec![(
                "tu_2",
                "fetch_file",
                json!({"path": "backend/core/paystack.py"}),
            )]),
            tool_turn(vec![(
                "tu_3",
                "save_diff",
                json!({"crash_id": "C1", "diff": FIX}),
            )]),
            tool_turn(vec![(
                "tu_4",
                "save_rca",
                rca_args("C1", "Low confidence: likely a gateway timeout, but no code could be retrieved"),
            )]),
            text_turn("Saved a low-confidence RCA without a fix."),
        ]));
        let investigator = Investigator::new(
            model.clone(),
            empty_toolbox(store.clone()),
            InvestigationConfig {
                max_turns: 10,
                ..Default::default()
            },
        );

        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.turns <= 10);
        assert!(report.rca_saved);
        assert!(!report.diff_saved);
        assert!(!report.can_create_pr);

        let rca = store.get_rca("C1").unwrap().unwrap();
        assert!(rca.git_diff.is_none());

        // The model saw the failures as tool errors.
        let last = model.requests().pop().unwrap();
        let errors: Vec<String> = last
            .messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolResult {
                    content,
                    is_error: true,
                    ..
                } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert!(errors.iter().any(|e| e == "file not found"));
        assert!(errors.iter().any(|e| e.contains("not read in an earlier turn")));
    }

    #[tokio::test]
    async fn diff_saved_in_the_same_turn_as_its_fetch_is_rejected() {
        let store = RcaStore::open_in_memory().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![
            tool_turn(vec![
                ("tu_1", "fetch_file", json!({"path": "backend/core/paystack.py"})),
                ("tu_2", "save_diff", json!({"crash_id": "C1", "diff": FIX})),
            ]),
            tool_turn(vec![(
                "tu_3",
                "save_rca",
                rca_args("C1", "Gateway timeout too short"),
            )]),
            text_turn("done"),
        ]));
        let investigator = Investigator::new(
            model.clone(),
            payment_toolbox(store.clone()),
            InvestigationConfig::default(),
        );

        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.rca_saved);
        assert!(!report.diff_saved);
        assert!(store.get_rca("C1").unwrap().unwrap().git_diff.is_none());

        let results = &model.requests()[1].messages[2].content;
        assert!(matches!(
            &results[1],
            ContentBlock::ToolResult { tool_use_id, is_error: true, content }
                if tool_use_id == "tu_2" && content.contains("earlier turn")
        ));
    }

    #[tokio::test]
    async fn turn_budget_stops_a_model_that_never_concludes() {
        let store = RcaStore::open_in_memory().unwrap();
        let investigator = Investigator::new(
            Arc::new(RestlessModel),
            empty_toolbox(store.clone()),
            InvestigationConfig {
                max_turns: 3,
                ..Default::default()
            },
        );
        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report.status,
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::TurnBudgetExhausted
            }
        );
        assert_eq!(report.turns, 3);
        assert_eq!(report.tool_calls, 3);
        assert!(!report.rca_saved);
        assert!(store.get_rca("C1").unwrap().is_none());
    }

    #[tokio::test]
    async fn concluding_without_rca_is_incomplete() {
        let store = RcaStore::open_in_memory().unwrap();
        let investigator = Investigator::new(
            Arc::new(ScriptedModel::new(vec![text_turn("I think it is a timeout.")])),
            empty_toolbox(store),
            InvestigationConfig::default(),
        );
        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.status,
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::ConcludedWithoutRca
            }
        );
        assert_eq!(report.turns, 1);
    }

    #[tokio::test]
    async fn cancellation_between_rca_and_diff_keeps_rca_without_diff() {
        let store = RcaStore::open_in_memory().unwrap();
        let token = CancellationToken::new();
        let mut script = payment_script("C1");
        // Skip straight to save_rca on the first turn.
        script.drain(0..2);
        let model = ScriptedModel {
            cancel_after: Some((1, token.clone())),
            ..ScriptedModel::new(script)
        };
        let investigator = Investigator::new(
            Arc::new(model),
            payment_toolbox(store.clone()),
            InvestigationConfig::default(),
        );

        let report = investigator.investigate(&seed("C1"), token).await.unwrap();

        assert_eq!(report.status, InvestigationStatus::Cancelled);
        assert_eq!(report.turns, 1);
        assert!(report.rca_saved);
        assert!(!report.diff_saved);
        let rca = store.get_rca("C1").unwrap().unwrap();
        assert!(rca.is_populated());
        assert!(rca.git_diff.is_none());
        assert!(!rca.can_create_pr());
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_model_call() {
        let model = Arc::new(ScriptedModel::new(payment_script("C1")));
        let investigator = Investigator::new(
            model.clone(),
            payment_toolbox(RcaStore::open_in_memory().unwrap()),
            InvestigationConfig::default(),
        );
        let token = CancellationToken::new();
        token.cancel();
        let report = investigator.investigate(&seed("C1"), token).await.unwrap();
        assert_eq!(report.status, InvestigationStatus::Cancelled);
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn slow_model_hits_the_deadline() {
        let investigator = Investigator::new(
            Arc::new(SlowModel),
            empty_toolbox(RcaStore::open_in_memory().unwrap()),
            InvestigationConfig {
                timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            report.status,
            InvestigationStatus::Incomplete {
                reason: IncompleteReason::TimedOut
            }
        );
        assert_eq!(report.turns, 0);
    }

    #[tokio::test]
    async fn model_failure_fails_the_investigation() {
        let store = RcaStore::open_in_memory().unwrap();
        let investigator = Investigator::new(
            Arc::new(BrokenModel),
            empty_toolbox(store.clone()),
            InvestigationConfig::default(),
        );
        let err = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelHttp { status: 500, .. }));
        assert!(store.get_rca("C1").unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_tool_does_not_stop_the_loop() {
        let store = RcaStore::open_in_memory().unwrap();
        let investigator = Investigator::new(
            Arc::new(ScriptedModel::new(vec![
                tool_turn(vec![("tu_1", "get_document_images", json!({}))]),
                tool_turn(vec![(
                    "tu_2",
                    "save_rca",
                    rca_args("C1", "Gateway timeout too short"),
                )]),
                text_turn("done"),
            ])),
            empty_toolbox(store.clone()),
            InvestigationConfig::default(),
        );
        let report = investigator
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.status, InvestigationStatus::Completed);
        assert_eq!(report.turns, 3);
    }

    #[tokio::test]
    async fn rerunning_a_crash_updates_the_same_rca() {
        let store = RcaStore::open_in_memory().unwrap();
        let toolbox = payment_toolbox(store.clone());

        let first = Investigator::new(
            Arc::new(ScriptedModel::new(payment_script("C1"))),
            toolbox.clone(),
            InvestigationConfig::default(),
        );
        first
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();
        let before = store.get_rca("C1").unwrap().unwrap();

        let second = Investigator::new(
            Arc::new(ScriptedModel::new(payment_script("C1"))),
            toolbox,
            InvestigationConfig::default(),
        );
        second
            .investigate(&seed("C1"), CancellationToken::new())
            .await
            .unwrap();

        let rcas = store.list_rcas().unwrap();
        assert_eq!(rcas.len(), 1);
        assert_eq!(rcas[0].id, before.id);
        assert!(rcas[0].updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn concurrent_investigations_share_one_store() {
        let store = RcaStore::open_in_memory().unwrap();
        let toolbox = payment_toolbox(store.clone());
        let a = Investigator::new(
            Arc::new(ScriptedModel::new(payment_script("C1"))),
            toolbox.clone(),
            InvestigationConfig::default(),
        );
        let b = Investigator::new(
            Arc::new(ScriptedModel::new(payment_script("C2"))),
            toolbox,
            InvestigationConfig::default(),
        );

        let (seed_a, seed_b) = (seed("C1"), seed("C2"));
        let (ra, rb) = tokio::join!(
            a.investigate(&seed_a, CancellationToken::new()),
            b.investigate(&seed_b, CancellationToken::new())
        );
        assert_eq!(ra.unwrap().status, InvestigationStatus::Completed);
        assert_eq!(rb.unwrap().status, InvestigationStatus::Completed);
        assert_eq!(store.list_rcas().unwrap().len(), 2);
    }
}
