//! Property tests: arbitrary operation sequences against arbitrary server
//! behaviour never break the session invariants.

mod common;

use common::*;
use idv_client::StatusSnapshot;
use idv_core::DocumentType;
use idv_flow::{StepId, WorkflowConfig, WorkflowController};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::json;

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Front,
    Back,
    Token,
    Selfie,
    Retry,
    Teardown,
    Restart,
}

#[derive(Debug, Clone)]
enum Reply {
    Processing,
    Ocr,
    Barcode,
    Score(f64),
    Verified,
    Failed,
    ManualReview,
    CompletedWithScores,
    Unavailable,
}

impl Reply {
    fn into_entry(self) -> Result<StatusSnapshot, u16> {
        let value = match self {
            Self::Processing => json!({"status": "processing"}),
            Self::Ocr => json!({"status": "processing", "ocr_data": {"name": "John Doe"}}),
            Self::Barcode => json!({"status": "processing", "barcode_data": {"dl": "D1"}}),
            Self::Score(score) => json!({"status": "processing", "cross_validation_score": score}),
            Self::Verified => {
                json!({"status": "verified", "face_match_score": 0.9, "liveness_score": 0.9})
            }
            Self::Failed => json!({"status": "failed", "failure_reason": "mismatch"}),
            Self::ManualReview => json!({"status": "manual_review"}),
            Self::CompletedWithScores => {
                json!({"status": "completed", "face_match_score": 0.8, "liveness_score": 0.7})
            }
            Self::Unavailable => return Err(503),
        };
        Ok(snapshot(value))
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Start),
        3 => Just(Op::Front),
        3 => Just(Op::Back),
        1 => Just(Op::Token),
        3 => Just(Op::Selfie),
        1 => Just(Op::Retry),
        1 => Just(Op::Teardown),
        1 => Just(Op::Restart),
    ]
}

fn reply_strategy() -> impl Strategy<Value = Reply> {
    prop_oneof![
        3 => Just(Reply::Processing),
        3 => Just(Reply::Ocr),
        2 => Just(Reply::Barcode),
        3 => (0.0f64..1.0).prop_map(Reply::Score),
        1 => Just(Reply::Verified),
        1 => Just(Reply::Failed),
        1 => Just(Reply::ManualReview),
        1 => Just(Reply::CompletedWithScores),
        1 => Just(Reply::Unavailable),
    ]
}

async fn apply(wf: &mut WorkflowController, op: Op) {
    // Failures are expected; only the resulting state is checked.
    let _ = match op {
        Op::Start => wf.start_verification().await.map(|_| ()),
        Op::Front => {
            wf.upload_front_document(jpeg("front.jpg"), DocumentType::DriversLicense)
                .await
        }
        Op::Back => {
            wf.upload_back_document(jpeg("back.jpg"), DocumentType::DriversLicense)
                .await
        }
        Op::Token => wf.prepare_live_capture(None).await.map(|_| ()),
        Op::Selfie => wf.capture_live_selfie(SELFIE_B64).await,
        Op::Retry => wf.retry_status_check().await,
        Op::Teardown => {
            wf.teardown();
            Ok(())
        }
        Op::Restart => {
            wf.restart();
            Ok(())
        }
    };
}

fn run(
    config: WorkflowConfig,
    plan: Vec<(Op, Vec<Reply>)>,
) -> Result<(), TestCaseError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    rt.block_on(async move {
        let client = ScriptedClient::new();
        let mut wf = controller(&client, config);
        let mut previous = wf.state().current_step;
        let mut verdict = None;

        for (op, replies) in plan {
            client.script(replies.into_iter().map(Reply::into_entry));
            apply(&mut wf, op).await;
            let state = wf.state();

            if matches!(op, Op::Restart) {
                prop_assert_eq!(state.current_step, StepId::Welcome);
                verdict = None;
            } else {
                prop_assert!(
                    state.current_step >= previous,
                    "{:?} moved step back from {} to {}",
                    op,
                    previous,
                    state.current_step
                );
                if verdict.is_some() {
                    prop_assert_eq!(state.cross_validation.passed, verdict);
                }
            }
            verdict = verdict.or(state.cross_validation.passed);

            if let Some(result) = &state.final_result {
                prop_assert!(state.status.is_terminal());
                prop_assert_eq!(state.status, result.outcome.status());
                prop_assert_eq!(state.current_step, StepId::VerificationComplete);
            }
            if !config_requires_back(&wf) {
                prop_assert!(!state.current_step.is_back_of_id());
            }
            if state.live_capture.completed {
                prop_assert!(
                    state.cross_validation.passed == Some(true)
                        || !wf.config().cross_validation_enabled()
                );
            }
            previous = state.current_step;
        }

        for record in wf.transitions() {
            if record.to != StepId::Welcome {
                prop_assert!(record.from < record.to);
            }
        }
        Ok(())
    })
}

fn config_requires_back(wf: &WorkflowController) -> bool {
    wf.config().require_back_of_id
}

fn plan_strategy() -> impl Strategy<Value = Vec<(Op, Vec<Reply>)>> {
    prop::collection::vec(
        (op_strategy(), prop::collection::vec(reply_strategy(), 1..5)),
        1..16,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_with_back_of_id(plan in plan_strategy()) {
        run(fast_config(), plan)?;
    }

    #[test]
    fn invariants_hold_without_back_of_id(plan in plan_strategy()) {
        let config = WorkflowConfig {
            require_back_of_id: false,
            ..fast_config()
        };
        run(config, plan)?;
    }
}
