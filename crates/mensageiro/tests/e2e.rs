// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Mensageiro pipeline.
//!
//! Each test builds an isolated TestHarness: the real dispatcher, breaker,
//! queues and recovery coordinator over a mock platform and a mock AI backend.

use std::time::Duration;

use mensageiro_agent::replies;
use mensageiro_agent::{DispatcherConfig, RecoveryOutcome};
use mensageiro_core::{
    ChatInfo, EventKind, InboundEvent, MessageKind, QuotedMessage, RecoveryData, Transaction,
    TransactionStatus,
};
use mensageiro_resilience::CircuitState;
use mensageiro_test_utils::{
    MockOutcome, TestHarness, group_event, media_event, media_payload, text_event,
};

const USER: &str = "5511999990000@c.us";
const GROUP: &str = "120363000000@g.us";
const BOT: &str = "5511888880000@c.us";
const MB: usize = 1024 * 1024;

// ---- Text pipeline ----

#[tokio::test]
async fn text_message_is_answered_and_delivered() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Estou bem, obrigado!".into()])
        .build()
        .await
        .unwrap();

    assert!(harness.send_event(text_event("m1", USER, "Olá, como você está?")).await);
    assert_eq!(harness.ai.text_calls(), 1);

    let sent = harness.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target, USER);
    assert_eq!(sent[0].text, "Estou bem, obrigado!");
    assert_eq!(sent[0].options.reply_to.as_deref(), Some("m1"));
    assert!(!sent[0].options.is_recovered_message);

    let id = sent[0].transaction_id.clone().unwrap();
    let ledger = harness.memory_ledger.as_ref().unwrap();
    let delivered = ledger.delivered(&id).await.unwrap();
    let mut path: Vec<TransactionStatus> = delivered.history.iter().map(|h| h.status).collect();
    path.dedup();
    assert_eq!(
        path,
        vec![
            TransactionStatus::Created,
            TransactionStatus::Processing,
            TransactionStatus::ResponseReady,
            TransactionStatus::Delivered,
        ]
    );
    assert!(harness.transactions.list_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn quoted_text_and_active_prompt_reach_the_backend() {
    let harness = TestHarness::builder().build().await.unwrap();

    harness
        .send_event(text_event("c1", USER, ".prompt set pirata Fale como um pirata."))
        .await;
    harness.send_event(text_event("c2", USER, ".prompt usar pirata")).await;

    let mut event = text_event("m1", USER, "e isso?");
    event.has_quoted_msg = true;
    harness
        .platform
        .set_quoted(
            "m1",
            QuotedMessage {
                id: "q1".into(),
                from_me: false,
                author: None,
                body: Some("O navio chegou".into()),
            },
        )
        .await;
    assert!(harness.send_event(event).await);

    let requests = harness.ai.text_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system_prompt.as_deref(), Some("Fale como um pirata."));
    assert_eq!(requests[0].quoted_text.as_deref(), Some("O navio chegou"));
}

// ---- Deduplication ----

#[tokio::test]
async fn concurrent_duplicates_create_one_transaction() {
    let harness = TestHarness::builder()
        .with_ai_delay(Duration::from_millis(50))
        .build()
        .await
        .unwrap();

    let event = text_event("dup", USER, "oi");
    let (a, b) = tokio::join!(
        harness.send_event(event.clone()),
        harness.send_event(event.clone())
    );
    assert!(a ^ b, "exactly one of the two calls is processed");
    assert!(!harness.send_event(event).await);

    assert_eq!(harness.ai.text_calls(), 1);
    let ledger = harness.memory_ledger.as_ref().unwrap();
    assert_eq!(ledger.total_count().await, 1);
}

// ---- Circuit breaker ----

#[tokio::test(start_paused = true)]
async fn breaker_short_circuits_until_the_window_elapses() {
    let harness = TestHarness::builder()
        .with_breaker(3, Duration::from_secs(60))
        .build()
        .await
        .unwrap();
    for _ in 0..3 {
        harness.ai.push_failure("503 overloaded").await;
    }

    for i in 0..3 {
        assert!(!harness.send_event(text_event(&format!("f{i}"), USER, "oi")).await);
    }
    assert_eq!(harness.breaker.state(), CircuitState::Open);

    assert!(!harness.send_event(text_event("blocked", USER, "oi")).await);
    assert_eq!(harness.ai.text_calls(), 3);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(harness.send_event(text_event("probe", USER, "oi")).await);
    assert_eq!(harness.breaker.state(), CircuitState::Closed);
    assert_eq!(harness.breaker.failure_count(), 0);

    let texts = harness.platform.texts_to(USER).await;
    assert_eq!(texts.iter().filter(|t| *t == replies::GENERIC_ERROR).count(), 4);
}

// ---- Media ----

#[tokio::test]
async fn oversized_media_is_refused_with_the_limit_in_megabytes() {
    let harness = TestHarness::builder()
        .with_async_images()
        .build()
        .await
        .unwrap();

    let event = media_event("big", USER, EventKind::Image, "");
    assert!(!harness.send_media(event, media_payload(21 * MB, "image/jpeg")).await);

    assert_eq!(harness.ai.image_calls(), 0);
    let status = harness.queues[0].status().await.unwrap();
    assert_eq!(status.waiting + status.active + status.completed + status.failed, 0);

    let texts = harness.platform.texts_to(USER).await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("20MB"));
}

#[tokio::test]
async fn queued_image_is_answered_through_the_result_handler() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Um gato no sofá.".into()])
        .with_async_images()
        .build()
        .await
        .unwrap();

    let event = media_event("img", USER, EventKind::Image, "o que é isso?");
    assert!(harness.send_media(event, media_payload(1024, "image/jpeg")).await);

    let sent = harness.wait_for_sent(1, Duration::from_secs(5)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "Um gato no sofá.");
    assert_eq!(sent[0].options.reply_to.as_deref(), Some("img"));
    assert_eq!(harness.ai.image_calls(), 1);
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn safety_blocked_queued_image_gets_the_safety_reply() {
    let harness = TestHarness::builder()
        .with_async_images()
        .with_breaker(1, Duration::from_secs(60))
        .build()
        .await
        .unwrap();
    harness.ai.push(MockOutcome::SafetyBlock).await;

    let event = media_event("img", USER, EventKind::Image, "");
    assert!(harness.send_media(event, media_payload(1024, "image/png")).await);

    let sent = harness.wait_for_sent(1, Duration::from_secs(5)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::SAFETY_BLOCKED);
    assert_eq!(harness.breaker.state(), CircuitState::Closed);
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn queued_image_failure_gets_the_generic_reply_and_feeds_the_breaker() {
    let harness = TestHarness::builder()
        .with_async_images()
        .with_breaker(1, Duration::from_secs(60))
        .build()
        .await
        .unwrap();
    harness.ai.push_failure("backend exploded").await;

    let event = media_event("img", USER, EventKind::Image, "");
    assert!(harness.send_media(event, media_payload(1024, "image/jpeg")).await);

    let sent = harness.wait_for_sent(1, Duration::from_secs(5)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::GENERIC_ERROR);
    assert_eq!(harness.breaker.state(), CircuitState::Open);

    let active = harness.transactions.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, TransactionStatus::TempFailure);
    assert_eq!(active[0].attempts, 1);
    assert!(active[0].last_error.as_deref().unwrap().contains("backend exploded"));
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn queued_image_timeout_follows_the_failure_path() {
    let harness = TestHarness::builder()
        .with_async_images()
        .with_ai_delay(Duration::from_secs(2))
        .with_breaker(1, Duration::from_secs(60))
        .with_dispatcher_config(DispatcherConfig {
            image_timeout: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(5),
            ..DispatcherConfig::default()
        })
        .build()
        .await
        .unwrap();

    let event = media_event("slow", USER, EventKind::Image, "");
    assert!(harness.send_media(event, media_payload(1024, "image/jpeg")).await);

    let sent = harness.wait_for_sent(1, Duration::from_secs(5)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, replies::GENERIC_ERROR);
    assert_eq!(harness.breaker.state(), CircuitState::Open);

    let active = harness.transactions.list_active().await.unwrap();
    assert_eq!(active[0].status, TransactionStatus::TempFailure);
    assert!(active[0].last_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn full_queue_rejects_with_the_generic_reply() {
    let harness = TestHarness::builder()
        .with_async_images()
        .with_queue(1, 1)
        .with_ai_delay(Duration::from_secs(30))
        .build()
        .await
        .unwrap();

    // The first job occupies the only worker, the second fills the channel.
    let first = media_event("a", USER, EventKind::Image, "");
    assert!(harness.send_media(first, media_payload(512, "image/jpeg")).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = media_event("b", USER, EventKind::Image, "");
    assert!(harness.send_media(second, media_payload(512, "image/jpeg")).await);

    let third = media_event("c", USER, EventKind::Image, "");
    assert!(!harness.send_media(third, media_payload(512, "image/jpeg")).await);

    let texts = harness.platform.texts_to(USER).await;
    assert_eq!(texts, vec![replies::GENERIC_ERROR.to_string()]);
    assert_eq!(harness.sent().await[0].options.reply_to.as_deref(), Some("c"));

    let active = harness.transactions.list_active().await.unwrap();
    let rejected: Vec<&Transaction> = active.iter().filter(|t| t.message_id == "c").collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].status, TransactionStatus::TempFailure);
    assert_eq!(rejected[0].attempts, 1);
    assert_eq!(harness.breaker.failure_count(), 0);
}

#[tokio::test]
async fn queued_video_is_answered_through_the_result_handler() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Uma praia ao pôr do sol.".into()])
        .with_async_videos()
        .build()
        .await
        .unwrap();

    let event = media_event("vid", USER, EventKind::Video, "");
    assert!(harness.send_media(event, media_payload(4096, "video/mp4")).await);

    let sent = harness.wait_for_sent(1, Duration::from_secs(5)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "Uma praia ao pôr do sol.");
    assert_eq!(harness.ai.video_calls(), 1);
    assert_eq!(harness.ai.image_calls(), 0);
    assert!(harness.transactions.list_active().await.unwrap().is_empty());
    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn video_without_a_queue_is_answered_inline() {
    let harness = TestHarness::builder()
        .with_replies(vec!["Um vídeo curto.".into()])
        .build()
        .await
        .unwrap();

    let event = media_event("vid", USER, EventKind::Video, "");
    assert!(harness.send_media(event, media_payload(4096, "video/mp4")).await);
    assert_eq!(harness.ai.video_calls(), 1);
    assert_eq!(harness.platform.texts_to(USER).await, vec!["Um vídeo curto.".to_string()]);
}

#[tokio::test]
async fn disabled_media_kind_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    assert!(harness.send_event(text_event("c1", USER, ".audio")).await);
    harness.platform.clear_sent().await;

    let event = media_event("ptt", USER, EventKind::Ptt, "");
    assert!(!harness.send_media(event, media_payload(512, "audio/ogg")).await);
    assert_eq!(harness.ai.audio_calls(), 0);
    assert!(harness.sent().await.is_empty());
}

#[tokio::test]
async fn long_mode_reaches_media_calls() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.send_event(text_event("c1", USER, ".longo")).await;

    let event = media_event("img", USER, EventKind::Image, "");
    assert!(harness.send_media(event, media_payload(512, "image/jpeg")).await);
    let configs = harness.ai.media_configs().await;
    assert_eq!(configs[0].description_mode.to_string(), "long");
}

// ---- Groups ----

#[tokio::test]
async fn group_message_without_address_is_ignored() {
    let harness = TestHarness::builder().with_bot_id(BOT).build().await.unwrap();

    assert!(!harness.send_event(group_event("g1", GROUP, USER, "bom dia a todos")).await);
    assert_eq!(harness.ai.total_calls(), 0);
    assert!(harness.sent().await.is_empty());
}

#[tokio::test]
async fn group_reply_to_the_bot_is_answered() {
    let harness = TestHarness::builder().with_bot_id(BOT).build().await.unwrap();

    let mut event = group_event("g1", GROUP, USER, "e agora?");
    event.has_quoted_msg = true;
    harness
        .platform
        .set_quoted(
            "g1",
            QuotedMessage {
                id: "bot-1".into(),
                from_me: true,
                author: Some(BOT.into()),
                body: Some("resposta anterior".into()),
            },
        )
        .await;
    assert!(harness.send_event(event).await);
    assert_eq!(harness.ai.text_calls(), 1);
    assert_eq!(harness.sent().await[0].target, GROUP);
}

#[tokio::test]
async fn group_command_is_answered_without_mention() {
    let harness = TestHarness::builder().with_bot_id(BOT).build().await.unwrap();

    assert!(harness.send_event(group_event("g1", GROUP, USER, ".ajuda")).await);
    assert_eq!(harness.ai.total_calls(), 0);
    let texts = harness.platform.texts_to(GROUP).await;
    assert!(texts[0].contains(".prompt usar <nome>"));
}

#[tokio::test]
async fn system_notifications_are_never_answered() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut event = text_event("n1", USER, "");
    event.kind = EventKind::E2eNotification;
    assert!(!harness.send_event(event).await);
    assert!(harness.sent().await.is_empty());
}

// ---- Recovery ----

fn stranded(id: &str, with_recovery: bool) -> Transaction {
    let event = InboundEvent {
        id: id.into(),
        from: USER.into(),
        author: None,
        body: "oi".into(),
        has_media: false,
        kind: EventKind::Chat,
        has_quoted_msg: false,
        timestamp: 0,
    };
    let chat = ChatInfo {
        id: USER.into(),
        name: None,
        is_group: false,
    };
    let mut tx = Transaction::new(&event, &chat, MessageKind::Text);
    tx.status = TransactionStatus::Processing;
    tx.response = Some("Resposta que ficou para trás".into());
    if with_recovery {
        tx.recovery_data = Some(RecoveryData {
            recipient_id: USER.into(),
            chat_id: USER.into(),
        });
    }
    tx
}

#[tokio::test]
async fn recovery_delivers_to_the_recorded_recipient() {
    let harness = TestHarness::builder().build().await.unwrap();
    let ledger = harness.memory_ledger.clone().unwrap();
    let good = stranded("m1", true);
    let orphan = stranded("m2", false);
    let (good_id, orphan_id) = (good.id.clone(), orphan.id.clone());
    ledger.insert_raw(good).await;
    ledger.insert_raw(orphan).await;

    let report = harness.recovery.recover_pending().await.unwrap();
    assert_eq!(report.delivered, 1);

    let sent = harness.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target, USER);
    assert_eq!(sent[0].transaction_id.as_deref(), Some(good_id.as_str()));
    assert!(sent[0].options.is_recovered_message);
    assert!(ledger.delivered(&good_id).await.is_some());

    let orphan = harness.transactions.get(&orphan_id).await.unwrap().unwrap();
    assert_eq!(orphan.status, TransactionStatus::Processing);
}

#[tokio::test]
async fn three_delivery_failures_become_permanent() {
    let harness = TestHarness::builder().with_max_attempts(3).build().await.unwrap();
    harness.platform.fail_sends(true);

    assert!(!harness.send_event(text_event("m1", USER, "oi")).await);
    let id = harness.transactions.list_active().await.unwrap()[0].id.clone();

    assert_eq!(
        harness.recovery.recover_transaction(&id).await.unwrap(),
        RecoveryOutcome::Failed
    );
    assert_eq!(
        harness.recovery.recover_transaction(&id).await.unwrap(),
        RecoveryOutcome::Abandoned
    );
    assert_eq!(
        harness.recovery.recover_transaction(&id).await.unwrap(),
        RecoveryOutcome::Skipped
    );
    assert_eq!(harness.recovery.recover_pending().await.unwrap().attempted, 0);

    assert_eq!(harness.platform.send_attempts(), 3);
    let tx = harness.transactions.get(&id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::PermanentFailure);
    assert_eq!(tx.attempts, 3);
}

#[tokio::test]
async fn failed_delivery_is_recovered_after_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mensageiro.db");

    let first = TestHarness::builder()
        .with_sqlite_at(&path)
        .with_replies(vec!["Resposta durável".into()])
        .build()
        .await
        .unwrap();
    first.platform.fail_sends(true);
    assert!(!first.send_event(text_event("m1", USER, "oi")).await);
    first.shutdown().await.unwrap();

    let second = TestHarness::builder().with_sqlite_at(&path).build().await.unwrap();
    let report = second.recovery.recover_pending().await.unwrap();
    assert_eq!(report.delivered, 1);

    let sent = second.sent().await;
    assert_eq!(sent[0].text, "Resposta durável");
    assert!(sent[0].options.is_recovered_message);
    assert!(second.transactions.list_active().await.unwrap().is_empty());
    second.shutdown().await.unwrap();
}

#[tokio::test]
async fn dispatcher_run_drains_platform_events() {
    let harness = TestHarness::builder()
        .with_dispatcher_config(DispatcherConfig {
            drain_timeout: Duration::from_secs(2),
            ..DispatcherConfig::default()
        })
        .build()
        .await
        .unwrap();

    for i in 0..3 {
        harness
            .platform
            .push_event(text_event(&format!("m{i}"), USER, "oi"))
            .await;
    }
    harness.platform.close().await;

    let dispatcher = harness.dispatcher.clone();
    dispatcher.run(harness.cancel.clone()).await;
    assert_eq!(harness.sent().await.len(), 3);
}
