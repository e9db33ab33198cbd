// End-to-end tests for the session state machine, driven through its
// event queue with the simulated recognizer and the lexicon extractor.

use std::sync::Arc;
use std::time::Duration;

use scribe_gateway::config::RecognitionConfig;
use scribe_gateway::entities::{Entity, LexiconExtractor};
use scribe_gateway::recognition::SIMULATED_PHRASES;
use scribe_gateway::session::{
    ClientCommand, ServerEvent, SessionConfig, SessionController, SessionEvent, SessionState,
    SessionStats,
};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

struct TestSession {
    task: JoinHandle<()>,
    events: mpsc::Sender<SessionEvent>,
    outbound: mpsc::Receiver<ServerEvent>,
    stats: Arc<RwLock<SessionStats>>,
}

fn start_session() -> TestSession {
    let config = SessionConfig {
        session_id: "session-test".to_string(),
        default_language: "en-US".to_string(),
        stop_settle: Duration::from_millis(50),
    };
    let recognition = RecognitionConfig::default();
    let stats = Arc::new(RwLock::new(SessionStats::new("session-test")));
    let (outbound_tx, outbound) = mpsc::channel(64);

    let (controller, events) = SessionController::new(
        config,
        recognition,
        Arc::new(LexiconExtractor),
        outbound_tx,
        Arc::clone(&stats),
    );
    let task = tokio::spawn(controller.run());

    TestSession {
        task,
        events,
        outbound,
        stats,
    }
}

impl TestSession {
    async fn send(&self, event: SessionEvent) {
        self.events.send(event).await.expect("session queue closed");
    }

    async fn next_event(&mut self) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(5), self.outbound.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("outbound channel closed")
    }

    /// Next event that is not a transcription push
    async fn next_control_event(&mut self) -> ServerEvent {
        loop {
            let event = self.next_event().await;
            if !matches!(event, ServerEvent::Transcription { .. }) {
                return event;
            }
        }
    }

    async fn next_entities(&mut self) -> (String, Vec<Entity>, usize) {
        loop {
            match self.next_event().await {
                ServerEvent::Entities {
                    confirmed_text,
                    entities,
                    new_text_start_index,
                } => return (confirmed_text, entities, new_text_start_index),
                ServerEvent::Transcription { .. } => continue,
                other => panic!("expected entities event, got {:?}", other),
            }
        }
    }

    async fn ready(&mut self) {
        self.send(SessionEvent::Command(ClientCommand::Ready { language: None }))
            .await;
        match self.next_control_event().await {
            ServerEvent::Ready { status, .. } => assert_eq!(status, "success"),
            other => panic!("expected ready ack, got {:?}", other),
        }
    }

    async fn finish(self) {
        let _ = self.events.send(SessionEvent::Disconnected).await;
        self.task.await.expect("session task must not panic");
    }
}

fn audio() -> SessionEvent {
    SessionEvent::Audio(vec![0u8; 320])
}

#[tokio::test]
async fn test_ready_without_backend_acks_simulation() {
    let mut session = start_session();

    session
        .send(SessionEvent::Command(ClientCommand::Ready {
            language: Some("en-US".to_string()),
        }))
        .await;

    match session.next_control_event().await {
        ServerEvent::Ready { status, simulation } => {
            assert_eq!(status, "success");
            assert!(simulation, "no backend configured, must report simulation");
        }
        other => panic!("expected ready ack, got {:?}", other),
    }

    session.finish().await;
}

#[tokio::test]
async fn test_audio_before_ready_reports_error_and_session_survives() {
    let mut session = start_session();

    session.send(audio()).await;

    match session.next_control_event().await {
        ServerEvent::Error { message } => assert!(message.contains("no active recognition stream")),
        other => panic!("expected error event, got {:?}", other),
    }

    // The session is still usable afterwards
    session.ready().await;

    session.finish().await;
}

#[tokio::test]
async fn test_audio_drives_transcription_and_entities() {
    let mut session = start_session();
    session.ready().await;

    session.send(audio()).await;

    // Interim first, then the final
    match session.next_event().await {
        ServerEvent::Transcription { results } => {
            assert_eq!(results.len(), 1);
            assert!(!results[0].is_final);
            assert!(!results[0].alternatives[0].transcript.is_empty());
        }
        other => panic!("expected interim transcription, got {:?}", other),
    }
    match session.next_event().await {
        ServerEvent::Transcription { results } => {
            assert!(results[0].is_final);
            assert_eq!(results[0].alternatives[0].transcript, SIMULATED_PHRASES[0]);
        }
        other => panic!("expected final transcription, got {:?}", other),
    }

    let (confirmed, entities, new_text_start) = session.next_entities().await;
    assert_eq!(confirmed, SIMULATED_PHRASES[0]);
    assert_eq!(new_text_start, 0);
    assert!(!entities.is_empty());
    for entity in &entities {
        assert!(entity.start_index < entity.end_index);
        assert!(entity.end_index <= confirmed.len());
        assert_eq!(&confirmed[entity.start_index..entity.end_index], entity.text);
    }

    session.finish().await;
}

#[tokio::test]
async fn test_consecutive_finals_extend_confirmed_text() {
    let mut session = start_session();
    session.ready().await;

    session.send(audio()).await;
    session.send(audio()).await;

    let (first_confirmed, _, first_offset) = session.next_entities().await;
    let (second_confirmed, entities, second_offset) = session.next_entities().await;

    assert_eq!(first_confirmed, SIMULATED_PHRASES[0]);
    assert_eq!(
        second_confirmed,
        format!("{} {}", SIMULATED_PHRASES[0], SIMULATED_PHRASES[1])
    );
    assert!(
        second_confirmed.starts_with(&first_confirmed),
        "confirmed text must only ever be extended"
    );

    // Extraction chunks cover disjoint, monotonically advancing ranges
    assert_eq!(first_offset, 0);
    assert_eq!(second_offset, SIMULATED_PHRASES[0].len());
    assert!(second_offset >= first_offset);

    // Entity indices stay valid in the grown document
    for entity in &entities {
        assert_eq!(
            &second_confirmed[entity.start_index..entity.end_index],
            entity.text
        );
    }

    session.finish().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut session = start_session();
    session.ready().await;

    session.send(SessionEvent::Command(ClientCommand::Stop)).await;
    match session.next_control_event().await {
        ServerEvent::Stopped { .. } => {}
        other => panic!("expected stopped ack, got {:?}", other),
    }

    session.send(SessionEvent::Command(ClientCommand::Stop)).await;
    match session.next_control_event().await {
        ServerEvent::Stopped { .. } => {}
        other => panic!("expected second stopped ack, got {:?}", other),
    }

    assert_eq!(session.stats.read().await.state, SessionState::Closed);

    session.finish().await;
}

#[tokio::test]
async fn test_audio_while_stopping_reports_error() {
    let mut session = start_session();
    session.ready().await;

    session.send(SessionEvent::Command(ClientCommand::Stop)).await;
    session.send(audio()).await;

    match session.next_control_event().await {
        ServerEvent::Error { message } => assert!(message.contains("no active recognition stream")),
        other => panic!("expected error event, got {:?}", other),
    }
    match session.next_control_event().await {
        ServerEvent::Stopped { .. } => {}
        other => panic!("expected stopped ack, got {:?}", other),
    }

    session.finish().await;
}

#[tokio::test]
async fn test_ready_after_stop_continues_transcript() {
    let mut session = start_session();
    session.ready().await;

    session.send(audio()).await;
    let (first_confirmed, _, _) = session.next_entities().await;
    assert_eq!(first_confirmed, SIMULATED_PHRASES[0]);

    session.send(SessionEvent::Command(ClientCommand::Stop)).await;
    match session.next_control_event().await {
        ServerEvent::Stopped { .. } => {}
        other => panic!("expected stopped ack, got {:?}", other),
    }

    // A fresh stream continues the same confirmed text
    session.ready().await;
    session.send(audio()).await;

    let (second_confirmed, _, second_offset) = session.next_entities().await;
    assert!(second_confirmed.starts_with(&first_confirmed));
    assert_eq!(
        second_confirmed,
        format!("{} {}", SIMULATED_PHRASES[0], SIMULATED_PHRASES[0])
    );
    assert_eq!(second_offset, first_confirmed.len());

    session.finish().await;
}

#[tokio::test]
async fn test_start_new_discards_transcript_and_entities() {
    let mut session = start_session();
    session.ready().await;

    session.send(audio()).await;
    let (first_confirmed, _, _) = session.next_entities().await;
    assert_eq!(first_confirmed, SIMULATED_PHRASES[0]);

    session
        .send(SessionEvent::Command(ClientCommand::StartNew))
        .await;
    session.send(audio()).await;

    let (confirmed, entities, new_text_start) = session.next_entities().await;
    assert_eq!(confirmed, SIMULATED_PHRASES[1], "transcript restarts from empty");
    assert_eq!(new_text_start, 0);
    for entity in &entities {
        assert!(entity.end_index <= confirmed.len());
    }

    session.finish().await;
}

#[tokio::test]
async fn test_disconnect_with_extraction_in_flight_is_safe() {
    let mut session = start_session();
    session.ready().await;

    // Disconnect before the simulated results (and thus the extraction)
    // have resolved
    session.send(audio()).await;
    session.finish().await;
}

#[tokio::test]
async fn test_stats_reflect_session_progress() {
    let mut session = start_session();
    session.ready().await;

    session.send(audio()).await;
    let (confirmed, entities, _) = session.next_entities().await;

    let stats = session.stats.read().await.clone();
    assert_eq!(stats.state, SessionState::Streaming);
    assert!(stats.simulation);
    assert_eq!(stats.confirmed_len, confirmed.len());
    assert_eq!(stats.entity_count, entities.len());
    assert_eq!(stats.chunks_submitted, 1);

    session.finish().await;
}
