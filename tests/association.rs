use bytes::Bytes;
use dicom::dictionary_std::uids;
use oxidul::message::{echo_request, echo_response, status, store_request, write_command};
use oxidul::pdu::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationRJ, AssociationRJResult,
    AssociationRJServiceProviderASCEReason, AssociationRJSource, PDataValue, PDataValueType, Pdu,
};
use oxidul::{
    negotiate, AETitle, AbortCause, AcceptorPolicy, Association, AssociationError,
    AssociationListener, AssociationOutcome, AssociationParameters, AssociationState,
    EngineConfig, Message, Outcome, ProtocolError, StatisticsRecorder, TimeoutKind,
};
use pretty_assertions::assert_eq;
use rstest::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use util::{init_logging, RawPeer, RecordingListener};

mod util;

const CT: &str = "1.2.840.10008.5.1.4.1.1.2";

#[fixture]
fn parameters() -> AssociationParameters {
    AssociationParameters::new(AETitle::from_static("SCU"), AETitle::from_static("SCP"))
}

#[fixture]
fn policy() -> AcceptorPolicy {
    AcceptorPolicy::new(AETitle::from_static("SCP"))
}

fn pair(
    parameters: AssociationParameters,
    policy: AcceptorPolicy,
    initiator_listeners: Vec<Arc<dyn AssociationListener>>,
    acceptor_listeners: Vec<Arc<dyn AssociationListener>>,
) -> (Association, Association) {
    pair_with_config(
        parameters,
        policy,
        EngineConfig::default(),
        initiator_listeners,
        acceptor_listeners,
    )
}

fn pair_with_config(
    parameters: AssociationParameters,
    policy: AcceptorPolicy,
    acceptor_config: EngineConfig,
    initiator_listeners: Vec<Arc<dyn AssociationListener>>,
    acceptor_listeners: Vec<Arc<dyn AssociationListener>>,
) -> (Association, Association) {
    init_logging();
    let (a, b) = tokio::io::duplex(64 * 1024);
    let initiator =
        Association::initiator(a, parameters, EngineConfig::default(), initiator_listeners);
    let acceptor = Association::acceptor(
        b,
        Arc::new(policy),
        acceptor_config,
        acceptor_listeners,
        None,
        None,
    );
    (initiator, acceptor)
}

/// An initiator talking to a [RawPeer] that accepts whatever it proposes.
async fn associate_with_raw_peer(
    parameters: AssociationParameters,
    policy: &AcceptorPolicy,
    config: EngineConfig,
    buffer: usize,
) -> (Association, RawPeer) {
    init_logging();
    let (a, b) = tokio::io::duplex(buffer);
    let initiator = Association::initiator(a, parameters, config, vec![]);
    let mut peer = RawPeer::new(b);
    let (requested, ()) = tokio::join!(initiator.send_associate_request(), async {
        let Some(Pdu::AssociationRQ(rq)) = peer.receive().await else {
            panic!("expected an A-ASSOCIATE-RQ")
        };
        let acceptance = negotiate(&rq, policy).unwrap();
        peer.send(&Pdu::AssociationAC(acceptance.ac)).await;
    });
    requested.unwrap();
    (initiator, peer)
}

fn provider_abort() -> Option<Pdu> {
    Some(Pdu::AbortRQ {
        source: AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::ReasonNotSpecified),
    })
}

async fn associate(initiator: &Association, acceptor: &Association) {
    let (requested, accepted) = tokio::join!(
        initiator.send_associate_request(),
        acceptor.wait_for_association()
    );
    requested.unwrap();
    accepted.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_acceptor_selects_supported_transfer_syntax(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    let id = parameters
        .add_presentation_context(
            CT,
            vec![
                uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
                uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            ],
        )
        .unwrap();
    let policy = policy.with_transfer_syntaxes([uids::IMPLICIT_VR_LITTLE_ENDIAN]);
    let (initiator, acceptor) = pair(parameters, policy, vec![], vec![]);
    let (requested, accepted) = tokio::join!(
        initiator.send_associate_request(),
        acceptor.wait_for_association()
    );
    let requested = requested.unwrap();
    let accepted = accepted.unwrap();
    assert_eq!(
        requested.accepted_transfer_syntax(id),
        Some(uids::IMPLICIT_VR_LITTLE_ENDIAN)
    );
    assert_eq!(
        accepted.accepted_transfer_syntax(id),
        Some(uids::IMPLICIT_VR_LITTLE_ENDIAN)
    );
    assert_eq!(accepted.calling_ae_title.as_str(), "SCU");
    assert_eq!(initiator.state(), AssociationState::Associated);
    assert_eq!(acceptor.state(), AssociationState::Associated);
}

#[rstest]
#[tokio::test]
async fn test_nothing_acceptable_is_rejected(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let policy = policy.with_abstract_syntaxes([uids::VERIFICATION]);
    let listener = Arc::new(RecordingListener::default());
    let (initiator, acceptor) = pair(parameters, policy, vec![listener.clone()], vec![]);

    let expected = AssociationRJ {
        result: AssociationRJResult::Permanent,
        source: AssociationRJSource::ServiceProviderASCE(
            AssociationRJServiceProviderASCEReason::NoReasonGiven,
        ),
    };
    match initiator.send_associate_request().await {
        Err(AssociationError::Rejected(rejection)) => assert_eq!(rejection, expected),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(matches!(
        acceptor.wait_for_association().await,
        Err(AssociationError::Rejected(_))
    ));
    assert_eq!(initiator.state(), AssociationState::Closed);
    assert_eq!(acceptor.state(), AssociationState::Closed);
    assert!(initiator.next_message().await.is_none());
    assert!(acceptor.next_message().await.is_none());
    assert_eq!(listener.events(), vec!["rejected"]);
}

#[rstest]
#[tokio::test]
async fn test_large_dataset(parameters: AssociationParameters, policy: AcceptorPolicy) {
    let mut parameters = parameters.with_max_pdu_length(16 * 1024);
    let id = parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let policy = policy.max_pdu_length(16 * 1024);
    let (initiator, acceptor) = pair(parameters, policy, vec![], vec![]);
    associate(&initiator, &acceptor).await;

    let dataset: Vec<u8> = (0..300 * 1024).map(|i| (i % 251) as u8).collect();
    let command = write_command(&store_request(1, CT, "1.2.3.4")).unwrap();
    let message = Message::new(id, command).with_dataset(Bytes::from(dataset));
    let (sent, received) = tokio::join!(
        initiator.send_message(message.clone()),
        acceptor.next_message()
    );
    sent.unwrap();
    let received = received.unwrap();
    assert_eq!(received.dataset.as_ref().map(Bytes::len), Some(300 * 1024));
    assert!(received == message);

    let payload = message.payload_len() as u64;
    assert_eq!(initiator.counters().outgoing_bytes, payload);
    assert_eq!(initiator.counters().outgoing_messages, 1);
    assert_eq!(acceptor.counters().incoming_bytes, payload);
    assert_eq!(acceptor.counters().incoming_messages, 1);
}

#[rstest]
#[tokio::test]
async fn test_peer_closes_mid_message(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    init_logging();
    let id = parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let listener = Arc::new(RecordingListener::default());
    let (a, b) = tokio::io::duplex(64 * 1024);
    let initiator =
        Association::initiator(a, parameters, EngineConfig::default(), vec![listener.clone()]);
    let mut peer = RawPeer::new(b);

    let (requested, ()) = tokio::join!(initiator.send_associate_request(), async {
        let Some(Pdu::AssociationRQ(rq)) = peer.receive().await else {
            panic!("expected an A-ASSOCIATE-RQ")
        };
        let acceptance = negotiate(&rq, &policy).unwrap();
        peer.send(&Pdu::AssociationAC(acceptance.ac)).await;
    });
    requested.unwrap();

    let command = write_command(&store_request(1, CT, "1.2.3.4")).unwrap();
    peer.send(&Pdu::PData {
        data: vec![
            PDataValue {
                presentation_context_id: id,
                value_type: PDataValueType::Command,
                is_last: true,
                data: command,
            },
            PDataValue {
                presentation_context_id: id,
                value_type: PDataValueType::Data,
                is_last: false,
                data: Bytes::from_static(&[0x55; 1000]),
            },
        ],
    })
    .await;
    drop(peer);

    // the partial message is never delivered
    assert!(initiator.next_message().await.is_none());
    assert_eq!(initiator.state(), AssociationState::Aborted);
    match initiator.outcome() {
        Some(Outcome::Aborted(AbortCause::Io(e))) => {
            assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof)
        }
        other => panic!("expected an I/O abort, got {other:?}"),
    }
    assert_eq!(listener.events(), vec!["established", "aborted"]);
    assert_eq!(initiator.counters().incoming_messages, 0);
}

#[rstest]
#[tokio::test]
async fn test_statistics_of_two_exchanges(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    let id = parameters
        .add_presentation_context(
            uids::VERIFICATION,
            vec![uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string()],
        )
        .unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let recorder = Arc::new(StatisticsRecorder::new(tx));
    let (initiator, acceptor) = pair(parameters, policy, vec![recorder], vec![]);
    associate(&initiator, &acceptor).await;

    let mut sent = 0;
    let mut received = 0;
    for message_id in 1..=2 {
        let request = Message::from_command_object(id, &echo_request(message_id)).unwrap();
        sent += request.payload_len() as u64;
        initiator.send_message(request).await.unwrap();

        let request = acceptor.next_message().await.unwrap();
        let summary = request.summary().unwrap();
        let echo = echo_response(summary.message_id.unwrap(), status::SUCCESS);
        let response = Message::from_command_object(id, &echo).unwrap();
        received += response.payload_len() as u64;
        acceptor.send_message(response).await.unwrap();

        let response = initiator.next_message().await.unwrap();
        assert_eq!(
            response.summary().unwrap().message_id_being_responded_to,
            Some(message_id)
        );
    }
    initiator.release().await.unwrap();
    assert!(matches!(acceptor.closed().await, Some(Outcome::Released)));

    let statistics = rx.recv().await.unwrap();
    assert_eq!(statistics.association_ulid, initiator.id());
    assert_eq!(statistics.incoming_messages, 2);
    assert_eq!(statistics.outgoing_messages, 2);
    assert_eq!(statistics.incoming_bytes, received);
    assert_eq!(statistics.outgoing_bytes, sent);
    assert_eq!(statistics.outcome, AssociationOutcome::Released);
    assert_eq!(statistics.calling_ae_title.as_str(), "SCU");
}

#[rstest]
#[tokio::test]
async fn test_abort_is_idempotent(mut parameters: AssociationParameters, policy: AcceptorPolicy) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let listener = Arc::new(RecordingListener::default());
    let (initiator, acceptor) = pair(parameters, policy, vec![listener.clone()], vec![]);
    associate(&initiator, &acceptor).await;

    initiator.abort().await;
    initiator.abort().await;
    assert_eq!(initiator.state(), AssociationState::Aborted);
    assert!(matches!(
        initiator.outcome(),
        Some(Outcome::Aborted(AbortCause::Local))
    ));
    assert_eq!(listener.events(), vec!["established", "aborted"]);

    match acceptor.closed().await {
        Some(Outcome::Aborted(AbortCause::Peer { origin })) => {
            assert_eq!(origin, AbortRQSource::ServiceUser)
        }
        other => panic!("expected an abort by the peer, got {other:?}"),
    }
    let message = Message::from_command_object(1, &echo_request(1)).unwrap();
    assert!(matches!(
        initiator.send_message(message).await,
        Err(AssociationError::InvalidState {
            state: AssociationState::Aborted,
            ..
        })
    ));
}

#[rstest]
#[tokio::test]
async fn test_send_before_associated(mut parameters: AssociationParameters) {
    init_logging();
    parameters
        .add_presentation_context(
            uids::VERIFICATION,
            vec![uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string()],
        )
        .unwrap();
    let (a, _b) = tokio::io::duplex(1024);
    let initiator = Association::initiator(a, parameters, EngineConfig::default(), vec![]);
    let message = Message::from_command_object(1, &echo_request(1)).unwrap();
    assert!(matches!(
        initiator.send_message(message).await,
        Err(AssociationError::InvalidState {
            state: AssociationState::Connecting,
            ..
        })
    ));
    assert!(matches!(
        initiator.release().await,
        Err(AssociationError::InvalidState { .. })
    ));
    assert_eq!(initiator.state(), AssociationState::Connecting);
}

#[rstest]
#[tokio::test]
async fn test_pdata_before_association(policy: AcceptorPolicy) {
    init_logging();
    let (a, b) = tokio::io::duplex(1024);
    let acceptor =
        Association::acceptor(b, Arc::new(policy), EngineConfig::default(), vec![], None, None);
    let mut peer = RawPeer::new(a);
    peer.send(&Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Command,
            is_last: true,
            data: Bytes::from_static(b"junk"),
        }],
    })
    .await;
    assert_eq!(
        peer.receive().await,
        Some(Pdu::AbortRQ {
            source: AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::UnexpectedPdu)
        })
    );
    assert_eq!(peer.receive().await, None);
    assert!(matches!(
        acceptor.wait_for_association().await,
        Err(AssociationError::Aborted(AbortCause::Protocol(
            ProtocolError::UnexpectedPdu { .. }
        )))
    ));
}

#[rstest]
#[tokio::test]
async fn test_unrecognized_pdu(policy: AcceptorPolicy) {
    init_logging();
    let (a, b) = tokio::io::duplex(1024);
    let acceptor =
        Association::acceptor(b, Arc::new(policy), EngineConfig::default(), vec![], None, None);
    let mut peer = RawPeer::new(a);
    peer.send_raw(&[0x09, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00]).await;
    assert_eq!(
        peer.receive().await,
        Some(Pdu::AbortRQ {
            source: AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::UnrecognizedPdu)
        })
    );
    assert!(acceptor.closed().await.is_some());
    assert_eq!(acceptor.state(), AssociationState::Aborted);
}

#[rstest]
#[tokio::test]
async fn test_association_request_timeout(policy: AcceptorPolicy) {
    init_logging();
    let (a, b) = tokio::io::duplex(1024);
    let config = EngineConfig {
        association_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let acceptor = Association::acceptor(b, Arc::new(policy), config, vec![], None, None);
    let mut peer = RawPeer::new(a);
    assert!(matches!(
        acceptor.wait_for_association().await,
        Err(AssociationError::ResponseTimeout)
    ));
    assert!(matches!(
        acceptor.outcome(),
        Some(Outcome::Aborted(AbortCause::Timeout(TimeoutKind::Association)))
    ));
    assert_eq!(peer.receive().await, provider_abort());
}

#[rstest]
#[tokio::test]
async fn test_association_request_timer_ignores_trickling_bytes(policy: AcceptorPolicy) {
    init_logging();
    let (a, b) = tokio::io::duplex(1024);
    let config = EngineConfig {
        association_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let acceptor = Association::acceptor(b, Arc::new(policy), config, vec![], None, None);
    let mut peer = RawPeer::new(a);
    let started = Instant::now();
    let outcome = tokio::select! {
        outcome = acceptor.closed() => outcome,
        () = async {
            // an A-ASSOCIATE-RQ of 1000 bytes that never completes
            peer.send_raw(&[0x01, 0x00, 0x00, 0x00, 0x03, 0xE8]).await;
            for _ in 0..12 {
                tokio::time::sleep(Duration::from_millis(120)).await;
                peer.send_raw(&[0x00]).await;
            }
        } => panic!("the association timer never expired"),
    };
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(
        outcome,
        Some(Outcome::Aborted(AbortCause::Timeout(TimeoutKind::Association)))
    ));
}

#[rstest]
#[tokio::test]
async fn test_association_response_timeout(mut parameters: AssociationParameters) {
    init_logging();
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let (a, b) = tokio::io::duplex(4096);
    let config = EngineConfig {
        response_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let initiator = Association::initiator(a, parameters, config, vec![]);
    let mut peer = RawPeer::new(b);
    assert!(matches!(
        initiator.send_associate_request().await,
        Err(AssociationError::ResponseTimeout)
    ));
    assert!(matches!(
        initiator.outcome(),
        Some(Outcome::Aborted(AbortCause::Timeout(TimeoutKind::Response)))
    ));
    assert!(matches!(
        peer.receive().await,
        Some(Pdu::AssociationRQ(_))
    ));
    assert_eq!(peer.receive().await, provider_abort());
}

#[rstest]
#[tokio::test]
async fn test_release_timeout(mut parameters: AssociationParameters, policy: AcceptorPolicy) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let config = EngineConfig {
        release_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let (initiator, mut peer) = associate_with_raw_peer(parameters, &policy, config, 4096).await;
    assert!(matches!(
        initiator.release().await,
        Err(AssociationError::ReleaseTimeout)
    ));
    assert_eq!(initiator.state(), AssociationState::Aborted);
    assert!(matches!(
        initiator.outcome(),
        Some(Outcome::Aborted(AbortCause::Timeout(TimeoutKind::Release)))
    ));
    assert_eq!(peer.receive().await, Some(Pdu::ReleaseRQ));
    assert_eq!(peer.receive().await, provider_abort());
}

#[rstest]
#[tokio::test]
async fn test_idle_timeout(mut parameters: AssociationParameters, policy: AcceptorPolicy) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let config = EngineConfig {
        idle_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let (initiator, mut peer) = associate_with_raw_peer(parameters, &policy, config, 4096).await;
    assert!(matches!(
        initiator.closed().await,
        Some(Outcome::Aborted(AbortCause::Timeout(TimeoutKind::Idle)))
    ));
    assert_eq!(peer.receive().await, provider_abort());
}

#[rstest]
#[tokio::test]
async fn test_incoming_message_too_large(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    let id = parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let config = EngineConfig {
        max_message_size: 1024,
        ..Default::default()
    };
    let (initiator, acceptor) = pair_with_config(parameters, policy, config, vec![], vec![]);
    associate(&initiator, &acceptor).await;

    let command = write_command(&store_request(1, CT, "1.2.3.4")).unwrap();
    let message = Message::new(id, command).with_dataset(Bytes::from(vec![0x55; 4096]));
    // may fail or not, depending on when the abort arrives
    let _ = initiator.send_message(message).await;

    assert!(acceptor.next_message().await.is_none());
    assert!(matches!(
        acceptor.closed().await,
        Some(Outcome::Aborted(AbortCause::MessageTooLarge { limit: 1024 }))
    ));
    match initiator.closed().await {
        Some(Outcome::Aborted(AbortCause::Peer { origin })) => assert_eq!(
            origin,
            AbortRQSource::ServiceProvider(AbortRQServiceProviderReason::ReasonNotSpecified)
        ),
        other => panic!("expected an abort by the peer, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_abort_interrupts_stalled_send(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    let id = parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    // the peer never reads, so the transport fills up
    let (initiator, _peer) =
        associate_with_raw_peer(parameters, &policy, EngineConfig::default(), 4096).await;
    let command = write_command(&store_request(1, CT, "1.2.3.4")).unwrap();
    let message = Message::new(id, command).with_dataset(Bytes::from(vec![0x55; 1024 * 1024]));

    let (sent, ()) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(3), initiator.send_message(message)),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            initiator.abort().await;
        }
    );
    let sent = sent.expect("send_message stayed blocked after the abort");
    assert!(matches!(
        sent,
        Err(AssociationError::Aborted(AbortCause::Local))
    ));
    assert_eq!(initiator.state(), AssociationState::Aborted);
}

#[rstest]
#[tokio::test]
async fn test_unlimited_local_max_pdu_length(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    let id = parameters
        .add_presentation_context(
            uids::VERIFICATION,
            vec![uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string()],
        )
        .unwrap();
    let policy = policy.max_pdu_length(0);
    let (initiator, acceptor) = pair(parameters, policy, vec![], vec![]);
    associate(&initiator, &acceptor).await;
    assert_eq!(acceptor.parameters().local_max_pdu_length, 0);

    let request = Message::from_command_object(id, &echo_request(7)).unwrap();
    initiator.send_message(request).await.unwrap();
    let request = acceptor.next_message().await.unwrap();
    assert_eq!(request.summary().unwrap().message_id, Some(7));

    let response = Message::from_command_object(id, &echo_response(7, status::SUCCESS)).unwrap();
    acceptor.send_message(response).await.unwrap();
    let response = initiator.next_message().await.unwrap();
    assert_eq!(
        response.summary().unwrap().message_id_being_responded_to,
        Some(7)
    );
    initiator.release().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_release_collision(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let (initiator, acceptor) = pair(parameters, policy, vec![], vec![]);
    associate(&initiator, &acceptor).await;
    let (a, b) = tokio::join!(initiator.release(), acceptor.release());
    a.unwrap();
    b.unwrap();
    assert_eq!(initiator.state(), AssociationState::Closed);
    assert_eq!(acceptor.state(), AssociationState::Closed);
}

#[rstest]
#[tokio::test]
async fn test_unaccepted_presentation_context(
    mut parameters: AssociationParameters,
    policy: AcceptorPolicy,
) {
    parameters
        .add_presentation_context(CT, vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()])
        .unwrap();
    let unsupported = parameters
        .add_presentation_context(
            "1.2.3.4.5.6",
            vec![uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string()],
        )
        .unwrap();
    let (initiator, acceptor) = pair(parameters, policy, vec![], vec![]);
    associate(&initiator, &acceptor).await;
    let message = Message::from_command_object(unsupported, &echo_request(1)).unwrap();
    assert!(matches!(
        initiator.send_message(message).await,
        Err(AssociationError::PresentationContextNotAccepted(id)) if id == unsupported
    ));
    assert_eq!(initiator.state(), AssociationState::Associated);
    initiator.release().await.unwrap();
}
