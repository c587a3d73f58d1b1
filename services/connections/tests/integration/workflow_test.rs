use swasthya_connections::domain::types::{
    NotificationKind, Permissions, RelationshipStatus, RequestStatus,
};
use swasthya_connections::error::ConnectionsServiceError;
use swasthya_connections::usecase::connection::{AcceptRequestInput, RejectRequestInput};
use swasthya_domain::role::AccountRole;

use crate::helpers::{
    accept_usecase, cast, create_usecase, doctors_usecase, pending_usecase, reject_usecase,
    terminate_usecase, to_email, to_patient_id, with_otp,
};

#[tokio::test]
async fn should_connect_registered_patient_with_otp() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    assert!(created.otp_expires_at.is_some());

    let pending = pending_usecase(&c.store)
        .execute(c.patient.id, None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request.id, created.request_id);
    assert_eq!(
        pending[0].doctor.as_ref().map(|d| d.id),
        Some(c.doctor.id),
        "pending entry should carry the requesting doctor"
    );

    let code = c.store.code_for(created.request_id);
    let relationship_id = accept_usecase(&c.store)
        .execute(created.request_id, c.patient.id, with_otp(&code))
        .await
        .unwrap();

    let request = c.store.request(created.request_id);
    assert_eq!(request.status, RequestStatus::Accepted);

    let relationships = c.store.relationships_between(c.patient.id, c.doctor.id);
    assert_eq!(relationships.len(), 1);
    assert_eq!(relationships[0].id, relationship_id);
    assert_eq!(relationships[0].status, RelationshipStatus::Active);
    assert_eq!(relationships[0].request_id, Some(created.request_id));
    assert_eq!(relationships[0].permissions, Permissions::default());

    let doctor_feed = c.store.notifications_for(c.doctor.id);
    assert!(
        doctor_feed
            .iter()
            .any(|n| n.kind == NotificationKind::ConnectionAccepted),
        "doctor should be told about the acceptance"
    );
}

#[tokio::test]
async fn should_connect_directly_without_otp() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    assert!(created.otp_expires_at.is_none());
    assert!(c.store.request(created.request_id).otp.is_none());
    assert!(c.store.deliveries().is_empty(), "direct requests send no code");

    accept_usecase(&c.store)
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    let doctors = doctors_usecase(&c.store)
        .execute(c.patient.id, None)
        .await
        .unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].peer.id, c.doctor.id);
}

#[tokio::test]
async fn should_let_new_patient_claim_request_sent_to_their_email() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_email("Newcomer@Example.com", "email"))
        .await
        .unwrap();
    let request = c.store.request(created.request_id);
    assert_eq!(request.patient_id, None);
    assert_eq!(request.patient_email.as_deref(), Some("newcomer@example.com"));

    let newcomer = c.store.seed_account(
        AccountRole::Patient,
        Some("newcomer@example.com"),
        None,
        "Newcomer",
    );
    let pending = pending_usecase(&c.store)
        .execute(newcomer.id, None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1, "request should surface by email");

    let code = c.store.code_for(created.request_id);
    accept_usecase(&c.store)
        .execute(created.request_id, newcomer.id, with_otp(&code))
        .await
        .unwrap();

    let request = c.store.request(created.request_id);
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(
        request.patient_id,
        Some(newcomer.id),
        "accepting should bind the request to the account"
    );
    assert_eq!(
        c.store.relationships_between(newcomer.id, c.doctor.id).len(),
        1
    );
}

#[tokio::test]
async fn should_reject_without_otp_and_record_reason() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();

    reject_usecase(&c.store)
        .execute(
            created.request_id,
            c.patient.id,
            RejectRequestInput {
                reason: Some("  I already have a physician  ".to_owned()),
                patient_email: None,
            },
        )
        .await
        .unwrap();

    let request = c.store.request(created.request_id);
    assert_eq!(request.status, RequestStatus::Rejected);
    assert_eq!(request.reason.as_deref(), Some("I already have a physician"));
    assert!(
        c.store
            .relationships_between(c.patient.id, c.doctor.id)
            .is_empty()
    );

    let result = accept_usecase(&c.store)
        .execute(
            created.request_id,
            c.patient.id,
            with_otp(&c.store.code_for(created.request_id)),
        )
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::RequestNoLongerPending)),
        "expected RequestNoLongerPending, got {result:?}"
    );
}

#[tokio::test]
async fn should_allow_reject_after_code_lapsed() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    c.store.lapse_otp(created.request_id);

    reject_usecase(&c.store)
        .execute(created.request_id, c.patient.id, RejectRequestInput::default())
        .await
        .unwrap();

    assert_eq!(
        c.store.request(created.request_id).status,
        RequestStatus::Rejected
    );
}

#[tokio::test]
async fn should_supersede_earlier_pending_request_for_same_pair() {
    let c = cast();
    let usecase = create_usecase(&c.store);

    let first = usecase
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    let second = usecase
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();

    assert_eq!(c.store.request(first.request_id).status, RequestStatus::Cancelled);
    assert_eq!(c.store.request(second.request_id).status, RequestStatus::Pending);

    let pending = pending_usecase(&c.store)
        .execute(c.patient.id, None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request.id, second.request_id);
}

#[tokio::test]
async fn should_refuse_request_when_already_connected() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    accept_usecase(&c.store)
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    let result = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::ConnectionAlreadyExists)),
        "expected ConnectionAlreadyExists, got {result:?}"
    );
}

#[tokio::test]
async fn should_allow_reconnect_after_termination() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    let relationship_id = accept_usecase(&c.store)
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    terminate_usecase(&c.store)
        .execute(relationship_id, c.patient.id)
        .await
        .unwrap();
    let doctor_feed = c.store.notifications_for(c.doctor.id);
    assert!(
        doctor_feed
            .iter()
            .any(|n| n.kind == NotificationKind::ConnectionTerminated)
    );

    let again = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    accept_usecase(&c.store)
        .execute(again.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    let history = c.store.relationships_between(c.patient.id, c.doctor.id);
    assert_eq!(history.len(), 2);
    assert_eq!(
        history
            .iter()
            .filter(|r| r.status == RelationshipStatus::Active)
            .count(),
        1,
        "only one relationship per pair may be active"
    );
}

#[tokio::test]
async fn should_create_one_relationship_when_accepts_race() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    let code = c.store.code_for(created.request_id);
    let usecase = accept_usecase(&c.store);

    let (first, second) = tokio::join!(
        usecase.execute(created.request_id, c.patient.id, with_otp(&code)),
        usecase.execute(created.request_id, c.patient.id, with_otp(&code)),
    );

    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one accept should win: {first:?} / {second:?}");
    let loser = if first.is_ok() { second } else { first };
    assert!(
        matches!(
            loser,
            Err(ConnectionsServiceError::RequestNoLongerPending
                | ConnectionsServiceError::ConnectionAlreadyExists)
        ),
        "expected the losing accept to be refused, got {loser:?}"
    );
    assert_eq!(
        c.store.relationships_between(c.patient.id, c.doctor.id).len(),
        1
    );
}

#[tokio::test]
async fn should_keep_id_bound_request_to_its_patient() {
    let c = cast();
    let namesake = c.store.seed_account(
        AccountRole::Patient,
        Some("other@example.com"),
        None,
        "Other Patient",
    );

    // The doctor pairs Asha's id with somebody else's email.
    let mut input = to_patient_id(c.patient.id, "direct");
    input.patient_email = Some("other@example.com".to_owned());
    let created = create_usecase(&c.store)
        .execute(c.doctor.id, input)
        .await
        .unwrap();

    let stored = c.store.request(created.request_id);
    assert_eq!(stored.patient_id, Some(c.patient.id));
    assert_eq!(stored.patient_email.as_deref(), Some("asha@example.com"));

    let listed = pending_usecase(&c.store)
        .execute(namesake.id, None)
        .await
        .unwrap();
    assert!(listed.is_empty(), "request must not show up for another patient");

    let usecase = accept_usecase(&c.store);
    let (intruder, owner) = tokio::join!(
        usecase.execute(created.request_id, namesake.id, AcceptRequestInput::default()),
        usecase.execute(created.request_id, c.patient.id, AcceptRequestInput::default()),
    );
    assert!(
        matches!(intruder, Err(ConnectionsServiceError::Unauthorized)),
        "expected Unauthorized, got {intruder:?}"
    );
    assert!(owner.is_ok(), "expected the bound patient to accept, got {owner:?}");

    let request = c.store.request(created.request_id);
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.patient_id, Some(c.patient.id));
    assert!(
        c.store
            .relationships_between(namesake.id, c.doctor.id)
            .is_empty()
    );
}

#[tokio::test]
async fn should_refuse_second_accept_of_same_request() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    let usecase = accept_usecase(&c.store);
    usecase
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    let result = usecase
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::RequestNoLongerPending)),
        "expected RequestNoLongerPending, got {result:?}"
    );
}

#[tokio::test]
async fn should_refuse_stranger_acting_on_request() {
    let c = cast();
    let stranger = c.store.seed_account(
        AccountRole::Patient,
        Some("stranger@example.com"),
        None,
        "Stranger",
    );

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    let code = c.store.code_for(created.request_id);

    let accepted = accept_usecase(&c.store)
        .execute(created.request_id, stranger.id, with_otp(&code))
        .await;
    assert!(
        matches!(accepted, Err(ConnectionsServiceError::Unauthorized)),
        "expected Unauthorized, got {accepted:?}"
    );

    let rejected = reject_usecase(&c.store)
        .execute(created.request_id, stranger.id, RejectRequestInput::default())
        .await;
    assert!(
        matches!(rejected, Err(ConnectionsServiceError::Unauthorized)),
        "expected Unauthorized, got {rejected:?}"
    );

    assert_eq!(
        c.store.request(created.request_id).status,
        RequestStatus::Pending,
        "request should be untouched"
    );
}

#[tokio::test]
async fn should_refuse_caller_claiming_someone_elses_email() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();

    let result = accept_usecase(&c.store)
        .execute(
            created.request_id,
            c.patient.id,
            AcceptRequestInput {
                otp: None,
                patient_email: Some("someone.else@example.com".to_owned()),
            },
        )
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::Unauthorized)),
        "expected Unauthorized, got {result:?}"
    );
}

#[tokio::test]
async fn should_refuse_request_from_non_doctor() {
    let c = cast();
    let other = c
        .store
        .seed_account(AccountRole::Patient, Some("p2@example.com"), None, "P2");

    let result = create_usecase(&c.store)
        .execute(other.id, to_patient_id(c.patient.id, "otp"))
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::AccountNotFound)),
        "expected AccountNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_return_not_found_for_unknown_request() {
    let c = cast();

    let result = accept_usecase(&c.store)
        .execute(uuid::Uuid::now_v7(), c.patient.id, AcceptRequestInput::default())
        .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::RequestNotFound)),
        "expected RequestNotFound, got {result:?}"
    );
}
