use swasthya_connections::domain::types::{
    NotificationKind, NotificationSortBy, Priority, RequestStatus,
};
use swasthya_connections::error::ConnectionsServiceError;
use swasthya_connections::usecase::connection::AcceptRequestInput;
use swasthya_connections::usecase::notification::{
    DisableNotificationUseCase, ListNotificationsUseCase, MarkAllNotificationsReadUseCase,
    MarkNotificationReadUseCase, UnreadCountUseCase,
};
use swasthya_domain::pagination::{PageRequest, Sort};

use crate::helpers::{accept_usecase, cast, create_usecase, reject_usecase, to_patient_id};

fn first_page() -> PageRequest {
    PageRequest {
        per_page: 20,
        page: 1,
    }
}

#[tokio::test]
async fn should_notify_patient_of_new_request() {
    let c = cast();

    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();

    let feed = ListNotificationsUseCase {
        repo: c.store.clone(),
    }
    .execute(
        c.patient.id,
        true,
        NotificationSortBy::default(),
        first_page(),
    )
    .await
    .unwrap();
    assert_eq!(feed.len(), 1);
    let notification = &feed[0];
    assert_eq!(notification.kind, NotificationKind::ConnectionRequest);
    assert_eq!(notification.priority, Priority::High);
    assert_eq!(
        notification.data["request_id"],
        serde_json::json!(created.request_id)
    );
    assert!(
        !notification.message.contains(&c.store.code_for(created.request_id)),
        "the feed must never carry the code"
    );
}

#[tokio::test]
async fn should_track_read_state() {
    let c = cast();
    let create = create_usecase(&c.store);
    for _ in 0..3 {
        create
            .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
            .await
            .unwrap();
    }

    let unread = UnreadCountUseCase {
        repo: c.store.clone(),
    };
    assert_eq!(unread.execute(c.patient.id).await.unwrap(), 3);

    let feed = c.store.notifications_for(c.patient.id);
    MarkNotificationReadUseCase {
        repo: c.store.clone(),
    }
    .execute(feed[0].id, c.patient.id)
    .await
    .unwrap();
    assert_eq!(unread.execute(c.patient.id).await.unwrap(), 2);

    let updated = MarkAllNotificationsReadUseCase {
        repo: c.store.clone(),
    }
    .execute(c.patient.id)
    .await
    .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(unread.execute(c.patient.id).await.unwrap(), 0);

    let unread_only = ListNotificationsUseCase {
        repo: c.store.clone(),
    }
    .execute(
        c.patient.id,
        false,
        NotificationSortBy::CreatedAt(Sort::Asc),
        first_page(),
    )
    .await
    .unwrap();
    assert!(unread_only.is_empty());
}

#[tokio::test]
async fn should_hide_disabled_notification() {
    let c = cast();
    create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    let id = c.store.notifications_for(c.patient.id)[0].id;

    let disable = DisableNotificationUseCase {
        repo: c.store.clone(),
    };
    disable.execute(id, c.patient.id).await.unwrap();

    let feed = ListNotificationsUseCase {
        repo: c.store.clone(),
    }
    .execute(
        c.patient.id,
        true,
        NotificationSortBy::default(),
        first_page(),
    )
    .await
    .unwrap();
    assert!(feed.is_empty());

    let again = disable.execute(id, c.patient.id).await;
    assert!(
        matches!(again, Err(ConnectionsServiceError::NotificationNotFound)),
        "expected NotificationNotFound, got {again:?}"
    );
}

#[tokio::test]
async fn should_not_let_others_touch_a_notification() {
    let c = cast();
    create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();
    let id = c.store.notifications_for(c.patient.id)[0].id;

    let result = MarkNotificationReadUseCase {
        repo: c.store.clone(),
    }
    .execute(id, c.doctor.id)
    .await;
    assert!(
        matches!(result, Err(ConnectionsServiceError::NotificationNotFound)),
        "expected NotificationNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_notify_doctor_of_rejection() {
    let c = cast();
    let created = create_usecase(&c.store)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "otp"))
        .await
        .unwrap();

    reject_usecase(&c.store)
        .execute(created.request_id, c.patient.id, Default::default())
        .await
        .unwrap();

    let feed = c.store.notifications_for(c.doctor.id);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, NotificationKind::ConnectionRejected);
    assert_eq!(feed[0].priority, Priority::Normal);
}

#[tokio::test]
async fn should_complete_workflow_when_notifications_fail() {
    let c = cast();
    let failing = c.store.failing_notifications();

    let created = create_usecase(&failing)
        .execute(c.doctor.id, to_patient_id(c.patient.id, "direct"))
        .await
        .unwrap();
    accept_usecase(&failing)
        .execute(created.request_id, c.patient.id, AcceptRequestInput::default())
        .await
        .unwrap();

    assert_eq!(
        c.store.request(created.request_id).status,
        RequestStatus::Accepted
    );
    assert_eq!(
        c.store.relationships_between(c.patient.id, c.doctor.id).len(),
        1
    );
    assert!(c.store.notifications_for(c.patient.id).is_empty());
    assert!(c.store.notifications_for(c.doctor.id).is_empty());
}
