mod common;

use std::sync::Arc;

use common::ScriptedBackend;
use journal_client::{load_history, JournalError, JournalStore, Session, SessionAuth};
use journal_shared::envelope::Envelope;
use journal_shared::{CalendarDate, Codec, Conversation, EnvelopeVersion, Message, UserId};
use journal_store::SqliteBackend;

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn day(s: &str) -> CalendarDate {
    CalendarDate::parse(s).unwrap()
}

fn store_for(
    backend: &Arc<SqliteBackend>,
    user: Option<&str>,
) -> JournalStore<SqliteBackend, SessionAuth> {
    let auth = match user {
        Some(u) => SessionAuth::signed_in(Session::local(uid(u))),
        None => SessionAuth::new(),
    };
    JournalStore::new(Arc::clone(backend), Arc::new(auth), Codec::default())
}

fn backend() -> Arc<SqliteBackend> {
    Arc::new(SqliteBackend::open_in_memory().unwrap())
}

#[tokio::test]
async fn test_save_load_scoped_to_user() {
    let backend = backend();
    let u1 = store_for(&backend, Some("u1"));
    let u2 = store_for(&backend, Some("u2"));

    let conv: Conversation = vec![Message::user("hi")].into();
    u1.save_on(day("2024-05-01"), &conv).await.unwrap();

    assert_eq!(u1.load_by_date(day("2024-05-01")).await, conv);
    assert!(u2.load_by_date(day("2024-05-01")).await.is_empty());
    assert!(u2.list_dates().await.is_empty());
}

#[tokio::test]
async fn test_second_save_replaces_first() {
    let backend = backend();
    let store = store_for(&backend, Some("u1"));
    let date = day("2024-05-01");

    let first: Conversation = vec![Message::user("first")].into();
    let second = first.with(Message::assistant("second"));
    store.save_on(date, &first).await.unwrap();
    store.save_on(date, &second).await.unwrap();

    assert_eq!(store.load_by_date(date).await, second);
    assert_eq!(backend.lock().unwrap().count_entries(&uid("u1")).unwrap(), 1);
}

#[tokio::test]
async fn test_empty_day_reads_empty() {
    let store = store_for(&backend(), Some("u1"));
    let conv = store.try_load_by_date(day("2030-01-01")).await.unwrap();
    assert!(conv.is_empty());
}

#[tokio::test]
async fn test_dates_newest_first() {
    let store = store_for(&backend(), Some("u1"));
    let conv: Conversation = vec![Message::user("x")].into();

    for d in ["2024-05-02", "2024-05-03", "2024-05-01"] {
        store.save_on(day(d), &conv).await.unwrap();
    }

    assert_eq!(
        store.list_dates().await,
        vec![day("2024-05-03"), day("2024-05-02"), day("2024-05-01")]
    );
}

#[tokio::test]
async fn test_signed_out_writes_fail_reads_empty() {
    let backend = backend();
    let store = store_for(&backend, None);
    let conv: Conversation = vec![Message::user("x")].into();

    let err = store.save_on(day("2024-05-01"), &conv).await.unwrap_err();
    assert!(matches!(err, JournalError::AuthenticationRequired));
    let err = store.clear_all().await.unwrap_err();
    assert!(matches!(err, JournalError::AuthenticationRequired));

    assert!(store.load_by_date(day("2024-05-01")).await.is_empty());
    assert!(store.list_dates().await.is_empty());
}

#[tokio::test]
async fn test_corrupt_record_is_an_error_or_empty() {
    let backend = backend();
    let store = store_for(&backend, Some("u1"));
    let date = day("2024-05-01");
    store
        .save_on(date, &vec![Message::user("secret")].into())
        .await
        .unwrap();

    assert!(backend
        .lock()
        .unwrap()
        .replace_raw_messages(&uid("u1"), date, "definitely not an envelope")
        .unwrap());

    let err = store.try_load_by_date(date).await.unwrap_err();
    assert!(err.is_decoding() || err.is_integrity(), "{err:?}");
    assert!(store.load_by_date(date).await.is_empty());
}

#[tokio::test]
async fn test_foreign_envelope_fails_integrity() {
    let backend = backend();
    let u1 = store_for(&backend, Some("u1"));
    let u2 = store_for(&backend, Some("u2"));
    let date = day("2024-05-01");

    u1.save_on(date, &vec![Message::user("mine")].into())
        .await
        .unwrap();
    u2.save_on(date, &vec![Message::user("theirs")].into())
        .await
        .unwrap();

    // Copy u1's envelope over u2's row.
    let stolen = backend
        .lock()
        .unwrap()
        .get_entry(&uid("u1"), date)
        .unwrap()
        .unwrap()
        .messages;
    backend
        .lock()
        .unwrap()
        .replace_raw_messages(&uid("u2"), date, &stolen)
        .unwrap();

    let err = u2.try_load_by_date(date).await.unwrap_err();
    assert!(err.is_integrity(), "{err:?}");
}

#[tokio::test]
async fn test_clear_all_is_idempotent() {
    let backend = backend();
    let u1 = store_for(&backend, Some("u1"));
    let u2 = store_for(&backend, Some("u2"));
    let conv: Conversation = vec![Message::user("x")].into();

    u1.save_on(day("2024-05-01"), &conv).await.unwrap();
    u1.save_on(day("2024-05-02"), &conv).await.unwrap();
    u2.save_on(day("2024-05-01"), &conv).await.unwrap();

    assert_eq!(u1.clear_all().await.unwrap(), 2);
    assert_eq!(u1.clear_all().await.unwrap(), 0);
    assert!(u1.list_dates().await.is_empty());
    assert_eq!(u2.list_dates().await, vec![day("2024-05-01")]);
}

#[tokio::test]
async fn test_legacy_writes_still_readable() {
    let backend = backend();
    let auth = Arc::new(SessionAuth::signed_in(Session::local(uid("u1"))));
    let legacy = JournalStore::new(
        Arc::clone(&backend),
        Arc::clone(&auth),
        Codec::new(EnvelopeVersion::Legacy),
    );
    let current = JournalStore::new(Arc::clone(&backend), auth, Codec::default());
    let date = day("2024-05-01");

    let conv: Conversation = vec![Message::user("old format")].into();
    legacy.save_on(date, &conv).await.unwrap();

    assert_eq!(current.try_load_by_date(date).await.unwrap(), conv);
}

#[tokio::test]
async fn test_sign_out_hides_records() {
    let backend = backend();
    let auth = Arc::new(SessionAuth::signed_in(Session::local(uid("u1"))));
    let store = JournalStore::new(Arc::clone(&backend), Arc::clone(&auth), Codec::default());
    let date = day("2024-05-01");

    store
        .save_on(date, &vec![Message::user("x")].into())
        .await
        .unwrap();
    auth.sign_out();

    assert!(store.load_by_date(date).await.is_empty());
    assert!(store.current_user_id().is_none());
}

#[tokio::test]
async fn test_pre_envelope_row_read_then_sealed() {
    let backend = Arc::new(ScriptedBackend::new());
    let auth = Arc::new(SessionAuth::signed_in(Session::local(uid("u1"))));
    let store = JournalStore::new(Arc::clone(&backend), auth, Codec::default());
    let date = day("2024-05-01");
    backend.seed_plain(
        &uid("u1"),
        date,
        r#"[{"text":"Hi","isUser":true,"timestamp":"2024-05-01T09:30:00.000Z"}]"#,
    );

    let conv = store.try_load_by_date(date).await.unwrap();
    assert_eq!(conv.len(), 1);
    assert_eq!(conv.messages()[0].text, "Hi");

    let history = load_history(&store).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].preview, "Hi");

    let extended = conv.with(Message::assistant("welcome back"));
    store.save_on(date, &extended).await.unwrap();
    assert!(!backend.has_plain(&uid("u1"), date));

    let sealed = backend
        .inner()
        .lock()
        .unwrap()
        .get_entry(&uid("u1"), date)
        .unwrap()
        .unwrap()
        .messages;
    let envelope = Envelope::from_text(&sealed).unwrap();
    assert_eq!(envelope.envelope_version().unwrap(), EnvelopeVersion::Sealed);
    assert_eq!(Codec::default().decrypt(&sealed, &uid("u1")).unwrap(), extended);
}
