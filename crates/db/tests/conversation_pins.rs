//! Conversation repository tests against a live PostgreSQL.

use aether_db::repositories::ConversationRepo;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn one_conversation_per_customer(pool: PgPool) {
    let first = ConversationRepo::find_or_create_for_customer(&pool, 7)
        .await
        .unwrap();
    let second = ConversationRepo::find_or_create_for_customer(&pool, 7)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn pins_are_idempotent_and_scoped(pool: PgPool) {
    let mine = ConversationRepo::find_or_create_for_customer(&pool, 1)
        .await
        .unwrap();
    let theirs = ConversationRepo::find_or_create_for_customer(&pool, 2)
        .await
        .unwrap();
    let message = ConversationRepo::append_message(&pool, mine.id, "user", "hello")
        .await
        .unwrap();

    assert!(ConversationRepo::pin(&pool, mine.id, message.id).await.unwrap());
    assert!(!ConversationRepo::pin(&pool, mine.id, message.id).await.unwrap());
    assert_eq!(
        ConversationRepo::pinned_ids(&pool, mine.id).await.unwrap(),
        vec![message.id]
    );

    assert!(ConversationRepo::message_exists(&pool, mine.id, message.id)
        .await
        .unwrap());
    assert!(!ConversationRepo::message_exists(&pool, theirs.id, message.id)
        .await
        .unwrap());

    assert!(ConversationRepo::unpin(&pool, mine.id, message.id).await.unwrap());
    assert!(!ConversationRepo::unpin(&pool, mine.id, message.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn recent_messages_are_the_tail_oldest_first(pool: PgPool) {
    let conversation = ConversationRepo::find_or_create_for_customer(&pool, 1)
        .await
        .unwrap();
    for i in 1..=5 {
        ConversationRepo::append_message(&pool, conversation.id, "user", &format!("m{i}"))
            .await
            .unwrap();
    }

    let recent = ConversationRepo::recent_messages(&pool, conversation.id, 2)
        .await
        .unwrap();
    let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m4", "m5"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_pinned_message_drops_the_pin(pool: PgPool) {
    let conversation = ConversationRepo::find_or_create_for_customer(&pool, 1)
        .await
        .unwrap();
    let kept = ConversationRepo::append_message(&pool, conversation.id, "user", "keep")
        .await
        .unwrap();
    let gone = ConversationRepo::append_message(&pool, conversation.id, "user", "drop")
        .await
        .unwrap();
    ConversationRepo::pin(&pool, conversation.id, kept.id).await.unwrap();
    ConversationRepo::pin(&pool, conversation.id, gone.id).await.unwrap();

    let was_pinned = ConversationRepo::delete_message(&pool, conversation.id, gone.id)
        .await
        .unwrap();
    assert_eq!(was_pinned, Some(true));
    assert_eq!(
        ConversationRepo::pinned_ids(&pool, conversation.id).await.unwrap(),
        vec![kept.id]
    );
    assert!(ConversationRepo::find_message(&pool, conversation.id, gone.id)
        .await
        .unwrap()
        .is_none());

    let again = ConversationRepo::delete_message(&pool, conversation.id, gone.id)
        .await
        .unwrap();
    assert_eq!(again, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn edit_replaces_content_in_place(pool: PgPool) {
    let conversation = ConversationRepo::find_or_create_for_customer(&pool, 1)
        .await
        .unwrap();
    let message = ConversationRepo::append_message(&pool, conversation.id, "user", "helo")
        .await
        .unwrap();

    let edited = ConversationRepo::edit_message(&pool, conversation.id, message.id, "hello")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edited.id, message.id);
    assert_eq!(edited.content, "hello");
    assert_eq!(edited.created_at, message.created_at);

    let other = ConversationRepo::find_or_create_for_customer(&pool, 2)
        .await
        .unwrap();
    assert!(ConversationRepo::edit_message(&pool, other.id, message.id, "x")
        .await
        .unwrap()
        .is_none());
}
