//! Inbound protocol semantics, exercised over real loopback sockets: a
//! scripted remote peer sends frames at a live node and we watch both the
//! wire replies and the store.

mod common;

use std::time::Duration;

use common::*;

use lsnp_core::{unix_now, Message, MessageId, Scope, Symbol};
use lsnp_peer::encode_chunks;

fn mid(n: u64) -> MessageId {
    format!("{n:016x}").parse().unwrap()
}

#[tokio::test]
async fn profile_broadcast_populates_peer_catalog() {
    let (node, addr, _rx) = start_node(test_config()).await;
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");

    send(&sock, &profile_of(&alice, "Alice"), addr).await;

    let store = node.store();
    eventually(
        &store,
        |s| s.peer(&alice).map(|p| p.display_name.as_str()) == Some("Alice"),
        "peer to appear with display name",
    )
    .await;
}

#[tokio::test]
async fn posts_require_follow_and_live_token() {
    let (node, addr, _rx) = start_node(test_config()).await;
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let token = token_for(&alice, Scope::Broadcast);
    let store = node.store();

    let post = |message_id: MessageId, content: &str| Message::Post {
        user_id: alice.clone(),
        content: content.to_string(),
        ttl: 3600,
        message_id,
        timestamp: Some(unix_now()),
        token: token.clone(),
    };

    // not following: silently discarded
    send(&sock, &post(mid(1), "unseen"), addr).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(store
        .lock()
        .await
        .peer(&alice)
        .map_or(true, |p| p.posts.is_empty()));

    // following: stored
    store.lock().await.follow(alice.clone());
    send(&sock, &post(mid(2), "first visible post"), addr).await;
    eventually(
        &store,
        |s| s.peer(&alice).map_or(0, |p| p.posts.len()) == 1,
        "followed post to be stored",
    )
    .await;

    // revoked token: rejected from then on
    send(&sock, &Message::Revoke { token: token.clone() }, addr).await;
    eventually(
        &store,
        |s| s.revoked_tokens().contains(&token),
        "token to be revoked",
    )
    .await;
    send(&sock, &post(mid(3), "should bounce"), addr).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        store.lock().await.peer(&alice).map_or(0, |p| p.posts.len()),
        1
    );
}

#[tokio::test]
async fn duplicate_dms_store_once_but_ack_every_time() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();

    let dm = Message::Dm {
        from: alice.clone(),
        to: bob,
        content: "hi".into(),
        timestamp: unix_now(),
        message_id: mid(7),
        token: token_for(&alice, Scope::Chat),
    };

    for _ in 0..3 {
        send(&sock, &dm, addr).await;
        let ack = recv_frame(&sock, Duration::from_secs(2))
            .await
            .expect("an ACK per delivery");
        assert_eq!(ack.frame_type(), Some("ACK"));
        assert_eq!(ack.get("MESSAGE_ID"), Some("0000000000000007"));
        assert_eq!(ack.get("STATUS"), Some("RECEIVED"));
    }

    let store = node.store();
    let store = store.lock().await;
    assert_eq!(store.peer(&alice).map_or(0, |p| p.dms.len()), 1);
}

#[tokio::test]
async fn misaddressed_or_badly_scoped_dms_get_no_ack() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();

    // addressed to someone else entirely
    let stray = Message::Dm {
        from: alice.clone(),
        to: user("carol@10.0.0.3"),
        content: "psst".into(),
        timestamp: unix_now(),
        message_id: mid(20),
        token: token_for(&alice, Scope::Chat),
    };
    send(&sock, &stray, addr).await;
    assert!(recv_frame(&sock, Duration::from_millis(300)).await.is_none());

    // right recipient, wrong token scope
    let bad_scope = Message::Dm {
        from: alice.clone(),
        to: bob,
        content: "psst".into(),
        timestamp: unix_now(),
        message_id: mid(21),
        token: token_for(&alice, Scope::Broadcast),
    };
    send(&sock, &bad_scope, addr).await;
    assert!(recv_frame(&sock, Duration::from_millis(300)).await.is_none());

    let store = node.store();
    let store = store.lock().await;
    assert!(store.peer(&alice).map_or(true, |p| p.dms.is_empty()));
}

#[tokio::test]
async fn refollowing_keeps_one_follower_entry() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();
    let store = node.store();

    let follow = Message::Follow {
        from: alice.clone(),
        to: bob.clone(),
        message_id: mid(31),
        timestamp: unix_now(),
        token: token_for(&alice, Scope::Follow),
    };
    send(&sock, &follow, addr).await;
    send(&sock, &follow, addr).await;

    eventually(&store, |s| s.followers().len() == 1, "exactly one follower").await;
    // a beat later there is still just the one entry
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.lock().await.followers().len(), 1);

    let unfollow = Message::Unfollow {
        from: alice.clone(),
        to: bob,
        message_id: mid(32),
        timestamp: unix_now(),
        token: token_for(&alice, Scope::Follow),
    };
    send(&sock, &unfollow, addr).await;
    eventually(&store, |s| s.followers().is_empty(), "follower list to empty").await;
}

#[tokio::test]
async fn garbage_and_unknown_types_do_not_wedge_the_loop() {
    let (node, addr, _rx) = start_node(test_config()).await;
    let sock = harness_socket().await;

    send_text(&sock, &[0xff, 0xfe, 0x00, 0x9f], addr).await;
    send_text(&sock, b"TYPE: WORMHOLE\nFROM: alice@10.0.0.1\n\n", addr).await;
    send_text(&sock, b"no colon here, just noise\n\n", addr).await;

    // the node still processes well-formed traffic afterwards
    let alice = user("alice@10.0.0.1");
    send(&sock, &profile_of(&alice, "Alice"), addr).await;
    let store = node.store();
    eventually(
        &store,
        |s| s.peer(&alice).is_some(),
        "node to keep dispatching after junk",
    )
    .await;
}

#[tokio::test]
async fn group_membership_is_creator_authoritative() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let carol = user("carol@10.0.0.3");
    let dave = user("dave@10.0.0.4");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();
    let store = node.store();
    let now = unix_now();

    send(
        &sock,
        &Message::GroupCreate {
            from: carol.clone(),
            group_id: "plan9".into(),
            group_name: "Planning".into(),
            members: vec![carol.clone(), bob.clone(), dave.clone()],
            timestamp: now,
            token: token_for(&carol, Scope::Group),
        },
        addr,
    )
    .await;
    eventually(&store, |s| s.group("plan9").is_some(), "group to be created").await;

    // a non-creator trying to evict the creator is ignored
    send(
        &sock,
        &Message::GroupUpdate {
            from: dave.clone(),
            group_id: "plan9".into(),
            add: vec![],
            remove: vec![carol.clone()],
            timestamp: now + 1,
            token: token_for(&dave, Scope::Group),
        },
        addr,
    )
    .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(store.lock().await.group("plan9").unwrap().is_member(&carol));

    // the creator evicts dave
    send(
        &sock,
        &Message::GroupUpdate {
            from: carol.clone(),
            group_id: "plan9".into(),
            add: vec![],
            remove: vec![dave.clone()],
            timestamp: now + 2,
            token: token_for(&carol, Scope::Group),
        },
        addr,
    )
    .await;
    eventually(
        &store,
        |s| !s.group("plan9").unwrap().is_member(&dave),
        "dave to be evicted",
    )
    .await;

    // messages from the evicted member are refused
    send(
        &sock,
        &Message::GroupMessage {
            from: dave.clone(),
            group_id: "plan9".into(),
            content: "let me back in".into(),
            timestamp: now + 3,
            token: token_for(&dave, Scope::Group),
        },
        addr,
    )
    .await;
    // while the creator still gets through
    send(
        &sock,
        &Message::GroupMessage {
            from: carol.clone(),
            group_id: "plan9".into(),
            content: "meeting at five".into(),
            timestamp: now + 4,
            token: token_for(&carol, Scope::Group),
        },
        addr,
    )
    .await;
    eventually(
        &store,
        |s| s.group("plan9").unwrap().messages.len() == 1,
        "only the creator's message to land",
    )
    .await;
    assert_eq!(
        store.lock().await.group("plan9").unwrap().messages[0].content,
        "meeting at five"
    );
}

#[tokio::test]
async fn file_chunks_reassemble_and_trigger_a_receipt() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();
    let token = token_for(&alice, Scope::File);

    let payload: Vec<u8> = (0u16..700).map(|i| (i % 251) as u8).collect();
    let chunks = encode_chunks(&payload, 256);
    let total = chunks.len() as u32;
    assert_eq!(total, 3);

    send(
        &sock,
        &Message::FileOffer {
            from: alice.clone(),
            to: bob.clone(),
            filename: "pattern.bin".into(),
            filesize: payload.len() as u64,
            filetype: "application/octet-stream".into(),
            file_id: "fabc1234".into(),
            description: None,
            timestamp: unix_now(),
            token: token.clone(),
        },
        addr,
    )
    .await;

    // chunks arrive out of order, with one duplicate
    for index in [1u32, 0, 1, 2] {
        send(
            &sock,
            &Message::FileChunk {
                from: alice.clone(),
                to: bob.clone(),
                file_id: "fabc1234".into(),
                chunk_index: index,
                total_chunks: total,
                chunk_size: 256,
                data: chunks[index as usize].clone(),
                token: token.clone(),
            },
            addr,
        )
        .await;
    }

    let receipt = recv_frame(&sock, Duration::from_secs(2))
        .await
        .expect("FILE_RECEIVED reply");
    assert_eq!(receipt.frame_type(), Some("FILE_RECEIVED"));
    assert_eq!(receipt.get("FILEID"), Some("fabc1234"));
    assert_eq!(receipt.get("STATUS"), Some("COMPLETE"));

    let store = node.store();
    let store = store.lock().await;
    let file = store.incoming_file("fabc1234").unwrap();
    assert_eq!(file.payload(), Some(payload.as_slice()));
}

#[tokio::test]
async fn stale_game_moves_are_dropped() {
    let (node, addr, _rx) = start_node(test_config()).await;
    node.set_profile("bob", "Bob", "here", None).await.unwrap();
    let sock = harness_socket().await;
    let alice = user("alice@10.0.0.1");
    let bob = node.store().lock().await.own_user_id().cloned().unwrap();
    let store = node.store();
    let token = token_for(&alice, Scope::Game);

    send(
        &sock,
        &Message::TicTacToeInvite {
            from: alice.clone(),
            recipient: bob.clone(),
            message_id: mid(40),
            game_id: "g1".into(),
            symbol: Symbol::X,
            timestamp: unix_now(),
            token: token.clone(),
        },
        addr,
    )
    .await;
    eventually(
        &store,
        |s| s.game("g1").is_some(),
        "game to be created from invite",
    )
    .await;
    {
        let store = store.lock().await;
        let game = store.game("g1").unwrap();
        assert_eq!(game.my_symbol, Symbol::O);
        assert!(!game.my_turn);
    }

    let mv = |turn: u32, position: u8, n: u64| Message::TicTacToeMove {
        from: alice.clone(),
        recipient: bob.clone(),
        game_id: "g1".into(),
        message_id: mid(n),
        turn,
        position,
        symbol: Symbol::X,
        token: token.clone(),
    };

    send(&sock, &mv(1, 4, 41), addr).await;
    eventually(&store, |s| s.game("g1").unwrap().turn == 2, "first move to apply").await;

    // a replay of turn 1 changes nothing
    send(&sock, &mv(1, 0, 42), addr).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    {
        let store = store.lock().await;
        let game = store.game("g1").unwrap();
        assert_eq!(game.turn, 2);
        assert_eq!(game.filled(), 1);
        assert!(game.my_turn);
    }
}
