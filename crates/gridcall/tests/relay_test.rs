//! Relay server tests over real sockets.

use gridcall::relay;
use gridcall::{
    AppConfig, Channel, GameSession, Participant, ParticipantRole, PublishOptions, Sender,
    WsChannel, participant_id,
};
use gridcall_tictactoe::{GameState, Player, Square, TurnPolicy};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_relay(config: AppConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(relay::serve_on(listener, config));
    addr
}

async fn wait_for_members(base: &str, topic: &str, count: usize) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        let members: Vec<Sender> = client
            .get(format!("{base}/channels/{topic}/members"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if members.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{topic} never reached {count} members");
}

async fn human(base: &str, room: &str, name: &str, mark: Player) -> GameSession<WsChannel> {
    let local = Participant::new(
        participant_id(room, name),
        name.to_string(),
        ParticipantRole::Human,
        mark,
    );
    let channel = WsChannel::connect(base, room, local.sender()).await.unwrap();
    GameSession::new(local, channel, TurnPolicy::Strict)
}

async fn settle(session: &mut GameSession<WsChannel>) {
    while let Ok(Some(delivery)) =
        tokio::time::timeout(Duration::from_millis(300), session.channel_mut().recv()).await
    {
        session.handle_delivery(delivery);
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = start_relay(AppConfig::default()).await;
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!({ "message": "ok" }));
}

#[tokio::test]
async fn websocket_members_exchange_payloads() {
    let addr = start_relay(AppConfig::default()).await;
    let base = format!("http://{addr}");
    let ada = Sender::new("r1_ada".into(), "Ada".into(), ParticipantRole::Human);
    let bob = Sender::new("r1_bob".into(), "Bob".into(), ParticipantRole::Human);

    let mut ada_channel = WsChannel::connect(&base, "r1", ada).await.unwrap();
    let mut bob_channel = WsChannel::connect(&base, "r1", bob).await.unwrap();
    wait_for_members(&base, "r1", 2).await;

    ada_channel
        .publish("hello".into(), PublishOptions::default())
        .await
        .unwrap();
    let delivery = tokio::time::timeout(Duration::from_secs(2), bob_channel.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.payload, "hello");
    assert_eq!(delivery.sender.id, "r1_ada");

    // No echo back to the publisher.
    let echo = tokio::time::timeout(Duration::from_millis(200), ada_channel.recv()).await;
    assert!(echo.is_err());
}

#[tokio::test]
async fn two_players_converge_through_relay() {
    let addr = start_relay(AppConfig::default()).await;
    let base = format!("http://{addr}");
    let mut ada = human(&base, "r2", "Ada", Player::X).await;
    let mut bob = human(&base, "r2", "Bob", Player::O).await;
    wait_for_members(&base, "r2", 2).await;

    for (who, position) in [(0, 4), (1, 0), (0, 2), (1, 6), (0, 3)] {
        if who == 0 {
            ada.play(position).await.unwrap();
            settle(&mut bob).await;
        } else {
            bob.play(position).await.unwrap();
            settle(&mut ada).await;
        }
    }
    assert_eq!(ada.state(), bob.state());
    assert_eq!(ada.state().board().occupied(), 5);

    bob.reset().await.unwrap();
    settle(&mut ada).await;
    assert_eq!(ada.state(), &GameState::new());
}

#[tokio::test]
async fn join_player_spawns_an_agent_that_answers() {
    let config = AppConfig::from_toml("[agent]\nthink_ms = 10").unwrap();
    let addr = start_relay(config).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let mut ada = human(&base, "r3", "Ada", Player::X).await;

    let response = client
        .post(format!("{base}/join-player"))
        .json(&serde_json::json!({ "meeting_id": "r3", "token": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "AI agent joined");
    wait_for_members(&base, "r3", 2).await;

    ada.play(4).await.unwrap();
    settle(&mut ada).await;
    assert_eq!(
        ada.state().board().get(0),
        Some(Square::Occupied(Player::O))
    );
    assert!(ada.agent_present());

    let agent_view: GameState = client
        .get(format!("{base}/agents/r3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(&agent_view, ada.state());

    let again = client
        .post(format!("{base}/join-player"))
        .json(&serde_json::json!({ "meeting_id": "r3", "token": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 409);

    let removed = client
        .delete(format!("{base}/agents/r3"))
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), 200);
    let gone = client.get(format!("{base}/agents/r3")).send().await.unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn wrong_credential_is_rejected() {
    let config = AppConfig::default().with_auth_token(Some("s3cret".into()));
    let addr = start_relay(config).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let missing = client.post(format!("{base}/v2/rooms")).send().await.unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = client
        .post(format!("{base}/join-player"))
        .json(&serde_json::json!({ "meeting_id": "r4", "token": "guess" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let ok = client
        .post(format!("{base}/v2/rooms"))
        .header("Authorization", "s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    let body: serde_json::Value = ok.json().await.unwrap();
    assert!(body["roomId"].as_str().is_some_and(|id| !id.is_empty()));
}
