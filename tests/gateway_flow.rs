//! End-to-end gateway flows over a real loopback socket.

mod common;

use common::{TestClient, TestGateway};
use serde_json::json;
use slackirc::router::RouterEvent;
use slackirc::upstream::rtm::OutFrame;

#[tokio::test]
async fn registration_waits_then_welcomes() {
    let mut gw = TestGateway::spawn(Some("secret")).await;
    let mut client = TestClient::connect(gw.addr).await;

    client.register("alice", Some("secret")).await;
    client.expect("NOTICE * :Waiting for RTM connection").await;

    let _out = gw.go_live();
    client.expect(" 001 alice ").await;
    client.expect(" 376 ").await;
    client.expect(":alice!U1@localhost JOIN #general").await;
    client.expect("332 alice #general :the topic").await;
    client.expect("353 alice = #general :").await;
    client.expect("366 alice #general").await;
    client.expect(" 305 ").await;
}

#[tokio::test]
async fn bad_password_is_an_error_then_eof() {
    let gw = TestGateway::spawn(Some("secret")).await;
    let mut client = TestClient::connect(gw.addr).await;

    client.register("alice", Some("nope")).await;
    client.expect("ERROR :Closing Link: Bad password").await;
    assert_eq!(client.recv().await, None);
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let mut gw = TestGateway::spawn(None).await;
    let _out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 001 ").await;

    client.send("PING :token123").await;
    client.expect("PONG :token123").await;
}

#[tokio::test]
async fn privmsg_becomes_an_rtm_frame() {
    let mut gw = TestGateway::spawn(None).await;
    let mut out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 305 ").await;

    client.send("PRIVMSG #general :hello <@bob> & bye").await;

    let frame = tokio::time::timeout(std::time::Duration::from_secs(2), out.recv())
        .await
        .expect("frame in time")
        .expect("channel open");
    let OutFrame::Message { channel, text } = frame;
    assert_eq!(channel, "C1");
    assert_eq!(text, "hello <@U_BOB> &amp; bye");
}

#[tokio::test]
async fn upstream_message_fans_out_to_the_socket() {
    let mut gw = TestGateway::spawn(None).await;
    let _out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 305 ").await;

    gw.router_tx
        .send(RouterEvent::Rtm {
            generation: 1,
            event: serde_json::from_value(json!({
                "type": "message", "channel": "C1", "user": "U_BOB",
                "text": "hi <@U1>", "ts": "9.9",
            }))
            .unwrap(),
        })
        .unwrap();

    client
        .expect(":bob!U_BOB@localhost PRIVMSG #general :hi <@alice>")
        .await;
}

#[tokio::test]
async fn session_teardown_notifies_then_disconnects() {
    let mut gw = TestGateway::spawn(None).await;
    let _out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 305 ").await;

    gw.go_down("RTM ping timeout");
    client.expect("NOTICE alice :RTM ping timeout").await;
    // The gateway drops the connection after the notice.
    let mut saw_eof = false;
    for _ in 0..8 {
        if client.recv().await.is_none() {
            saw_eof = true;
            break;
        }
    }
    assert!(saw_eof, "connection should close after teardown");
}

#[tokio::test]
async fn gateway_commands_answer_as_the_x_user() {
    let mut gw = TestGateway::spawn(None).await;
    let _out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 305 ").await;

    client.send("PRIVMSG X :debug_dump_state").await;
    client.expect(":X!X@localhost NOTICE alice :session generation 1 (live)").await;

    client.send("PRIVMSG x :help").await;
    client.expect("commands: newgroup").await;
}

#[tokio::test]
async fn quit_closes_the_connection() {
    let mut gw = TestGateway::spawn(None).await;
    let _out = gw.go_live();
    let mut client = TestClient::connect(gw.addr).await;
    client.register("alice", None).await;
    client.expect(" 001 ").await;

    client.send("QUIT :bye").await;
    let mut saw_eof = false;
    for _ in 0..8 {
        if client.recv().await.is_none() {
            saw_eof = true;
            break;
        }
    }
    assert!(saw_eof, "connection should close after QUIT");
}
